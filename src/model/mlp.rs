//! Fully-connected classifier over the flattened ECG block.
//!
//! ```text
//! [non_ecg | flatten(ecg)] → Linear(256) → ReLU → Linear(64) → ReLU → Linear(num_classes)
//! ```

use candle_core::{DType, Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder, VarMap};

use super::{EcgModel, ModelKind, ModelShape, WindowLen, check_inputs};
use crate::error::Result;

const HIDDEN_1: usize = 256;
const HIDDEN_2: usize = 64;

pub struct Mlp {
    fc1: Linear,
    fc2: Linear,
    fc3: Linear,
    shape: ModelShape,
    varmap: VarMap,
}

impl Mlp {
    pub fn new(shape: ModelShape, device: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let input_dim = shape.non_ecg_dim + shape.leads * shape.len;

        let fc1 = candle_nn::linear(input_dim, HIDDEN_1, vb.pp("fc1"))?;
        let fc2 = candle_nn::linear(HIDDEN_1, HIDDEN_2, vb.pp("fc2"))?;
        let fc3 = candle_nn::linear(HIDDEN_2, shape.num_classes, vb.pp("fc3"))?;

        Ok(Self {
            fc1,
            fc2,
            fc3,
            shape,
            varmap,
        })
    }
}

impl EcgModel for Mlp {
    fn kind(&self) -> ModelKind {
        ModelKind::Mlp
    }

    fn shape(&self) -> ModelShape {
        self.shape
    }

    fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    fn forward(&self, non_ecg: &Tensor, ecg: &Tensor) -> Result<Tensor> {
        check_inputs(&self.shape, non_ecg, ecg, WindowLen::Exact)?;
        let flat = ecg.flatten_from(1)?;
        let x = Tensor::cat(&[non_ecg, &flat], 1)?;
        let x = self.fc1.forward(&x)?.relu()?;
        let x = self.fc2.forward(&x)?.relu()?;
        Ok(self.fc3.forward(&x)?)
    }
}
