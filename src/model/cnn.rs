//! 1-D convolutional classifier over the ECG leads.
//!
//! Two strided convolutions treat leads as channels, a global average over
//! time makes the network independent of the window length, and the pooled
//! features are joined with the non-ECG inputs before the classifier head.
//! Windows must be at least [`Cnn::MIN_LEN`] samples long: every convolution
//! has to emit enough steps for its padded transpose in the backward pass.
//!
//! ```text
//! ecg → Conv1d(16, k7, s2) → ReLU → Conv1d(32, k7, s2) → ReLU → mean_t
//!     → [non_ecg | pooled] → Linear(32) → ReLU → Linear(num_classes)
//! ```

use candle_core::{DType, Device, Tensor};
use candle_nn::{Conv1d, Conv1dConfig, Linear, Module, VarBuilder, VarMap};

use super::{EcgModel, ModelKind, ModelShape, WindowLen, check_inputs};
use crate::error::{EcgError, Result};

const CONV_1: usize = 16;
const CONV_2: usize = 32;
const KERNEL: usize = 7;
const STRIDE: usize = 2;
const PADDING: usize = KERNEL / 2;
const HIDDEN: usize = 32;

pub struct Cnn {
    conv1: Conv1d,
    conv2: Conv1d,
    fc1: Linear,
    fc2: Linear,
    shape: ModelShape,
    varmap: VarMap,
}

/// Shortest input a conv layer accepts so its output has `out` steps.
const fn conv_input_for(out: usize) -> usize {
    (out - 1) * STRIDE + 1
}

impl Cnn {
    /// Each conv output needs `ceil(2 * padding / stride) + 1` steps,
    /// traced back through both layers.
    pub const MIN_LEN: usize = {
        let min_out = (2 * PADDING).div_ceil(STRIDE) + 1;
        conv_input_for(conv_input_for(min_out))
    };

    pub fn new(shape: ModelShape, device: &Device) -> Result<Self> {
        if shape.len < Self::MIN_LEN {
            return Err(EcgError::Config(format!(
                "CNN needs windows of at least {} samples, got {}",
                Self::MIN_LEN,
                shape.len
            )));
        }
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let cfg = Conv1dConfig {
            padding: PADDING,
            stride: STRIDE,
            ..Default::default()
        };

        let conv1 = candle_nn::conv1d(shape.leads, CONV_1, KERNEL, cfg, vb.pp("conv1"))?;
        let conv2 = candle_nn::conv1d(CONV_1, CONV_2, KERNEL, cfg, vb.pp("conv2"))?;
        let fc1 = candle_nn::linear(CONV_2 + shape.non_ecg_dim, HIDDEN, vb.pp("fc1"))?;
        let fc2 = candle_nn::linear(HIDDEN, shape.num_classes, vb.pp("fc2"))?;

        Ok(Self {
            conv1,
            conv2,
            fc1,
            fc2,
            shape,
            varmap,
        })
    }
}

impl EcgModel for Cnn {
    fn kind(&self) -> ModelKind {
        ModelKind::Cnn
    }

    fn shape(&self) -> ModelShape {
        self.shape
    }

    fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    fn forward(&self, non_ecg: &Tensor, ecg: &Tensor) -> Result<Tensor> {
        check_inputs(&self.shape, non_ecg, ecg, WindowLen::AtLeast(Self::MIN_LEN))?;
        let x = self.conv1.forward(ecg)?.relu()?;
        let x = self.conv2.forward(&x)?.relu()?;
        let pooled = x.mean(2)?;
        let x = Tensor::cat(&[non_ecg, &pooled], 1)?;
        let x = self.fc1.forward(&x)?.relu()?;
        Ok(self.fc2.forward(&x)?)
    }
}
