//! Gradient saliency: `|d logit_target / d input|` for every input element.

use candle_core::{DType, Tensor, Var};

use crate::error::{EcgError, Result};
use crate::model::EcgModel;

/// Attribution maps with the same shapes as the model inputs.
pub struct Attribution {
    pub non_ecg: Tensor,
    pub ecg: Tensor,
}

/// Saliency of the `target` logit (one class id per batch row, u32) with
/// respect to both inputs.
pub fn saliency(
    model: &dyn EcgModel,
    non_ecg: &Tensor,
    ecg: &Tensor,
    target: &Tensor,
) -> Result<Attribution> {
    let num_classes = model.shape().num_classes as u32;
    let target = target.to_dtype(DType::U32)?;
    let ids: Vec<u32> = target.to_vec1()?;
    if ids.len() != ecg.dim(0)? {
        return Err(EcgError::Data(format!(
            "{} targets for a batch of {}",
            ids.len(),
            ecg.dim(0)?
        )));
    }
    if let Some(bad) = ids.iter().find(|&&t| t >= num_classes) {
        return Err(EcgError::Data(format!(
            "target class {bad} out of range for {num_classes} classes"
        )));
    }

    let non_ecg_var = Var::from_tensor(&non_ecg.detach())?;
    let ecg_var = Var::from_tensor(&ecg.detach())?;
    let logits = model.forward(non_ecg_var.as_tensor(), ecg_var.as_tensor())?;
    let picked = logits.gather(&target.unsqueeze(1)?, 1)?.sum_all()?;
    let grads = picked.backward()?;

    let grad_abs = |var: &Var| -> Result<Tensor> {
        Ok(match grads.get(var.as_tensor()) {
            Some(g) => g.abs()?,
            None => var.as_tensor().zeros_like()?,
        })
    };
    Ok(Attribution {
        non_ecg: grad_abs(&non_ecg_var)?,
        ecg: grad_abs(&ecg_var)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelKind, ModelShape, create_model};
    use candle_core::Device;

    fn shape() -> ModelShape {
        ModelShape {
            non_ecg_dim: 2,
            leads: 2,
            len: 16,
            num_classes: 3,
        }
    }

    fn inputs() -> (Tensor, Tensor) {
        let device = Device::Cpu;
        let non_ecg = Tensor::new(&[[1.0f32, 0.5]], &device).unwrap();
        let ecg = Tensor::randn(0f32, 1f32, (1, 2, 16), &device).unwrap();
        (non_ecg, ecg)
    }

    #[test]
    fn attribution_matches_input_shapes_and_is_non_negative() {
        for kind in [ModelKind::Mlp, ModelKind::Cnn] {
            let model = create_model(kind, shape(), &Device::Cpu).unwrap();
            let (non_ecg, ecg) = inputs();
            let target = Tensor::new(&[1u32], &Device::Cpu).unwrap();
            let attr = saliency(model.as_ref(), &non_ecg, &ecg, &target).unwrap();
            assert_eq!(attr.ecg.dims(), ecg.dims());
            assert_eq!(attr.non_ecg.dims(), non_ecg.dims());
            let values: Vec<f32> = attr.ecg.flatten_all().unwrap().to_vec1().unwrap();
            assert!(values.iter().all(|v| *v >= 0.0 && v.is_finite()));
        }
    }

    #[test]
    fn mlp_saliency_is_nonzero() {
        let model = create_model(ModelKind::Mlp, shape(), &Device::Cpu).unwrap();
        let (non_ecg, ecg) = inputs();
        let target = Tensor::new(&[0u32], &Device::Cpu).unwrap();
        let attr = saliency(model.as_ref(), &non_ecg, &ecg, &target).unwrap();
        let total = attr.ecg.sum_all().unwrap().to_scalar::<f32>().unwrap();
        assert!(total > 0.0);
    }

    #[test]
    fn target_out_of_range_is_rejected() {
        let model = create_model(ModelKind::Cnn, shape(), &Device::Cpu).unwrap();
        let (non_ecg, ecg) = inputs();
        let target = Tensor::new(&[3u32], &Device::Cpu).unwrap();
        assert!(matches!(
            saliency(model.as_ref(), &non_ecg, &ecg, &target),
            Err(EcgError::Data(_))
        ));
    }
}
