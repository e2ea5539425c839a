use std::path::Path;
use std::sync::{Arc, Mutex};
use tch::{CModule, Device, IValue, Kind, Tensor};

use super::classifier::{Backbone, InferenceError};
use super::preprocess::PreprocessedTensor;

/// TorchScript checkpoint run through libtorch.
#[derive(Clone)]
pub struct TorchBackbone {
    model: Arc<Mutex<CModule>>,
    device: Device,
    class_names: Option<Vec<String>>,
}

impl TorchBackbone {
    pub fn load(model_path: &Path) -> Result<Self, InferenceError> {
        if !model_path.exists() {
            return Err(InferenceError::CheckpointMissing(model_path.to_path_buf()));
        }
        let device = Device::cuda_if_available();
        log::info!("Loading checkpoint {} on {:?}", model_path.display(), device);

        let mut model = CModule::load_on_device(model_path, device)?;
        model.set_eval();
        let class_names = read_class_names(&model);
        match &class_names {
            Some(names) => log::info!("Classes loaded from checkpoint: {:?}", names),
            None => log::warn!("No class names in checkpoint, using defaults"),
        }

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            device,
            class_names,
        })
    }

    pub fn class_names(&self) -> Option<Vec<String>> {
        self.class_names.clone()
    }
}

fn read_class_names(model: &CModule) -> Option<Vec<String>> {
    match model.method_is::<IValue>("class_names", &[]) {
        Ok(IValue::GenericList(items)) => items
            .into_iter()
            .map(|item| match item {
                IValue::String(name) => Some(name),
                _ => None,
            })
            .collect(),
        Ok(IValue::Tuple(items)) => items
            .into_iter()
            .map(|item| match item {
                IValue::String(name) => Some(name),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

impl Backbone for TorchBackbone {
    fn forward(&self, input: &PreprocessedTensor) -> Result<Vec<f32>, InferenceError> {
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let tensor = Tensor::from_slice(&input.to_vec())
            .view(shape.as_slice())
            .to_device(self.device);

        let model = self
            .model
            .lock()
            .map_err(|_| InferenceError::Model("model lock poisoned".to_string()))?;
        let output = tch::no_grad(|| model.forward_ts(&[tensor]))?;
        let output = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
        let logits = Vec::<f32>::try_from(&output)?;
        Ok(logits)
    }
}
