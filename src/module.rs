// src/module.rs
use crate::autograd::Tensor;
use crate::error::{GlanceError, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// 权重 blob：按 parameters() 顺序保存 (shape, data)
#[derive(Serialize, Deserialize)]
pub struct ModelCheckpoint {
    pub params: Vec<(Vec<usize>, Vec<f32>)>,
}

pub trait Module {
    fn forward(&self, input: Tensor) -> Tensor;
    fn parameters(&self) -> Vec<Tensor>;

    fn save_weights(&self, path: &Path) -> Result<()> {
        let params = self
            .parameters()
            .iter()
            .map(|p| p.get_raw_data())
            .collect();
        let checkpoint = ModelCheckpoint { params };
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, &checkpoint)?;
        writer.flush()?;
        info!("Weights saved to {} (Binary format)", path.display());
        Ok(())
    }

    /// 读取权重 blob。参数个数或任一形状不一致都会拒绝，且不修改模型。
    fn load_weights(&self, path: &Path) -> Result<()> {
        let reader = BufReader::new(File::open(path)?);
        let checkpoint: ModelCheckpoint = bincode::deserialize_from(reader)?;

        let my_params = self.parameters();
        if checkpoint.params.len() != my_params.len() {
            return Err(GlanceError::Checkpoint(format!(
                "parameter count mismatch: model has {}, blob has {}",
                my_params.len(),
                checkpoint.params.len()
            )));
        }

        for (i, (param, (shape, data))) in my_params.iter().zip(&checkpoint.params).enumerate() {
            if param.shape() != *shape || shape.iter().product::<usize>() != data.len() {
                return Err(GlanceError::Checkpoint(format!(
                    "parameter {} shape mismatch: model {:?}, blob {:?} ({} values)",
                    i,
                    param.shape(),
                    shape,
                    data.len()
                )));
            }
        }

        for (param, (shape, data)) in my_params.iter().zip(checkpoint.params) {
            param
                .set_raw_data(shape, data)
                .map_err(|e| GlanceError::Checkpoint(e.to_string()))?;
        }

        info!("Weights loaded from {} (Binary format)", path.display());
        Ok(())
    }
}

pub struct Sequential {
    layers: Vec<Box<dyn Module>>,
}

impl Sequential {
    pub fn new(layers: Vec<Box<dyn Module>>) -> Self {
        Sequential { layers }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Module for Sequential {
    fn forward(&self, mut input: Tensor) -> Tensor {
        for layer in &self.layers {
            input = layer.forward(input);
        }
        input
    }

    fn parameters(&self) -> Vec<Tensor> {
        self.layers.iter().flat_map(|l| l.parameters()).collect()
    }
}

#[macro_export]
macro_rules! sequential {
    ($($layer:expr),* $(,)?) => {
        $crate::module::Sequential::new(vec![
            $(Box::new($layer) as Box<dyn $crate::module::Module>),*
        ])
    };
}
