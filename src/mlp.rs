use candle_core::{DType, Tensor};
use candle_nn::{linear, Linear, Module, VarBuilder, VarMap};

use crate::device::DEVICE;
use crate::error::{Result, SamplerError};

/// Fully connected network with ReLU between layers and a linear head.
pub struct MultiLayerPerceptron {
    pub layers: Vec<Linear>,
    pub var_map: VarMap,
    pub topology: Vec<usize>,
}

impl MultiLayerPerceptron {
    pub fn new(topology: &[usize]) -> Result<Self> {
        if topology.len() < 2 || topology.contains(&0) {
            return Err(SamplerError::InvalidConfig(format!(
                "network topology {topology:?} needs at least two non-empty layers"
            )));
        }

        let vm = VarMap::new();
        let vb = VarBuilder::from_varmap(&vm, DType::F32, &DEVICE);
        let mut layers: Vec<Linear> = Vec::with_capacity(topology.len() - 1);
        for i in 0..(topology.len() - 1) {
            layers.push(linear(topology[i], topology[i + 1], vb.pp(i))?);
        }

        Ok(Self {
            layers,
            topology: topology.to_vec(),
            var_map: vm,
        })
    }

    pub fn output(&self, inputs: Tensor) -> Result<Tensor> {
        let mut x = inputs;
        for layer in self.layers.iter().take(self.layers.len() - 1) {
            x = layer.forward(&x)?;
            x = x.relu()?;
        }
        if let Some(last_layer) = self.layers.last() {
            x = last_layer.forward(&x)?;
        }
        Ok(x)
    }

    /// Deep-copies every parameter of `source` into this network, matched by
    /// name. Both networks keep their own storage afterwards.
    pub fn copy_from(&self, source: &MultiLayerPerceptron) -> Result<()> {
        if self.topology != source.topology {
            return Err(SamplerError::Estimator(format!(
                "cannot copy {:?} parameters into {:?}",
                source.topology, self.topology
            )));
        }

        // locks are released at the end of the function
        let source_vars = source
            .var_map
            .data()
            .lock()
            .map_err(|_| SamplerError::Estimator("source parameters poisoned".into()))?;
        let own_vars = self
            .var_map
            .data()
            .lock()
            .map_err(|_| SamplerError::Estimator("target parameters poisoned".into()))?;

        for (name, source_var) in source_vars.iter() {
            let own_var = own_vars.get(name).ok_or_else(|| {
                SamplerError::Estimator(format!("parameter {name} missing from copy target"))
            })?;
            own_var.set(source_var.as_tensor())?;
        }
        Ok(())
    }
}
