// crates/sc_physics/src/schemes/diffusivity.rs

//! 扩散系数模型
//!
//! - [`ConstantDiffusivity`]: 每个变量一个常数
//! - [`ConstantSchmidt`]: 常 Schmidt 数，`D = μ/Sc + μ_t/Sc_t`

use crate::traits::{DiffusivityModel, FlowStateProvider};

/// 常扩散系数
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDiffusivity {
    values: Vec<f64>,
}

impl ConstantDiffusivity {
    /// 所有变量使用同一系数
    pub fn uniform(value: f64) -> Self {
        Self {
            values: vec![value],
        }
    }

    /// 每个变量单独指定；变量数超过长度时沿用最后一个值
    pub fn per_variable(values: Vec<f64>) -> Self {
        Self { values }
    }
}

impl DiffusivityModel for ConstantDiffusivity {
    fn name(&self) -> &'static str {
        "ConstantDiffusivity"
    }

    fn diffusivity(&self, _flow: &dyn FlowStateProvider, _point: usize, var: usize) -> f64 {
        self.values
            .get(var)
            .or_else(|| self.values.last())
            .copied()
            .unwrap_or(0.0)
    }
}

/// 常 Schmidt 数扩散模型
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantSchmidt {
    /// 层流 Schmidt 数
    pub schmidt_laminar: f64,
    /// 湍流 Schmidt 数
    pub schmidt_turbulent: f64,
}

impl Default for ConstantSchmidt {
    fn default() -> Self {
        Self {
            schmidt_laminar: 1.0,
            schmidt_turbulent: 0.7,
        }
    }
}

impl DiffusivityModel for ConstantSchmidt {
    fn name(&self) -> &'static str {
        "ConstantSchmidt"
    }

    fn diffusivity(&self, flow: &dyn FlowStateProvider, point: usize, _var: usize) -> f64 {
        flow.laminar_viscosity(point) / self.schmidt_laminar
            + flow.eddy_viscosity(point) / self.schmidt_turbulent
    }
}
