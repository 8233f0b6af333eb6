// crates/sc_physics/src/schemes/mod.rs

//! 数值格式模块
//!
//! 提供组装核心使用的参考通量律与扩散系数模型：
//!
//! - [`ScalarUpwind`]: 标量一阶迎风对流通量
//! - [`AverageGradientDiffusion`]: 带边法向修正的平均梯度扩散通量
//! - [`ConstantDiffusivity`] / [`ConstantSchmidt`]: 扩散系数模型

pub mod diffusion;
pub mod diffusivity;
pub mod upwind;

pub use diffusion::AverageGradientDiffusion;
pub use diffusivity::{ConstantDiffusivity, ConstantSchmidt};
pub use upwind::ScalarUpwind;
