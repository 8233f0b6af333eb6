// crates/sc_physics/src/numerics/mod.rs

//! 数值方法模块
//!
//! - [`linear_algebra`]: 块稀疏矩阵与迭代求解器
//! - [`gradient`]: Green-Gauss 节点梯度
//! - [`limiter`]: 基于节点的斜率限制器
//! - [`reconstruction`]: 沿半边的 MUSCL 重构

pub mod gradient;
pub mod limiter;
pub mod linear_algebra;
pub mod reconstruction;

pub use gradient::green_gauss_gradient;
pub use limiter::{compute_node_limiter, BarthJespersen, SlopeLimiter, Venkatakrishnan};
pub use reconstruction::reconstruct;
