// crates/sc_config/src/lib.rs

//! ScalarTransport Config Layer
//!
//! 配置层，提供标量输运求解器的全部可调参数。
//! 本层无泛型，数值一律使用 f64，便于 JSON 序列化。
//!
//! # 模块概览
//!
//! - [`solver_config`]: `ScalarSolverConfig` 及其枚举选项
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! sc_physics   ─> 读取 ScalarSolverConfig
//! sc_config    ─> ScalarSolverConfig, ConfigError (本层)
//! sc_foundation
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod solver_config;

// 重导出核心类型
pub use error::ConfigError;
pub use solver_config::{
    FlowRegime, LimiterKind, LinearSolverConfig, ScalarSolverConfig, TimeIntegration,
    TimeMarching,
};
