// crates/sc_physics/src/boundary/mod.rs

//! 边界条件
//!
//! - [`types`]: 边界类型
//! - [`dispatch`]: 标记到边界类型的映射与残差贡献
//! - [`inlet`]: 入口剖面表

pub mod dispatch;
pub mod inlet;
pub mod types;

pub use dispatch::BoundaryDispatcher;
pub use inlet::InletProfiles;
pub use types::BoundaryKind;
