// crates/sc_foundation/src/lib.rs

//! ScalarTransport Foundation Layer
//!
//! 基础层，为上层网格、配置和求解器 crate 提供公共抽象。
//!
//! # 模块概览
//!
//! - [`scalar`]: 计算标量类型与数值常量
//! - [`error`]: 统一错误类型
//! - [`kahan`]: 补偿求和（残差范数累加）
//!
//! # 示例
//!
//! ```
//! use sc_foundation::{KahanSum, ScError, ScResult, Scalar};
//!
//! fn check(n: usize) -> ScResult<()> {
//!     ScError::check_size("residual", 4, n)
//! }
//!
//! assert!(check(4).is_ok());
//! let s: Scalar = KahanSum::sum_iter([0.1; 10]);
//! assert!((s - 1.0).abs() < 1e-14);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod kahan;
pub mod scalar;

// 重导出常用类型
pub use error::{ScError, ScResult};
pub use kahan::KahanSum;
pub use scalar::{next_multiple, Scalar, EPS, TINY};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{ScError, ScResult};
    pub use crate::kahan::KahanSum;
    pub use crate::scalar::{next_multiple, Scalar, EPS, TINY};
}
