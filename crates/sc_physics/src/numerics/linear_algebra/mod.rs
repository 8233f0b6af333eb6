// crates/sc_physics/src/numerics/linear_algebra/mod.rs

//! 稀疏线性代数模块
//!
//! 提供隐式迭代所需的块稀疏矩阵、预条件器和迭代求解器。
//!
//! - [`BlockCsrMatrix`]: 由网格图决定稀疏模式的块 CSR 矩阵
//! - [`BlockJacobiPreconditioner`]: 块 Jacobi 预条件器
//! - [`BiCgStab`]: 预条件 BiCGStab，实现 [`crate::traits::LinearSolver`]

pub mod block_csr;
pub mod preconditioner;
pub mod solver;
pub mod vector_ops;

pub use block_csr::{BlockCsrMatrix, BlockPattern, RowMut};
pub(crate) use block_csr::JacobianWriter;
pub use preconditioner::{BlockJacobiPreconditioner, IdentityPreconditioner, Preconditioner};
pub use solver::{BiCgStab, PreconditionerKind, SolverConfig, SolverResult, SolverStatus};
pub use vector_ops::{axpy, copy, dot, norm2, norm_inf};
