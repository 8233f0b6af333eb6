// crates/sc_physics/src/lib.rs

//! 标量输运求解器物理层
//!
//! 在边式对偶网格上组装隐式标量输运方程的残差与 Jacobian，包括：
//! - 边着色适配 (coloring) - 直接模式与归约模式
//! - 组装引擎 (engine) - 边循环、隐式迭代、双时间步源项
//! - 边界条件 (boundary) - 边界类型分派与入口剖面
//! - 通信 (comms) - 两阶段 halo/周期交换
//! - 重启 (restart) - 重启加载与多重网格限制
//! - 数值方法 (numerics) - 梯度、限制器、块稀疏线性代数
//! - 数值格式 (schemes) - 参考通量律与扩散系数模型
//!
//! # 分层
//!
//! ```text
//! ScalarSolver
//!   ├── ColoringAdapter ── EdgeAssembler ── ConvectiveFluxLaw / ViscousFluxLaw
//!   ├── BoundaryDispatcher ── InletProfiles
//!   ├── dual_time
//!   ├── implicit ── LinearSolver ── BlockCsrMatrix
//!   └── restart ── Communicator / RestartHooks
//! ```
//!
//! # Trait 抽象
//!
//! - [`FlowStateProvider`]: 主流场只读访问
//! - [`ConvectiveFluxLaw`] / [`ViscousFluxLaw`]: 数值通量律
//! - [`LinearSolver`]: 线性系统求解
//! - [`Communicator`]: 两阶段交换

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod boundary;
pub mod coloring;
pub mod comms;
pub mod engine;
pub mod error;
pub mod flow;
pub mod numerics;
pub mod restart;
pub mod schemes;
pub mod solver;
pub mod state;
pub mod traits;
pub mod types;

mod shared;

// 重导出常用类型
pub use boundary::{BoundaryDispatcher, BoundaryKind, InletProfiles};
pub use coloring::{AssemblyMode, ColoringAdapter};
pub use comms::{Communicator, ExchangeKind, PendingExchange, SerialComms};
pub use engine::{EdgeAssembler, FluxLaws};
pub use error::{ScalarResult, SolverError};
pub use flow::FlowField;
pub use numerics::linear_algebra::{BiCgStab, BlockCsrMatrix, SolverResult};
pub use restart::{load_restart, restrict_solution, RestartBuffer};
pub use schemes::{AverageGradientDiffusion, ConstantDiffusivity, ConstantSchmidt, ScalarUpwind};
pub use solver::{ScalarSolver, ScalarSolverBuilder};
pub use state::ScalarState;
pub use traits::{
    ConvectiveFluxLaw, DiffusivityModel, FlowStateProvider, LinearSolver, NoopHooks, RestartHooks,
    ViscousFluxLaw,
};
pub use types::{ConvectiveInput, FluxResult, PrimitiveLayout, ResidualNorms, ViscousInput};
