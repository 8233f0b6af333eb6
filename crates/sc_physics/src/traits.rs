// crates/sc_physics/src/traits.rs

//! 外部协作者接口
//!
//! 组装核心只通过以下 trait 访问外部组件：
//!
//! - [`FlowStateProvider`]: 主流场（原始变量、密度时间层、局部时间步、重构梯度）
//! - [`ConvectiveFluxLaw`] / [`ViscousFluxLaw`]: 数值通量律
//! - [`DiffusivityModel`]: 扩散系数物性模型
//! - [`LinearSolver`]: 线性系统求解器
//! - [`RestartHooks`]: 重启后的依赖求解器后处理
//!
//! 通量律与流场访问在并行边循环中被多个线程同时调用，因此要求 `Sync`。

use glam::DVec3;

use crate::numerics::linear_algebra::{BlockCsrMatrix, SolverResult};
use crate::state::ScalarState;
use crate::types::{ConvectiveInput, FluxResult, ViscousInput};

// ============================================================
// 流场访问
// ============================================================

/// 主流场只读访问接口
///
/// 原始变量布局见 [`crate::types::PrimitiveLayout`]。
pub trait FlowStateProvider: Sync {
    /// 原始变量个数
    fn n_prim_var(&self) -> usize;

    /// 带梯度的原始变量个数（只重构前 `n_prim_var_grad` 个）
    fn n_prim_var_grad(&self) -> usize;

    /// 节点原始变量
    fn primitive(&self, point: usize) -> &[f64];

    /// 节点密度（原始变量）
    fn density(&self, point: usize) -> f64;

    /// 守恒解第 0 分量（可压缩密度）在 n+1、n、n-1 时间层的值
    fn conservative_density_levels(&self, point: usize) -> [f64; 3];

    /// 上一次非线性迭代的守恒密度（可压缩欠松弛更新使用）
    fn density_old(&self, point: usize) -> f64;

    /// 流场局部伪时间步
    fn delta_time(&self, point: usize) -> f64;

    /// 原始变量重构梯度（长度 `n_prim_var_grad`）
    fn reconstruction_gradient(&self, point: usize) -> &[DVec3];

    /// 原始变量限制因子（长度 `n_prim_var_grad`）
    fn limiter(&self, point: usize) -> &[f64];

    /// 边界顶点处的特征原始变量（远场/入口/出口的外部状态）
    fn characteristic_primitive(&self, marker: usize, vertex: usize) -> &[f64];

    /// 层流粘性
    fn laminar_viscosity(&self, point: usize) -> f64;

    /// 涡粘性
    fn eddy_viscosity(&self, point: usize) -> f64;
}

// ============================================================
// 通量律
// ============================================================

/// 对流数值通量律
pub trait ConvectiveFluxLaw: Send + Sync {
    /// 名称
    fn name(&self) -> &'static str;

    /// 计算通量；`implicit` 为 false 时可跳过 Jacobian
    fn compute(&self, input: &ConvectiveInput<'_>, implicit: bool, out: &mut FluxResult);
}

/// 粘性（扩散）数值通量律
pub trait ViscousFluxLaw: Send + Sync {
    /// 名称
    fn name(&self) -> &'static str;

    /// 计算通量；`implicit` 为 false 时可跳过 Jacobian
    fn compute(&self, input: &ViscousInput<'_>, implicit: bool, out: &mut FluxResult);
}

/// 扩散系数模型
pub trait DiffusivityModel: Send + Sync {
    /// 名称
    fn name(&self) -> &'static str;

    /// 节点 `point` 处第 `var` 个标量的扩散系数
    fn diffusivity(&self, flow: &dyn FlowStateProvider, point: usize, var: usize) -> f64;
}

// ============================================================
// 线性求解器
// ============================================================

/// 线性求解器接口
///
/// 只求解计算域行；不收敛不是错误，由调用方记录迭代次数与残差。
pub trait LinearSolver: Send {
    /// 名称
    fn name(&self) -> &'static str;

    /// 求解 `A x = b`，`x` 为初值并被覆盖
    fn solve(&mut self, matrix: &BlockCsrMatrix, b: &[f64], x: &mut [f64]) -> SolverResult;
}

// ============================================================
// 重启钩子
// ============================================================

/// 重启加载后的依赖求解器后处理
///
/// 每个网格层在解同步之后依次调用流场预处理与标量后处理。
pub trait RestartHooks {
    /// 流场预处理
    fn flow_preprocessing(&mut self, _level: usize) {}

    /// 标量后处理
    fn scalar_postprocessing(&mut self, _level: usize, _state: &mut ScalarState) {}
}

/// 空钩子
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl RestartHooks for NoopHooks {}
