// crates/sc_config/src/solver_config.rs

//! ScalarSolverConfig - 标量输运求解器配置（全 f64）
//!
//! 覆盖时间推进方式、MUSCL 重构与限制器开关、伪时间步缩放、
//! 裁剪范围、欠松弛参数、着色调度参数和线性求解器参数。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

// ============================================================
// 枚举选项
// ============================================================

/// 时间积分格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeIntegration {
    /// 显式（不组装 Jacobian）
    Explicit,
    /// 隐式欧拉（组装 Jacobian 并求解线性系统）
    #[default]
    EulerImplicit,
}

/// 物理时间推进方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeMarching {
    /// 定常
    #[default]
    Steady,
    /// 全局时间步推进
    TimeStepping,
    /// 一阶双时间步
    DualTime1st,
    /// 二阶双时间步
    DualTime2nd,
}

impl TimeMarching {
    /// 是否为双时间步
    #[inline]
    pub fn is_dual_time(&self) -> bool {
        matches!(self, Self::DualTime1st | Self::DualTime2nd)
    }
}

/// 流动区域（决定密度取值方式）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlowRegime {
    /// 可压缩：密度取自流场守恒解第 0 分量
    Compressible,
    /// 不可压缩：密度取自流场原始变量
    #[default]
    Incompressible,
}

/// 斜率限制器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LimiterKind {
    /// 无限制器
    #[default]
    None,
    /// Venkatakrishnan（基于节点）
    Venkatakrishnan,
    /// Barth-Jespersen（基于节点）
    BarthJespersen,
    /// Van Albada（基于边，需在边上重新计算）
    VanAlbadaEdge,
}

impl LimiterKind {
    /// 是否启用限制器
    #[inline]
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// 是否为基于节点的限制器（存储的限制因子可直接使用）
    #[inline]
    pub fn is_node_based(&self) -> bool {
        matches!(self, Self::Venkatakrishnan | Self::BarthJespersen)
    }
}

// ============================================================
// 线性求解器配置
// ============================================================

/// 线性求解器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSolverConfig {
    /// 相对收敛容差
    #[serde(default = "default_linear_tolerance")]
    pub tolerance: f64,
    /// 最大迭代次数
    #[serde(default = "default_linear_max_iter")]
    pub max_iterations: usize,
}

fn default_linear_tolerance() -> f64 { 1e-6 }
fn default_linear_max_iter() -> usize { 100 }

impl Default for LinearSolverConfig {
    fn default() -> Self {
        Self {
            tolerance: default_linear_tolerance(),
            max_iterations: default_linear_max_iter(),
        }
    }
}

// ============================================================
// 主配置
// ============================================================

/// 标量输运求解器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarSolverConfig {
    /// 空间维数（2 或 3）
    #[serde(default = "default_n_dim")]
    pub n_dim: usize,

    /// 标量未知量个数
    #[serde(default = "default_n_var")]
    pub n_var: usize,

    /// 时间积分格式
    #[serde(default)]
    pub time_integration: TimeIntegration,

    /// 物理时间推进方式
    #[serde(default)]
    pub time_marching: TimeMarching,

    /// 流动区域
    #[serde(default)]
    pub regime: FlowRegime,

    /// 标量 MUSCL 重构
    #[serde(default)]
    pub muscl_scalar: bool,

    /// 流场 MUSCL 重构
    #[serde(default)]
    pub muscl_flow: bool,

    /// 流场对流格式是否为迎风格式
    #[serde(default = "default_true")]
    pub flow_upwind: bool,

    /// 标量限制器
    #[serde(default)]
    pub scalar_limiter: LimiterKind,

    /// 流场限制器
    #[serde(default)]
    pub flow_limiter: LimiterKind,

    /// 伪时间步缩放系数（乘以流场局部时间步）
    #[serde(default = "default_cfl_reduction")]
    pub cfl_reduction: f64,

    /// 物理时间步长（无量纲，双时间步使用）
    #[serde(default)]
    pub delta_unsteady_time: f64,

    /// 各变量裁剪下限（缺省为 -∞）
    #[serde(default)]
    pub clipping_min: Vec<f64>,

    /// 各变量裁剪上限（缺省为 +∞）
    #[serde(default)]
    pub clipping_max: Vec<f64>,

    /// 单次非线性迭代允许的最大相对变化
    #[serde(default = "default_allowable_ratio")]
    pub allowable_ratio: f64,

    /// 欠松弛因子下限，低于此值取消更新
    #[serde(default = "default_relaxation_floor")]
    pub relaxation_floor: f64,

    /// 着色并行效率阈值，低于此值切换到归约模式
    #[serde(default = "default_coloring_threshold")]
    pub coloring_efficiency_threshold: f64,

    /// 并行调度最小块大小
    #[serde(default = "default_min_chunk")]
    pub min_chunk_size: usize,

    /// 节点循环静态块大小上限
    #[serde(default = "default_max_chunk")]
    pub max_chunk_size: usize,

    /// 边着色分组大小
    #[serde(default = "default_edge_group_size")]
    pub edge_group_size: usize,

    /// 动网格（刚体运动或变形）
    #[serde(default)]
    pub dynamic_grid: bool,

    /// 重启文件中额外跳过的湍流变量个数
    #[serde(default)]
    pub turbulent_skip_vars: usize,

    /// 多重网格粗层数，求解器只为前 `n_mg_levels` 个粗层分配状态
    #[serde(default)]
    pub n_mg_levels: usize,

    /// 线性求解器参数
    #[serde(default)]
    pub linear_solver: LinearSolverConfig,

    /// 远场参考标量状态
    #[serde(default = "default_far_field")]
    pub scalar_far_field: Vec<f64>,
}

fn default_n_dim() -> usize { 2 }
fn default_n_var() -> usize { 1 }
fn default_true() -> bool { true }
fn default_cfl_reduction() -> f64 { 1.0 }
fn default_allowable_ratio() -> f64 { 0.99 }
fn default_relaxation_floor() -> f64 { 1e-10 }
fn default_coloring_threshold() -> f64 { 0.875 }
fn default_min_chunk() -> usize { 32 }
fn default_max_chunk() -> usize { 512 }
fn default_edge_group_size() -> usize { 512 }
fn default_far_field() -> Vec<f64> { vec![0.0] }

impl Default for ScalarSolverConfig {
    fn default() -> Self {
        Self {
            n_dim: default_n_dim(),
            n_var: default_n_var(),
            time_integration: TimeIntegration::default(),
            time_marching: TimeMarching::default(),
            regime: FlowRegime::default(),
            muscl_scalar: false,
            muscl_flow: false,
            flow_upwind: default_true(),
            scalar_limiter: LimiterKind::default(),
            flow_limiter: LimiterKind::default(),
            cfl_reduction: default_cfl_reduction(),
            delta_unsteady_time: 0.0,
            clipping_min: Vec::new(),
            clipping_max: Vec::new(),
            allowable_ratio: default_allowable_ratio(),
            relaxation_floor: default_relaxation_floor(),
            coloring_efficiency_threshold: default_coloring_threshold(),
            min_chunk_size: default_min_chunk(),
            max_chunk_size: default_max_chunk(),
            edge_group_size: default_edge_group_size(),
            dynamic_grid: false,
            turbulent_skip_vars: 0,
            n_mg_levels: 0,
            linear_solver: LinearSolverConfig::default(),
            scalar_far_field: default_far_field(),
        }
    }
}

impl ScalarSolverConfig {
    /// 指定变量个数，远场状态补零到相同长度
    pub fn with_n_var(mut self, n_var: usize) -> Self {
        self.n_var = n_var;
        self.scalar_far_field.resize(n_var, 0.0);
        self
    }

    /// 是否隐式
    #[inline]
    pub fn is_implicit(&self) -> bool {
        self.time_integration == TimeIntegration::EulerImplicit
    }

    /// 是否双时间步
    #[inline]
    pub fn is_dual_time(&self) -> bool {
        self.time_marching.is_dual_time()
    }

    /// 是否可压缩
    #[inline]
    pub fn is_compressible(&self) -> bool {
        self.regime == FlowRegime::Compressible
    }

    /// 是否重构流场原始变量
    ///
    /// 需要流场与标量同时启用 MUSCL 且流场采用迎风格式。
    #[inline]
    pub fn reconstruct_flow(&self) -> bool {
        self.muscl_flow && self.muscl_scalar && self.flow_upwind
    }

    /// 流场重构是否使用存储的限制因子（边限制器需重新计算，不使用）
    #[inline]
    pub fn limit_flow(&self) -> bool {
        self.flow_limiter.is_node_based()
    }

    /// 标量重构是否使用限制因子
    #[inline]
    pub fn limit_scalar(&self) -> bool {
        self.scalar_limiter.is_active()
    }

    /// 第 `var` 个变量的裁剪范围
    pub fn clip_bounds(&self, var: usize) -> (f64, f64) {
        let lo = self.clipping_min.get(var).copied().unwrap_or(f64::NEG_INFINITY);
        let hi = self.clipping_max.get(var).copied().unwrap_or(f64::INFINITY);
        (lo, hi)
    }

    /// 重启记录中本求解器变量之前需要跳过的字段数
    pub fn restart_skip_vars(&self) -> usize {
        let flow = if self.n_dim == 3 { 8 } else { 6 };
        flow + self.turbulent_skip_vars
    }

    /// 节点循环的静态块大小
    ///
    /// 每个线程的工作量均分为不超过 `max_chunk_size` 的块，结果不小于
    /// `min_chunk_size`。
    pub fn node_chunk_size(&self, n_point: usize, n_threads: usize) -> usize {
        let work = n_point.max(1).div_ceil(n_threads.max(1));
        let n_chunks = work.div_ceil(self.max_chunk_size.max(1));
        work.div_ceil(n_chunks).max(self.min_chunk_size)
    }

    /// 从 JSON 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ScalarSolverConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到 JSON 文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_dim != 2 && self.n_dim != 3 {
            return Err(ConfigError::invalid("n_dim", self.n_dim, "只支持 2 或 3 维"));
        }
        if self.n_var == 0 {
            return Err(ConfigError::invalid("n_var", self.n_var, "至少需要一个标量变量"));
        }
        if self.cfl_reduction <= 0.0 {
            return Err(ConfigError::invalid("cfl_reduction", self.cfl_reduction, "必须为正"));
        }
        if self.is_dual_time() && self.delta_unsteady_time <= 0.0 {
            return Err(ConfigError::invalid(
                "delta_unsteady_time",
                self.delta_unsteady_time,
                "双时间步需要正的物理时间步长",
            ));
        }
        if !(self.allowable_ratio > 0.0 && self.allowable_ratio <= 1.0) {
            return Err(ConfigError::invalid(
                "allowable_ratio",
                self.allowable_ratio,
                "必须在 (0, 1] 范围内",
            ));
        }
        if self.relaxation_floor < 0.0 || self.relaxation_floor >= 1.0 {
            return Err(ConfigError::invalid(
                "relaxation_floor",
                self.relaxation_floor,
                "必须在 [0, 1) 范围内",
            ));
        }
        if !(0.0..=1.0).contains(&self.coloring_efficiency_threshold) {
            return Err(ConfigError::invalid(
                "coloring_efficiency_threshold",
                self.coloring_efficiency_threshold,
                "必须在 [0, 1] 范围内",
            ));
        }
        if self.min_chunk_size == 0 || self.max_chunk_size < self.min_chunk_size {
            return Err(ConfigError::invalid(
                "min_chunk_size",
                self.min_chunk_size,
                "必须为正且不大于 max_chunk_size",
            ));
        }
        if self.edge_group_size == 0 {
            return Err(ConfigError::invalid("edge_group_size", 0, "必须为正"));
        }
        if self.scalar_far_field.len() != self.n_var {
            return Err(ConfigError::invalid(
                "scalar_far_field",
                self.scalar_far_field.len(),
                "长度必须等于 n_var",
            ));
        }
        for var in 0..self.n_var {
            let (lo, hi) = self.clip_bounds(var);
            if lo > hi {
                return Err(ConfigError::invalid(
                    "clipping_min",
                    lo,
                    "裁剪下限不能大于上限",
                ));
            }
        }
        if self.linear_solver.tolerance <= 0.0 || self.linear_solver.max_iterations == 0 {
            return Err(ConfigError::invalid(
                "linear_solver",
                self.linear_solver.tolerance,
                "容差与最大迭代次数必须为正",
            ));
        }
        Ok(())
    }
}
