// crates/sc_physics/src/solver.rs

//! 标量输运求解器
//!
//! 一次非线性迭代的阶段顺序：
//!
//! ```text
//! preprocessing           残差/Jacobian 清零，扩散系数、梯度、限制因子
//! upwind_residual         边循环（对流 + 粘性）
//! apply_boundary_conditions  边界通量 + 周期残差交换
//! set_residual_dual_time  物理时间源项
//! implicit_euler_iteration   准备 → 线性求解 → 更新与同步
//! ```
//!
//! 各阶段严格顺序执行，上一阶段的写入在下一阶段开始前全部完成。

use std::collections::HashMap;

use log::{debug, info, warn};
use rayon::prelude::*;
use sc_config::{ConfigError, LimiterKind, ScalarSolverConfig};
use sc_foundation::ScError;
use sc_mesh::{EdgeColoring, MeshGraph, MeshHierarchy};

use crate::boundary::{BoundaryDispatcher, BoundaryKind, InletProfiles};
use crate::coloring::{AssemblyMode, ColoringAdapter};
use crate::comms::{Communicator, ExchangeKind, SerialComms};
use crate::engine::{self, EdgeAssembler, FluxLaws};
use crate::error::ScalarResult;
use crate::numerics::gradient::{copy_halo_gradients, green_gauss_gradient};
use crate::numerics::limiter::{compute_node_limiter, BarthJespersen, SlopeLimiter, Venkatakrishnan};
use crate::numerics::linear_algebra::{BiCgStab, BlockCsrMatrix, SolverConfig};
use crate::restart::{self, RestartBuffer};
use crate::schemes::{ConstantDiffusivity, ScalarUpwind};
use crate::state::ScalarState;
use crate::traits::{
    ConvectiveFluxLaw, DiffusivityModel, FlowStateProvider, LinearSolver, RestartHooks, ViscousFluxLaw,
};
use crate::types::{PrimitiveLayout, ResidualNorms};

// ============================================================
// 求解器
// ============================================================

/// 标量输运求解器
///
/// 残差、Jacobian 与着色只针对最细层网格；粗层只保存限制后的解。
pub struct ScalarSolver {
    config: ScalarSolverConfig,

    // ===== 协作者 =====
    convective: Box<dyn ConvectiveFluxLaw>,
    viscous: Option<Box<dyn ViscousFluxLaw>>,
    diffusivity: Box<dyn DiffusivityModel>,
    slope_limiter: Option<Box<dyn SlopeLimiter>>,
    linear_solver: Box<dyn LinearSolver>,
    comms: Box<dyn Communicator>,

    // ===== 状态 =====
    states: Vec<ScalarState>,
    residual: Vec<f64>,
    increment: Vec<f64>,
    edge_fluxes: Vec<f64>,
    jacobian: BlockCsrMatrix,

    // ===== 网格相关 =====
    adapter: ColoringAdapter,
    dispatcher: BoundaryDispatcher,
    inlet: InletProfiles,

    // ===== 诊断 =====
    norms: ResidualNorms,
    last_linear_iterations: usize,
    last_linear_residual: f64,
}

impl ScalarSolver {
    /// 创建构建器
    pub fn builder(config: ScalarSolverConfig) -> ScalarSolverBuilder {
        ScalarSolverBuilder::new(config)
    }

    // =========================================================================
    // 迭代阶段
    // =========================================================================

    /// 迭代前处理
    pub fn preprocessing(&mut self, mesh: &MeshGraph, flow: &dyn FlowStateProvider) -> ScalarResult<()> {
        let n_var = self.config.n_var;
        ScError::check_size("mesh_points", self.states[0].n_point(), mesh.n_point())?;
        ScError::check_size("mesh_edges", self.edge_fluxes.len() / n_var, mesh.n_edge())?;
        let min_prim = PrimitiveLayout::new(mesh.n_dim()).min_len();
        if flow.n_prim_var() < min_prim {
            return Err(ScError::size_mismatch("flow_primitive", min_prim, flow.n_prim_var()).into());
        }

        self.residual.par_iter_mut().for_each(|r| *r = 0.0);
        if self.config.is_implicit() {
            self.jacobian.set_zero();
        }

        let state = &mut self.states[0];
        let model = self.diffusivity.as_ref();
        let chunk = engine::node_chunk_size(&self.config, mesh.n_point());
        state
            .diffusivity
            .par_chunks_mut(n_var)
            .enumerate()
            .with_min_len(chunk)
            .with_max_len(chunk)
            .for_each(|(point, d)| {
                for (var, x) in d.iter_mut().enumerate() {
                    *x = model.diffusivity(flow, point, var);
                }
            });

        if self.config.muscl_scalar || self.viscous.is_some() {
            green_gauss_gradient(mesh, &state.solution, n_var, &mut state.gradient);
            copy_halo_gradients(mesh, n_var, &mut state.gradient);
        }

        if self.config.limit_scalar() {
            match self.slope_limiter.as_deref() {
                Some(law) => {
                    compute_node_limiter(mesh, &state.solution, &state.gradient, n_var, law, &mut state.limiter)
                }
                None => state.limiter.fill(1.0),
            }
        }
        Ok(())
    }

    /// 边循环：对流与粘性残差
    pub fn upwind_residual(&mut self, mesh: &MeshGraph, flow: &dyn FlowStateProvider) {
        let laws = FluxLaws {
            convective: self.convective.as_ref(),
            viscous: self.viscous.as_deref(),
        };
        let assembler = EdgeAssembler::new(mesh, flow, &self.states[0], &self.config, laws);
        assembler.assemble(&self.adapter, &mut self.residual, &mut self.edge_fluxes, &mut self.jacobian);
    }

    /// 边界条件与周期残差交换
    ///
    /// 周期标记对按顺序逐对交换，共享节点的累加顺序固定。
    pub fn apply_boundary_conditions(&mut self, mesh: &MeshGraph, flow: &dyn FlowStateProvider) -> ScalarResult<()> {
        let n_var = self.config.n_var;
        self.dispatcher.apply(
            mesh,
            flow,
            &self.states[0],
            &self.config,
            &self.inlet,
            self.convective.as_ref(),
            &mut self.residual,
            &mut self.jacobian,
        );

        let implicit = self.config.is_implicit();
        for pair in mesh.periodic_pairs() {
            let request = self
                .comms
                .initiate(mesh, ExchangeKind::PeriodicResidual { pair }, &self.residual, n_var)?;
            let jacobian = implicit.then_some(&mut self.jacobian);
            self.comms.complete(mesh, request, &mut self.residual, jacobian)?;
        }
        Ok(())
    }

    /// 双时间步源项
    pub fn set_residual_dual_time(&mut self, mesh: &MeshGraph, flow: &dyn FlowStateProvider) {
        let jacobian = self.config.is_implicit().then_some(&mut self.jacobian);
        engine::set_residual_dual_time(
            mesh,
            flow,
            &self.states[0],
            &self.config,
            self.dispatcher.kinds(),
            &mut self.residual,
            jacobian,
        );
    }

    /// 隐式欧拉迭代，返回本次残差范数
    pub fn implicit_euler_iteration(
        &mut self,
        mesh: &MeshGraph,
        flow: &dyn FlowStateProvider,
    ) -> ScalarResult<&ResidualNorms> {
        let (norms, result) = engine::implicit_euler_iteration(
            mesh,
            flow,
            &mut self.states[0],
            &self.config,
            &mut self.residual,
            &mut self.increment,
            &mut self.jacobian,
            self.linear_solver.as_mut(),
            self.comms.as_mut(),
        )?;
        self.last_linear_iterations = result.iterations;
        self.last_linear_residual = result.residual_norm;
        self.norms = norms;
        Ok(&self.norms)
    }

    /// 完整的一次非线性迭代
    pub fn iteration(&mut self, mesh: &MeshGraph, flow: &dyn FlowStateProvider) -> ScalarResult<&ResidualNorms> {
        if !self.config.is_implicit() {
            return Err(ConfigError::invalid(
                "time_integration",
                format!("{:?}", self.config.time_integration),
                "标量求解器的非线性迭代只支持隐式格式",
            )
            .into());
        }
        self.preprocessing(mesh, flow)?;
        self.upwind_residual(mesh, flow);
        self.apply_boundary_conditions(mesh, flow)?;
        self.set_residual_dual_time(mesh, flow);
        self.implicit_euler_iteration(mesh, flow)
    }

    /// 物理时间步结束：推进所有网格层的时间层
    pub fn push_time_levels(&mut self) {
        for state in &mut self.states {
            state.push_time_levels();
        }
    }

    // =========================================================================
    // 重启
    // =========================================================================

    /// 加载重启数据并限制到粗层，返回读入的点数
    pub fn load_restart(
        &mut self,
        hierarchy: &MeshHierarchy,
        buffer: &RestartBuffer,
        hooks: &mut dyn RestartHooks,
    ) -> ScalarResult<usize> {
        let skip = self.config.restart_skip_vars();
        restart::load_restart(hierarchy, &mut self.states, buffer, skip, self.comms.as_mut(), hooks)
    }

    // =========================================================================
    // 入口剖面
    // =========================================================================

    /// 从 `val_inlet[inlet_position..]` 读取标量写入入口顶点
    pub fn set_inlet_at_vertex(
        &mut self,
        val_inlet: &[f64],
        inlet_position: usize,
        marker: usize,
        vertex: usize,
    ) -> ScalarResult<()> {
        let n_var = self.config.n_var;
        let end = inlet_position + n_var;
        if end > val_inlet.len() {
            return Err(ScError::index_out_of_bounds("inlet_position", end - 1, val_inlet.len()).into());
        }
        self.inlet.set(marker, vertex, &val_inlet[inlet_position..end])?;
        Ok(())
    }

    /// 查找入口顶点并把标量写入 `val_inlet[inlet_position..]`
    ///
    /// 返回边界面面积；`point` 不在类型为 `kind`、名称为 `tag` 的标记上时返回 0。
    pub fn inlet_at_vertex(
        &self,
        mesh: &MeshGraph,
        val_inlet: &mut [f64],
        point: usize,
        kind: BoundaryKind,
        tag: &str,
        inlet_position: usize,
    ) -> ScalarResult<f64> {
        let n_var = self.config.n_var;
        let end = inlet_position + n_var;
        if end > val_inlet.len() {
            return Err(ScError::index_out_of_bounds("inlet_position", end - 1, val_inlet.len()).into());
        }

        for (m, marker) in mesh.markers().iter().enumerate() {
            if self.dispatcher.kind(m) != kind || kind != BoundaryKind::Inlet || marker.tag != tag {
                continue;
            }
            if let Some(v) = marker.vertices.iter().position(|vertex| vertex.node == point) {
                val_inlet[inlet_position..end].copy_from_slice(self.inlet.try_get(m, v)?);
                return Ok(marker.vertices[v].normal.length());
            }
        }
        Ok(0.0)
    }

    /// 入口标记所有顶点设为远场参考状态
    pub fn set_uniform_inlet(&mut self, marker: usize) -> ScalarResult<()> {
        self.inlet.set_uniform(marker, &self.config.scalar_far_field)?;
        Ok(())
    }

    // =========================================================================
    // 访问器
    // =========================================================================

    /// 配置
    pub fn config(&self) -> &ScalarSolverConfig {
        &self.config
    }

    /// 最细层状态
    pub fn state(&self) -> &ScalarState {
        &self.states[0]
    }

    /// 最细层状态（可变）
    pub fn state_mut(&mut self) -> &mut ScalarState {
        &mut self.states[0]
    }

    /// 第 `level` 层状态
    pub fn level_state(&self, level: usize) -> &ScalarState {
        &self.states[level]
    }

    /// 网格层数
    pub fn n_levels(&self) -> usize {
        self.states.len()
    }

    /// 残差（隐式迭代后为右端项 `−R`）
    pub fn residual(&self) -> &[f64] {
        &self.residual
    }

    /// Jacobian
    pub fn jacobian(&self) -> &BlockCsrMatrix {
        &self.jacobian
    }

    /// 最近一次隐式迭代的残差范数
    pub fn norms(&self) -> &ResidualNorms {
        &self.norms
    }

    /// 最近一次线性求解的迭代次数
    pub fn last_linear_iterations(&self) -> usize {
        self.last_linear_iterations
    }

    /// 最近一次线性求解的残差
    pub fn last_linear_residual(&self) -> f64 {
        self.last_linear_residual
    }

    /// 着色适配器
    pub fn adapter(&self) -> &ColoringAdapter {
        &self.adapter
    }

    /// 边界分派器
    pub fn dispatcher(&self) -> &BoundaryDispatcher {
        &self.dispatcher
    }

    /// 入口剖面表
    pub fn inlet_profiles(&self) -> &InletProfiles {
        &self.inlet
    }
}

// ============================================================
// 构建器
// ============================================================

/// 求解器构建器
pub struct ScalarSolverBuilder {
    config: ScalarSolverConfig,
    convective: Option<Box<dyn ConvectiveFluxLaw>>,
    viscous: Option<Box<dyn ViscousFluxLaw>>,
    diffusivity: Option<Box<dyn DiffusivityModel>>,
    linear_solver: Option<Box<dyn LinearSolver>>,
    comms: Option<Box<dyn Communicator>>,
    boundary_kinds: Option<HashMap<String, BoundaryKind>>,
    assembly_mode: Option<AssemblyMode>,
}

impl ScalarSolverBuilder {
    /// 创建构建器
    pub fn new(config: ScalarSolverConfig) -> Self {
        Self {
            config,
            convective: None,
            viscous: None,
            diffusivity: None,
            linear_solver: None,
            comms: None,
            boundary_kinds: None,
            assembly_mode: None,
        }
    }

    /// 对流通量律（默认 [`ScalarUpwind`]）
    pub fn convective(mut self, law: impl ConvectiveFluxLaw + 'static) -> Self {
        self.convective = Some(Box::new(law));
        self
    }

    /// 粘性通量律（默认无扩散）
    pub fn viscous(mut self, law: impl ViscousFluxLaw + 'static) -> Self {
        self.viscous = Some(Box::new(law));
        self
    }

    /// 扩散系数模型（默认常数 0）
    pub fn diffusivity(mut self, model: impl DiffusivityModel + 'static) -> Self {
        self.diffusivity = Some(Box::new(model));
        self
    }

    /// 线性求解器（默认按配置构建的 [`BiCgStab`]）
    pub fn linear_solver(mut self, solver: impl LinearSolver + 'static) -> Self {
        self.linear_solver = Some(Box::new(solver));
        self
    }

    /// 通信实现（默认 [`SerialComms`]）
    pub fn comms(mut self, comms: impl Communicator + 'static) -> Self {
        self.comms = Some(Box::new(comms));
        self
    }

    /// 标记名到边界类型的映射（默认所有非周期标记为远场）
    pub fn boundary_kinds(mut self, mapping: HashMap<String, BoundaryKind>) -> Self {
        self.boundary_kinds = Some(mapping);
        self
    }

    /// 强制累加方式（默认按着色效率选择）
    pub fn assembly_mode(mut self, mode: AssemblyMode) -> Self {
        self.assembly_mode = Some(mode);
        self
    }

    /// 构建求解器
    pub fn build(self, hierarchy: &MeshHierarchy) -> ScalarResult<ScalarSolver> {
        let config = self.config;
        config.validate()?;

        let mesh = hierarchy.finest();
        if mesh.n_dim() != config.n_dim {
            return Err(ConfigError::invalid(
                "n_dim",
                config.n_dim,
                &format!("与网格维数 {} 不符", mesh.n_dim()),
            )
            .into());
        }
        if hierarchy.n_coarse_levels() < config.n_mg_levels {
            return Err(ConfigError::invalid(
                "n_mg_levels",
                config.n_mg_levels,
                &format!("网格只有 {} 个粗层", hierarchy.n_coarse_levels()),
            )
            .into());
        }
        let n_var = config.n_var;

        let states = (0..=config.n_mg_levels)
            .map(|k| ScalarState::new(hierarchy.graph(k).n_point(), n_var, &config.scalar_far_field))
            .collect::<Result<Vec<_>, _>>()?;

        let adapter = match self.assembly_mode {
            Some(mode) => ColoringAdapter::with_mode(
                mesh,
                EdgeColoring::greedy(mesh, config.edge_group_size),
                mode,
                config.min_chunk_size,
            )?,
            None => ColoringAdapter::from_mesh(mesh, &config),
        };

        let dispatcher = match &self.boundary_kinds {
            Some(mapping) => BoundaryDispatcher::new(mesh, mapping)?,
            None => BoundaryDispatcher::uniform(mesh, BoundaryKind::FarField),
        };

        let slope_limiter: Option<Box<dyn SlopeLimiter>> = match config.scalar_limiter {
            LimiterKind::None => None,
            LimiterKind::Venkatakrishnan => Some(Box::new(Venkatakrishnan::default())),
            LimiterKind::BarthJespersen => Some(Box::new(BarthJespersen)),
            LimiterKind::VanAlbadaEdge => {
                warn!("VanAlbadaEdge 为边限制器，标量节点限制因子保持 1");
                None
            }
        };

        let linear_solver = self
            .linear_solver
            .unwrap_or_else(|| Box::new(BiCgStab::new(SolverConfig::from(&config.linear_solver))));

        info!(
            "标量求解器: {} 个变量, {} 个节点, {} 条边, {} 层网格, 模式 {:?}",
            n_var,
            mesh.n_point(),
            mesh.n_edge(),
            states.len(),
            adapter.mode()
        );
        debug!("边界类型: {:?}", dispatcher.kinds());

        Ok(ScalarSolver {
            convective: self.convective.unwrap_or_else(|| Box::new(ScalarUpwind::new())),
            viscous: self.viscous,
            diffusivity: self
                .diffusivity
                .unwrap_or_else(|| Box::new(ConstantDiffusivity::uniform(0.0))),
            slope_limiter,
            linear_solver,
            comms: self.comms.unwrap_or_else(|| Box::new(SerialComms::new())),
            states,
            residual: vec![0.0; mesh.n_point() * n_var],
            increment: vec![0.0; mesh.n_point() * n_var],
            edge_fluxes: vec![0.0; mesh.n_edge() * n_var],
            jacobian: BlockCsrMatrix::from_mesh(mesh, n_var),
            adapter,
            dispatcher,
            inlet: InletProfiles::new(mesh, &config.scalar_far_field),
            norms: ResidualNorms::zeros(n_var),
            last_linear_iterations: 0,
            last_linear_residual: 0.0,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowField;
    use glam::DVec3;
    use sc_mesh::generation::DualMeshGenerator;

    fn hierarchy(nx: usize, ny: usize) -> MeshHierarchy {
        MeshHierarchy::single(DualMeshGenerator::new(nx, ny, 1.0, 1.0).build().unwrap())
    }

    #[test]
    fn test_builder_defaults() {
        let h = hierarchy(3, 3);
        let solver = ScalarSolver::builder(ScalarSolverConfig::default()).build(&h).unwrap();
        assert_eq!(solver.n_levels(), 1);
        assert_eq!(solver.state().n_point(), 16);
        assert!(solver
            .dispatcher()
            .kinds()
            .iter()
            .all(|&k| k == BoundaryKind::FarField));
        assert_eq!(solver.residual().len(), 16);
    }

    #[test]
    fn test_multigrid_levels_follow_config() {
        let mesh = DualMeshGenerator::new(5, 4, 1.0, 1.0).build().unwrap();
        let h = MeshHierarchy::agglomerate(mesh, 2).unwrap();
        assert_eq!(h.n_levels(), 3);

        let solver = ScalarSolver::builder(ScalarSolverConfig::default()).build(&h).unwrap();
        assert_eq!(solver.n_levels(), 1);

        let config = ScalarSolverConfig {
            n_mg_levels: 1,
            ..Default::default()
        };
        let solver = ScalarSolver::builder(config).build(&h).unwrap();
        assert_eq!(solver.n_levels(), 2);
        assert_eq!(solver.level_state(1).n_point(), h.graph(1).n_point());

        let config = ScalarSolverConfig {
            n_mg_levels: 3,
            ..Default::default()
        };
        assert!(ScalarSolver::builder(config).build(&h).is_err());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let h = hierarchy(2, 2);
        let config = ScalarSolverConfig {
            n_dim: 3,
            ..Default::default()
        };
        assert!(ScalarSolver::builder(config).build(&h).is_err());
    }

    #[test]
    fn test_explicit_iteration_rejected() {
        let h = hierarchy(2, 2);
        let config = ScalarSolverConfig {
            time_integration: sc_config::TimeIntegration::Explicit,
            ..Default::default()
        };
        let mut solver = ScalarSolver::builder(config).build(&h).unwrap();
        let flow = FlowField::uniform(h.finest().n_point(), 2, DVec3::X, 1.0, 0.1);
        assert!(solver.iteration(h.finest(), &flow).is_err());
    }

    #[test]
    fn test_uniform_field_stays_uniform() {
        let h = hierarchy(4, 4);
        let config = ScalarSolverConfig {
            scalar_far_field: vec![0.4],
            ..Default::default()
        };
        let mut solver = ScalarSolver::builder(config).build(&h).unwrap();
        let flow = FlowField::uniform(h.finest().n_point(), 2, DVec3::new(1.0, 0.3, 0.0), 1.2, 0.05);
        let norms = solver.iteration(h.finest(), &flow).unwrap().clone();
        assert!(norms.max[0] < 1e-12);
        assert!(solver.state().solution.iter().all(|&u| (u - 0.4).abs() < 1e-12));
    }

    #[test]
    fn test_inlet_round_trip() {
        let h = hierarchy(2, 2);
        let mesh = h.finest();
        let mut mapping = HashMap::new();
        mapping.insert("left".to_string(), BoundaryKind::Inlet);
        mapping.insert("right".to_string(), BoundaryKind::Outlet);
        mapping.insert("bottom".to_string(), BoundaryKind::Symmetry);
        mapping.insert("top".to_string(), BoundaryKind::Symmetry);
        let config = ScalarSolverConfig::default().with_n_var(2);
        let mut solver = ScalarSolver::builder(config).boundary_kinds(mapping).build(&h).unwrap();

        solver.set_inlet_at_vertex(&[9.0, 0.2, 0.3], 1, 0, 1).unwrap();
        let point = mesh.marker(0).vertices[1].node;

        let mut out = [0.0; 4];
        let area = solver
            .inlet_at_vertex(mesh, &mut out, point, BoundaryKind::Inlet, "left", 2)
            .unwrap();
        assert!((area - 0.5).abs() < 1e-14);
        assert_eq!(out, [0.0, 0.0, 0.2, 0.3]);

        let area = solver
            .inlet_at_vertex(mesh, &mut out, point, BoundaryKind::Inlet, "right", 2)
            .unwrap();
        assert_eq!(area, 0.0);

        solver.set_uniform_inlet(0).unwrap();
        assert_eq!(solver.inlet_profiles().get(0, 1), &[0.0, 0.0]);
    }
}
