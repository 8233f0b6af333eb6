// crates/sc_physics/src/engine/assembly.rs

//! 边循环残差与 Jacobian 组装
//!
//! 每条边 (i, j) 依次执行：
//!
//! 1. 取两端流场原始变量与标量（零阶）
//! 2. 按配置沿半边做 MUSCL 重构（i 端加投影，j 端减投影）
//! 3. 调用对流通量律，得到残差与两端 Jacobian 块
//! 4. 若有粘性通量律，以未重构状态计算扩散通量
//! 5. 按着色模式写入：
//!    - 直接模式：对流 `R_i += F, R_j −= F`，粘性 `R_i −= G, R_j += G`
//!    - 归约模式：边通量 `E_e = F − G`，Jacobian 只写非对角块
//!
//! 归约模式的边循环结束后，[`sum_edge_fluxes`] 按节点并行汇总边通量，
//! 再由列和重建 Jacobian 对角块。

use glam::DVec3;
use log::trace;
use rayon::prelude::*;
use sc_config::ScalarSolverConfig;
use sc_mesh::MeshGraph;

use crate::coloring::ColoringAdapter;
use crate::numerics::linear_algebra::{BlockCsrMatrix, JacobianWriter};
use crate::numerics::reconstruct;
use crate::shared::SharedSlice;
use crate::state::ScalarState;
use crate::traits::{ConvectiveFluxLaw, FlowStateProvider, ViscousFluxLaw};
use crate::types::{ConvectiveInput, FluxResult, PrimitiveLayout, ViscousInput};

// ============================================================
// 通量律组合
// ============================================================

/// 边循环使用的通量律
#[derive(Clone, Copy)]
pub struct FluxLaws<'a> {
    /// 对流通量律
    pub convective: &'a dyn ConvectiveFluxLaw,
    /// 粘性通量律（无扩散时为 `None`）
    pub viscous: Option<&'a dyn ViscousFluxLaw>,
}

// ============================================================
// 线程工作区
// ============================================================

/// 每个 rayon 任务独占的边计算缓冲
struct EdgeWorkspace {
    convective: FluxResult,
    viscous: FluxResult,
    prim_i: Vec<f64>,
    prim_j: Vec<f64>,
    scalar_i: Vec<f64>,
    scalar_j: Vec<f64>,
}

impl EdgeWorkspace {
    fn new(n_var: usize, n_prim: usize) -> Self {
        Self {
            convective: FluxResult::new(n_var),
            viscous: FluxResult::new(n_var),
            prim_i: vec![0.0; n_prim],
            prim_j: vec![0.0; n_prim],
            scalar_i: vec![0.0; n_var],
            scalar_j: vec![0.0; n_var],
        }
    }
}

// ============================================================
// 边组装器
// ============================================================

/// 边循环组装器
///
/// 构造时固化配置开关，组装期间只读访问网格、流场与标量状态。
pub struct EdgeAssembler<'a> {
    mesh: &'a MeshGraph,
    flow: &'a dyn FlowStateProvider,
    state: &'a ScalarState,
    laws: FluxLaws<'a>,
    layout: PrimitiveLayout,
    n_var: usize,
    implicit: bool,
    muscl_scalar: bool,
    limit_scalar: bool,
    reconstruct_flow: bool,
    limit_flow: bool,
    dynamic_grid: bool,
}

impl<'a> EdgeAssembler<'a> {
    /// 创建组装器
    pub fn new(
        mesh: &'a MeshGraph,
        flow: &'a dyn FlowStateProvider,
        state: &'a ScalarState,
        config: &ScalarSolverConfig,
        laws: FluxLaws<'a>,
    ) -> Self {
        Self {
            mesh,
            flow,
            state,
            laws,
            layout: PrimitiveLayout::new(mesh.n_dim()),
            n_var: state.n_var(),
            implicit: config.is_implicit(),
            muscl_scalar: config.muscl_scalar,
            limit_scalar: config.limit_scalar(),
            reconstruct_flow: config.reconstruct_flow(),
            limit_flow: config.limit_flow(),
            dynamic_grid: config.dynamic_grid,
        }
    }

    fn workspace(&self) -> EdgeWorkspace {
        EdgeWorkspace::new(self.n_var, self.flow.n_prim_var())
    }

    /// 计算单条边的对流与粘性通量，返回端点
    fn compute_edge(&self, edge: usize, ws: &mut EdgeWorkspace) -> (usize, usize) {
        let mesh = self.mesh;
        let flow = self.flow;
        let state = self.state;
        let (i, j) = mesh.edge_nodes(edge);
        let normal = mesh.edge_normal(edge);
        let coord_i = mesh.coord(i);
        let coord_j = mesh.coord(j);

        ws.prim_i.copy_from_slice(flow.primitive(i));
        ws.prim_j.copy_from_slice(flow.primitive(j));
        ws.scalar_i.copy_from_slice(state.node(i));
        ws.scalar_j.copy_from_slice(state.node(j));

        if self.muscl_scalar || self.reconstruct_flow {
            let half_edge = 0.5 * (coord_j - coord_i);

            if self.reconstruct_flow {
                let n_grad = flow.n_prim_var_grad();
                let grad_i = &flow.reconstruction_gradient(i)[..n_grad];
                let grad_j = &flow.reconstruction_gradient(j)[..n_grad];
                let lim_i = self.limit_flow.then(|| &flow.limiter(i)[..n_grad]);
                let lim_j = self.limit_flow.then(|| &flow.limiter(j)[..n_grad]);
                reconstruct(flow.primitive(i), grad_i, lim_i, half_edge, 1.0, &mut ws.prim_i);
                reconstruct(flow.primitive(j), grad_j, lim_j, half_edge, -1.0, &mut ws.prim_j);
            }

            if self.muscl_scalar {
                let lim_i = self.limit_scalar.then(|| state.node_limiter(i));
                let lim_j = self.limit_scalar.then(|| state.node_limiter(j));
                reconstruct(state.node(i), state.node_gradient(i), lim_i, half_edge, 1.0, &mut ws.scalar_i);
                reconstruct(state.node(j), state.node_gradient(j), lim_j, half_edge, -1.0, &mut ws.scalar_j);
            }
        }

        let grid_velocity = self
            .dynamic_grid
            .then(|| (mesh.grid_velocity(i), mesh.grid_velocity(j)));

        let input = ConvectiveInput {
            layout: self.layout,
            normal,
            primitive_i: &ws.prim_i,
            primitive_j: &ws.prim_j,
            scalar_i: &ws.scalar_i,
            scalar_j: &ws.scalar_j,
            grid_velocity,
        };
        self.laws.convective.compute(&input, self.implicit, &mut ws.convective);

        if let Some(law) = self.laws.viscous {
            let input = ViscousInput {
                layout: self.layout,
                normal,
                coord_i,
                coord_j,
                primitive_i: flow.primitive(i),
                primitive_j: flow.primitive(j),
                scalar_i: state.node(i),
                scalar_j: state.node(j),
                gradient_i: state.node_gradient(i),
                gradient_j: state.node_gradient(j),
                diffusivity_i: state.node_diffusivity(i),
                diffusivity_j: state.node_diffusivity(j),
            };
            law.compute(&input, self.implicit, &mut ws.viscous);
        }

        (i, j)
    }

    /// 执行边循环
    ///
    /// `residual` 须已清零；`edge_fluxes` 长度为 `n_edge * n_var`，只在归约模式使用。
    /// 显式格式下不写 `jacobian`。
    pub fn assemble(
        &self,
        adapter: &ColoringAdapter,
        residual: &mut [f64],
        edge_fluxes: &mut [f64],
        jacobian: &mut BlockCsrMatrix,
    ) {
        debug_assert_eq!(residual.len(), self.mesh.n_point() * self.n_var);
        // 直接模式的写入互斥依赖着色与本网格一致
        assert_eq!(
            adapter.coloring().n_edge(),
            self.mesh.n_edge(),
            "着色边数与网格不符"
        );

        if adapter.is_reducer() {
            debug_assert_eq!(edge_fluxes.len(), self.mesh.n_edge() * self.n_var);
            self.assemble_reducer(adapter.chunk_size(), edge_fluxes, jacobian);
            sum_edge_fluxes(self.mesh, edge_fluxes, self.n_var, residual);
            if self.implicit {
                jacobian.set_diagonal_as_column_sum();
            }
        } else {
            self.assemble_direct(adapter, residual, jacobian);
        }
        trace!(
            "边循环完成: {} 条边, 模式 {:?}, 块大小 {}",
            self.mesh.n_edge(),
            adapter.mode(),
            adapter.chunk_size()
        );
    }

    // =========================================================================
    // 直接模式
    // =========================================================================

    fn assemble_direct(&self, adapter: &ColoringAdapter, residual: &mut [f64], jacobian: &mut BlockCsrMatrix) {
        let chunk = adapter.chunk_size();
        let residual = SharedSlice::new(residual);
        let writer = self.implicit.then(|| jacobian.writer());

        // 颜色之间顺序执行；par_chunks 在颜色内部形成屏障
        for color in adapter.coloring().colors() {
            color
                .par_chunks(chunk)
                .for_each_init(
                    || self.workspace(),
                    |ws, edges| {
                        for &edge in edges {
                            let (i, j) = self.compute_edge(edge, ws);
                            // SAFETY: 直接模式的着色已通过 EdgeColoring::validate，
                            // 同一颜色的不同分组不共享节点；块大小为分组大小的整数倍，
                            // 分组不会被拆到两个任务中。因此节点 i、j 的残差与对角块
                            // 只被当前任务访问。非对角块 (i, j)/(j, i) 只属于本条边，
                            // 由 MeshGraphBuilder::build 拒绝重复边保证。
                            unsafe { self.write_direct(edge, i, j, ws, &residual, writer.as_ref()) };
                        }
                    },
                );
        }
    }

    /// # Safety
    ///
    /// 调用期间没有其他线程访问节点 `i`、`j` 的残差与 Jacobian 行。
    unsafe fn write_direct(
        &self,
        edge: usize,
        i: usize,
        j: usize,
        ws: &EdgeWorkspace,
        residual: &SharedSlice<'_, f64>,
        writer: Option<&JacobianWriter<'_>>,
    ) {
        let n_var = self.n_var;
        let visc = self.laws.viscous.is_some();

        {
            let res_i = unsafe { residual.slice_mut(i * n_var, n_var) };
            for (r, f) in res_i.iter_mut().zip(&ws.convective.residual) {
                *r += f;
            }
            if visc {
                for (r, g) in res_i.iter_mut().zip(&ws.viscous.residual) {
                    *r -= g;
                }
            }
        }
        {
            let res_j = unsafe { residual.slice_mut(j * n_var, n_var) };
            for (r, f) in res_j.iter_mut().zip(&ws.convective.residual) {
                *r -= f;
            }
            if visc {
                for (r, g) in res_j.iter_mut().zip(&ws.viscous.residual) {
                    *r += g;
                }
            }
        }

        if let Some(writer) = writer {
            unsafe {
                writer.update_blocks(edge, i, j, &ws.convective.jacobian_i, &ws.convective.jacobian_j);
                if visc {
                    writer.update_blocks_sub(edge, i, j, &ws.viscous.jacobian_i, &ws.viscous.jacobian_j);
                }
            }
        }
    }

    // =========================================================================
    // 归约模式
    // =========================================================================

    fn assemble_reducer(&self, chunk: usize, edge_fluxes: &mut [f64], jacobian: &mut BlockCsrMatrix) {
        let n_var = self.n_var;
        let visc = self.laws.viscous.is_some();
        let writer = self.implicit.then(|| jacobian.writer());
        let writer = writer.as_ref();

        edge_fluxes
            .par_chunks_mut(chunk * n_var)
            .enumerate()
            .for_each_init(
                || self.workspace(),
                |ws, (c, fluxes)| {
                    for (k, flux) in fluxes.chunks_mut(n_var).enumerate() {
                        let edge = c * chunk + k;
                        self.compute_edge(edge, ws);

                        flux.copy_from_slice(&ws.convective.residual);
                        if visc {
                            for (f, g) in flux.iter_mut().zip(&ws.viscous.residual) {
                                *f -= g;
                            }
                        }

                        if let Some(writer) = writer {
                            // SAFETY: MeshGraphBuilder::build 拒绝重复边，每条边的两个
                            // 非对角块只属于该边；自然着色中每条边只出现一次，
                            // 只由一个任务处理。对角块在边循环结束后按行填写。
                            unsafe {
                                writer.set_blocks(edge, &ws.convective.jacobian_i, &ws.convective.jacobian_j);
                                if visc {
                                    writer.update_blocks_sub_edge(
                                        edge,
                                        &ws.viscous.jacobian_i,
                                        &ws.viscous.jacobian_j,
                                    );
                                }
                            }
                        }
                    }
                },
            );
    }
}

/// 按节点汇总边通量
///
/// 节点为边的起点时加上边通量，否则减去。覆盖 `residual` 中的原有值。
pub fn sum_edge_fluxes(mesh: &MeshGraph, edge_fluxes: &[f64], n_var: usize, residual: &mut [f64]) {
    residual
        .par_chunks_mut(n_var)
        .enumerate()
        .for_each(|(point, res)| {
            res.fill(0.0);
            for &edge in mesh.node_edges(point) {
                let flux = &edge_fluxes[edge * n_var..(edge + 1) * n_var];
                if mesh.edge_nodes(edge).0 == point {
                    for (r, f) in res.iter_mut().zip(flux) {
                        *r += f;
                    }
                } else {
                    for (r, f) in res.iter_mut().zip(flux) {
                        *r -= f;
                    }
                }
            }
        });
}

/// 边中点网格速度与面法向的点积（GCL 边项）
#[inline]
pub(crate) fn edge_grid_flux(mesh: &MeshGraph, edge: usize) -> f64 {
    let (i, j) = mesh.edge_nodes(edge);
    let w: DVec3 = 0.5 * (mesh.grid_velocity(i) + mesh.grid_velocity(j));
    w.dot(mesh.edge_normal(edge))
}
