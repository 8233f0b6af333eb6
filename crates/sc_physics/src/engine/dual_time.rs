// crates/sc_physics/src/engine/dual_time.rs

//! 双时间步源项
//!
//! 静网格（体积不随时间变化）：
//!
//! ```text
//! 一阶: R_i += (ρU − ρⁿUⁿ) V / Δt                       A_ii += V / Δt
//! 二阶: R_i += (3ρU − 4ρⁿUⁿ + ρⁿ⁻¹Uⁿ⁻¹) V / (2Δt)        A_ii += 3V / (2Δt)
//! ```
//!
//! 动网格先累加几何守恒律（GCL）项，再以各时间层体积计算节点项：
//!
//! ```text
//! 边:   g_e = ½(w_i + w_j)·n_e,   R_i += ρⁿ_i Uⁿ_i g_e,  R_j −= ρⁿ_j Uⁿ_j g_e
//! 边界: g_b = −w_i·n_b,           R_i += ρⁿ_i Uⁿ_i g_b   （内部边界除外）
//! 一阶: R_i += (ρU − ρⁿUⁿ) V / Δt
//! 二阶: R_i += (ρU − ρⁿUⁿ) 3V / (2Δt) + (ρⁿ⁻¹Uⁿ⁻¹ − ρⁿUⁿ) Vⁿ⁻¹ / (2Δt)
//! ```
//!
//! 密度：不可压缩取流场原始变量密度（三个时间层相同），
//! 可压缩取守恒解第 0 分量的三个时间层。

use rayon::prelude::*;
use sc_config::{ScalarSolverConfig, TimeMarching};
use sc_mesh::MeshGraph;

use super::node_chunk_size;
use crate::boundary::BoundaryKind;
use crate::engine::assembly::edge_grid_flux;
use crate::numerics::linear_algebra::BlockCsrMatrix;
use crate::state::ScalarState;
use crate::traits::FlowStateProvider;

/// 节点三个时间层的密度 `[ρⁿ⁺¹, ρⁿ, ρⁿ⁻¹]`
#[inline]
fn density_levels(flow: &dyn FlowStateProvider, point: usize, compressible: bool) -> [f64; 3] {
    if compressible {
        flow.conservative_density_levels(point)
    } else {
        [flow.density(point); 3]
    }
}

/// 累加双时间步源项（按网格是否运动选择分支）
///
/// 非双时间步配置下不做任何事。
pub fn set_residual_dual_time(
    mesh: &MeshGraph,
    flow: &dyn FlowStateProvider,
    state: &ScalarState,
    config: &ScalarSolverConfig,
    boundary_kinds: &[BoundaryKind],
    residual: &mut [f64],
    jacobian: Option<&mut BlockCsrMatrix>,
) {
    if !config.is_dual_time() {
        return;
    }
    if config.dynamic_grid {
        add_gcl_edge_terms(mesh, flow, state, config, residual);
        add_gcl_boundary_terms(mesh, flow, state, config, boundary_kinds, residual);
        add_moving_mesh_node_source(mesh, flow, state, config, residual, jacobian);
    } else {
        add_static_mesh_source(mesh, flow, state, config, residual, jacobian);
    }
}

/// 对角块附加项
fn diagonal_term(config: &ScalarSolverConfig, volume: f64) -> f64 {
    let dt = config.delta_unsteady_time;
    match config.time_marching {
        TimeMarching::DualTime2nd => 3.0 * volume / (2.0 * dt),
        _ => volume / dt,
    }
}

/// 静网格源项
pub fn add_static_mesh_source(
    mesh: &MeshGraph,
    flow: &dyn FlowStateProvider,
    state: &ScalarState,
    config: &ScalarSolverConfig,
    residual: &mut [f64],
    jacobian: Option<&mut BlockCsrMatrix>,
) {
    let n_var = state.n_var();
    let n_domain = mesh.n_point_domain();
    let dt = config.delta_unsteady_time;
    let second_order = config.time_marching == TimeMarching::DualTime2nd;
    let compressible = config.is_compressible();
    let chunk = node_chunk_size(config, n_domain);

    residual
        .par_chunks_mut(n_var)
        .take(n_domain)
        .enumerate()
        .with_min_len(chunk)
        .with_max_len(chunk)
        .for_each(|(i, res)| {
            let volume = mesh.volume(i);
            let [rho, rho_n, rho_nm1] = density_levels(flow, i, compressible);
            for (var, r) in res.iter_mut().enumerate() {
                let k = i * n_var + var;
                let (u, u_n, u_nm1) = (state.solution[k], state.solution_n[k], state.solution_nm1[k]);
                *r += if second_order {
                    (3.0 * rho * u - 4.0 * rho_n * u_n + rho_nm1 * u_nm1) * volume / (2.0 * dt)
                } else {
                    (rho * u - rho_n * u_n) * volume / dt
                };
            }
        });

    if let Some(jacobian) = jacobian {
        if config.is_implicit() {
            add_diagonal_terms(mesh, config, jacobian);
        }
    }
}

/// GCL 边项
///
/// 边数与节点数同阶且每条边写两个节点，这里串行累加。
pub fn add_gcl_edge_terms(
    mesh: &MeshGraph,
    flow: &dyn FlowStateProvider,
    state: &ScalarState,
    config: &ScalarSolverConfig,
    residual: &mut [f64],
) {
    let n_var = state.n_var();
    let compressible = config.is_compressible();

    for edge in 0..mesh.n_edge() {
        let (i, j) = mesh.edge_nodes(edge);
        let gcl = edge_grid_flux(mesh, edge);

        let rho_i = density_levels(flow, i, compressible)[1];
        for var in 0..n_var {
            residual[i * n_var + var] += rho_i * state.solution_n[i * n_var + var] * gcl;
        }
        let rho_j = density_levels(flow, j, compressible)[1];
        for var in 0..n_var {
            residual[j * n_var + var] -= rho_j * state.solution_n[j * n_var + var] * gcl;
        }
    }
}

/// GCL 边界项（跳过内部边界）
pub fn add_gcl_boundary_terms(
    mesh: &MeshGraph,
    flow: &dyn FlowStateProvider,
    state: &ScalarState,
    config: &ScalarSolverConfig,
    boundary_kinds: &[BoundaryKind],
    residual: &mut [f64],
) {
    let n_var = state.n_var();
    let compressible = config.is_compressible();

    for (m, marker) in mesh.markers().iter().enumerate() {
        if boundary_kinds.get(m).is_some_and(|k| k.is_internal()) {
            continue;
        }
        for vertex in &marker.vertices {
            let i = vertex.node;
            let gcl = -mesh.grid_velocity(i).dot(vertex.normal);
            let rho_n = density_levels(flow, i, compressible)[1];
            for var in 0..n_var {
                residual[i * n_var + var] += rho_n * state.solution_n[i * n_var + var] * gcl;
            }
        }
    }
}

/// 动网格节点项
pub fn add_moving_mesh_node_source(
    mesh: &MeshGraph,
    flow: &dyn FlowStateProvider,
    state: &ScalarState,
    config: &ScalarSolverConfig,
    residual: &mut [f64],
    jacobian: Option<&mut BlockCsrMatrix>,
) {
    let n_var = state.n_var();
    let n_domain = mesh.n_point_domain();
    let dt = config.delta_unsteady_time;
    let second_order = config.time_marching == TimeMarching::DualTime2nd;
    let compressible = config.is_compressible();
    let chunk = node_chunk_size(config, n_domain);

    residual
        .par_chunks_mut(n_var)
        .take(n_domain)
        .enumerate()
        .with_min_len(chunk)
        .with_max_len(chunk)
        .for_each(|(i, res)| {
            let volume = mesh.volume(i);
            let volume_nm1 = mesh.volume_nm1(i);
            let [rho, rho_n, rho_nm1] = density_levels(flow, i, compressible);
            for (var, r) in res.iter_mut().enumerate() {
                let k = i * n_var + var;
                let (u, u_n, u_nm1) = (state.solution[k], state.solution_n[k], state.solution_nm1[k]);
                *r += if second_order {
                    (rho * u - rho_n * u_n) * (3.0 * volume / (2.0 * dt))
                        + (rho_nm1 * u_nm1 - rho_n * u_n) * (volume_nm1 / (2.0 * dt))
                } else {
                    (rho * u - rho_n * u_n) * (volume / dt)
                };
            }
        });

    if let Some(jacobian) = jacobian {
        if config.is_implicit() {
            add_diagonal_terms(mesh, config, jacobian);
        }
    }
}

fn add_diagonal_terms(mesh: &MeshGraph, config: &ScalarSolverConfig, jacobian: &mut BlockCsrMatrix) {
    let n_domain = mesh.n_point_domain();
    let chunk = node_chunk_size(config, n_domain);
    jacobian
        .rows_mut(n_domain)
        .into_par_iter()
        .enumerate()
        .with_min_len(chunk)
        .with_max_len(chunk)
        .for_each(|(i, mut row)| row.add_val_to_diag(diagonal_term(config, mesh.volume(i))));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowField;
    use glam::DVec3;
    use sc_mesh::generation::DualMeshGenerator;

    fn dual_config(marching: TimeMarching) -> ScalarSolverConfig {
        ScalarSolverConfig {
            time_marching: marching,
            delta_unsteady_time: 0.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_static_first_order() {
        let mesh = DualMeshGenerator::new(1, 1, 2.0, 2.0).build().unwrap();
        let flow = FlowField::uniform(mesh.n_point(), 2, DVec3::ZERO, 2.0, 0.1);
        let mut state = ScalarState::new(mesh.n_point(), 1, &[0.25]).unwrap();
        state.solution[0] = 0.5;
        let config = dual_config(TimeMarching::DualTime1st);
        let mut residual = vec![0.0; 4];
        let mut jac = BlockCsrMatrix::from_mesh(&mesh, 1);

        add_static_mesh_source(&mesh, &flow, &state, &config, &mut residual, Some(&mut jac));
        // (2·0.5 − 2·0.25)·1/0.5 = 1
        assert!((residual[0] - 1.0).abs() < 1e-14);
        assert_eq!(residual[1], 0.0);
        assert_eq!(jac.diag_block(0), &[2.0]);
    }

    #[test]
    fn test_static_second_order() {
        let mesh = DualMeshGenerator::new(1, 1, 2.0, 2.0).build().unwrap();
        let flow = FlowField::uniform(mesh.n_point(), 2, DVec3::ZERO, 1.0, 0.1);
        let mut state = ScalarState::new(mesh.n_point(), 1, &[0.0]).unwrap();
        state.solution[0] = 3.0;
        state.solution_n[0] = 2.0;
        state.solution_nm1[0] = 1.0;
        let config = dual_config(TimeMarching::DualTime2nd);
        let mut residual = vec![0.0; 4];
        let mut jac = BlockCsrMatrix::from_mesh(&mesh, 1);

        add_static_mesh_source(&mesh, &flow, &state, &config, &mut residual, Some(&mut jac));
        // (9 − 8 + 1)·1/(2·0.5) = 2
        assert!((residual[0] - 2.0).abs() < 1e-14);
        assert!((jac.diag_block(0)[0] - 3.0).abs() < 1e-14);
    }

    /// 两个计算域节点加一个 halo，体积、密度与三个时间层的解各不相同
    fn three_level_setup() -> (MeshGraph, FlowField, ScalarState) {
        let mut builder = MeshGraph::builder(2);
        builder.add_node(DVec3::ZERO, 1.0);
        builder.add_node(DVec3::X, 3.0);
        builder.add_node(DVec3::new(2.0, 0.0, 0.0), 4.0);
        builder.add_edge(0, 1, DVec3::X);
        builder.add_edge(1, 2, DVec3::X);
        builder.n_point_domain(2).global_indices(vec![0, 1, 0]);
        let mut mesh = builder.build().unwrap();
        mesh.set_volumes(vec![1.0, 3.0, 4.0], vec![0.8, 1.5, 4.0], vec![0.5, 1.0, 4.0])
            .unwrap();

        let mut flow = FlowField::uniform(3, 2, DVec3::ZERO, 1.0, 0.1);
        flow.set_density(0, 2.0);
        flow.set_density(1, 0.5);

        let mut state = ScalarState::new(3, 1, &[9.0]).unwrap();
        state.solution[..2].copy_from_slice(&[1.0, 3.0]);
        state.solution_n[..2].copy_from_slice(&[0.5, 2.0]);
        state.solution_nm1[..2].copy_from_slice(&[0.25, 4.0]);
        (mesh, flow, state)
    }

    fn moving(marching: TimeMarching) -> ScalarSolverConfig {
        ScalarSolverConfig {
            dynamic_grid: true,
            ..dual_config(marching)
        }
    }

    #[test]
    fn test_moving_mesh_first_order_exact() {
        let (mesh, flow, state) = three_level_setup();
        let config = moving(TimeMarching::DualTime1st);
        let mut residual = vec![0.0; 3];
        let mut jac = BlockCsrMatrix::from_mesh(&mesh, 1);

        add_moving_mesh_node_source(&mesh, &flow, &state, &config, &mut residual, Some(&mut jac));
        // 节点 0: (2·1 − 2·0.5)·1/0.5 = 2；节点 1: (0.5·3 − 0.5·2)·3/0.5 = 3
        assert!((residual[0] - 2.0).abs() < 1e-14);
        assert!((residual[1] - 3.0).abs() < 1e-14);
        assert_eq!(residual[2], 0.0);
        assert!((jac.diag_block(0)[0] - 2.0).abs() < 1e-14);
        assert!((jac.diag_block(1)[0] - 6.0).abs() < 1e-14);
        assert_eq!(jac.diag_block(2), &[0.0]);
    }

    #[test]
    fn test_moving_mesh_second_order_exact() {
        let (mesh, flow, state) = three_level_setup();
        let config = moving(TimeMarching::DualTime2nd);
        let mut residual = vec![0.0; 3];
        let mut jac = BlockCsrMatrix::from_mesh(&mesh, 1);

        add_moving_mesh_node_source(&mesh, &flow, &state, &config, &mut residual, Some(&mut jac));
        // 节点 0: (2 − 1)·3·1/1 + (0.5 − 1)·0.5/1 = 2.75
        // 节点 1: (1.5 − 1)·3·3/1 + (2 − 1)·1/1 = 5.5
        assert!((residual[0] - 2.75).abs() < 1e-14);
        assert!((residual[1] - 5.5).abs() < 1e-14);
        assert_eq!(residual[2], 0.0);
        // 3V / (2Δt)
        assert!((jac.diag_block(0)[0] - 3.0).abs() < 1e-14);
        assert!((jac.diag_block(1)[0] - 9.0).abs() < 1e-14);
        assert_eq!(jac.diag_block(2), &[0.0]);
    }

    #[test]
    fn test_static_second_order_non_uniform() {
        let (mesh, flow, state) = three_level_setup();
        let config = dual_config(TimeMarching::DualTime2nd);
        let mut residual = vec![0.0; 3];
        let mut jac = BlockCsrMatrix::from_mesh(&mesh, 1);

        add_static_mesh_source(&mesh, &flow, &state, &config, &mut residual, Some(&mut jac));
        // 节点 0: (6 − 4 + 0.5)·1/1 = 2.5；节点 1: (4.5 − 4 + 2)·3/1 = 7.5
        assert!((residual[0] - 2.5).abs() < 1e-14);
        assert!((residual[1] - 7.5).abs() < 1e-14);
        assert_eq!(residual[2], 0.0);
        assert!((jac.diag_block(0)[0] - 3.0).abs() < 1e-14);
        assert!((jac.diag_block(1)[0] - 9.0).abs() < 1e-14);
    }

    #[test]
    fn test_explicit_skips_diagonal() {
        let (mesh, flow, state) = three_level_setup();
        let config = ScalarSolverConfig {
            time_integration: sc_config::TimeIntegration::Explicit,
            ..moving(TimeMarching::DualTime1st)
        };
        let mut residual = vec![0.0; 3];
        let mut jac = BlockCsrMatrix::from_mesh(&mesh, 1);

        add_moving_mesh_node_source(&mesh, &flow, &state, &config, &mut residual, Some(&mut jac));
        assert!((residual[0] - 2.0).abs() < 1e-14);
        assert_eq!(jac.diag_block(0), &[0.0]);
        assert_eq!(jac.diag_block(1), &[0.0]);
    }

    #[test]
    fn test_compressible_uses_density_levels() {
        let mesh = DualMeshGenerator::new(1, 1, 2.0, 2.0).build().unwrap();
        let mut flow = FlowField::uniform(mesh.n_point(), 2, DVec3::ZERO, 1.0, 0.1);
        flow.set_density_levels(0, [2.0, 1.0, 1.0]);
        let state = ScalarState::new(mesh.n_point(), 1, &[1.0]).unwrap();
        let config = ScalarSolverConfig {
            regime: sc_config::FlowRegime::Compressible,
            ..dual_config(TimeMarching::DualTime1st)
        };
        let mut residual = vec![0.0; 4];
        add_static_mesh_source(&mesh, &flow, &state, &config, &mut residual, None);
        assert!((residual[0] - 2.0).abs() < 1e-14);
        assert_eq!(residual[1], 0.0);
    }

    #[test]
    fn test_gcl_terms_close_for_uniform_motion() {
        // 刚体平移：每个节点 GCL 边项与边界项之和为零
        let mut mesh = DualMeshGenerator::new(3, 2, 3.0, 2.0).build().unwrap();
        mesh.set_grid_velocities(vec![DVec3::new(0.3, -0.2, 0.0); mesh.n_point()])
            .unwrap();
        let flow = FlowField::uniform(mesh.n_point(), 2, DVec3::ZERO, 1.0, 0.1);
        let state = ScalarState::new(mesh.n_point(), 1, &[0.7]).unwrap();
        let config = ScalarSolverConfig {
            dynamic_grid: true,
            ..dual_config(TimeMarching::DualTime1st)
        };
        let kinds = vec![BoundaryKind::FarField; mesh.n_marker()];
        let mut residual = vec![0.0; mesh.n_point()];
        add_gcl_edge_terms(&mesh, &flow, &state, &config, &mut residual);
        add_gcl_boundary_terms(&mesh, &flow, &state, &config, &kinds, &mut residual);
        for r in residual {
            assert!(r.abs() < 1e-13, "{}", r);
        }
    }
}
