// crates/sc_physics/tests/free_stream_gcl.rs

//! 动网格自由来流保持测试
//!
//! 均匀标量场在非均匀网格速度下，GCL 边项与边界项恰好抵消对流通量中的
//! 网格速度部分，残差为零；去掉 GCL 项则出现伪源项。

use glam::DVec3;
use sc_config::{ScalarSolverConfig, TimeMarching};
use sc_mesh::{DualMeshGenerator, MeshGraph, MeshHierarchy};
use sc_physics::boundary::{BoundaryDispatcher, BoundaryKind, InletProfiles};
use sc_physics::coloring::ColoringAdapter;
use sc_physics::engine::{
    add_gcl_boundary_terms, add_gcl_edge_terms, add_moving_mesh_node_source, EdgeAssembler, FluxLaws,
};
use sc_physics::{BlockCsrMatrix, FlowField, ScalarSolver, ScalarState, ScalarUpwind};

const Y_INF: f64 = 0.3;

fn config() -> ScalarSolverConfig {
    ScalarSolverConfig {
        time_marching: TimeMarching::DualTime2nd,
        delta_unsteady_time: 0.1,
        dynamic_grid: true,
        scalar_far_field: vec![Y_INF],
        ..Default::default()
    }
}

/// 非均匀网格速度，三个时间层体积互不相同
fn moving_mesh() -> MeshGraph {
    let mut mesh = DualMeshGenerator::new(4, 3, 2.0, 1.5).build().unwrap();
    let velocities = (0..mesh.n_point())
        .map(|p| {
            let x = mesh.coord(p);
            DVec3::new(0.1 * x.x, 0.05 * x.y, 0.0)
        })
        .collect();
    mesh.set_grid_velocities(velocities).unwrap();

    let volume = mesh.volumes().to_vec();
    let volume_n = volume.iter().map(|v| 0.95 * v).collect();
    let volume_nm1 = volume.iter().map(|v| 0.9 * v).collect();
    mesh.set_volumes(volume, volume_n, volume_nm1).unwrap();
    mesh
}

fn flow(mesh: &MeshGraph) -> FlowField {
    FlowField::uniform(mesh.n_point(), 2, DVec3::new(0.4, 0.2, 0.0), 1.2, 0.05)
}

fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |m, v| m.max(v.abs()))
}

/// 边循环 + 远场边界 + 动网格节点项，可选 GCL 项
fn residual_with(mesh: &MeshGraph, with_gcl: bool) -> Vec<f64> {
    let config = config();
    let flow = flow(mesh);
    let state = ScalarState::new(mesh.n_point(), 1, &[Y_INF]).unwrap();
    let upwind = ScalarUpwind::new();
    let laws = FluxLaws {
        convective: &upwind,
        viscous: None,
    };

    let mut residual = vec![0.0; mesh.n_point()];
    let mut edge_fluxes = vec![0.0; mesh.n_edge()];
    let mut jac = BlockCsrMatrix::from_mesh(mesh, 1);
    let adapter = ColoringAdapter::from_mesh(mesh, &config);
    EdgeAssembler::new(mesh, &flow, &state, &config, laws).assemble(&adapter, &mut residual, &mut edge_fluxes, &mut jac);

    let dispatcher = BoundaryDispatcher::uniform(mesh, BoundaryKind::FarField);
    let inlet = InletProfiles::new(mesh, &config.scalar_far_field);
    dispatcher.apply(mesh, &flow, &state, &config, &inlet, &upwind, &mut residual, &mut jac);

    if with_gcl {
        add_gcl_edge_terms(mesh, &flow, &state, &config, &mut residual);
        add_gcl_boundary_terms(mesh, &flow, &state, &config, dispatcher.kinds(), &mut residual);
    }
    add_moving_mesh_node_source(mesh, &flow, &state, &config, &mut residual, Some(&mut jac));
    residual
}

#[test]
fn test_gcl_preserves_free_stream() {
    let mesh = moving_mesh();
    let with_gcl = residual_with(&mesh, true);
    assert!(max_abs(&with_gcl) < 1e-12, "GCL 残差 {:e}", max_abs(&with_gcl));

    let without_gcl = residual_with(&mesh, false);
    assert!(max_abs(&without_gcl) > 1e-4, "缺少 GCL 时残差 {:e}", max_abs(&without_gcl));
}

#[test]
fn test_solver_iteration_preserves_free_stream() {
    let mesh = moving_mesh();
    let flow = flow(&mesh);
    let hierarchy = MeshHierarchy::single(mesh);
    let mesh = hierarchy.finest();
    let mut solver = ScalarSolver::builder(config()).build(&hierarchy).unwrap();

    let norms = solver.iteration(mesh, &flow).unwrap().clone();
    assert!(norms.max[0] < 1e-12);
    for &y in &solver.state().solution {
        assert!((y - Y_INF).abs() < 1e-12);
    }
}
