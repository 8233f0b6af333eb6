// crates/sc_physics/tests/implicit_iteration.rs

//! 隐式迭代测试：欠松弛与零时间步冻结

use glam::DVec3;
use sc_config::ScalarSolverConfig;
use sc_mesh::{DualMeshGenerator, MeshHierarchy};
use sc_physics::state::under_relaxation_factor;
use sc_physics::{FlowField, ScalarSolver};

#[test]
fn test_under_relaxation_scales_large_increments() {
    // ratio = 1.98 > 0.99，因子 = 0.99 / 1.98
    let factor = under_relaxation_factor(&[1.0], &[2.0 * 0.99], 0.99, 1e-10);
    assert!((factor - 0.5).abs() < 1e-12);

    // 增量在允许范围内不松弛
    assert_eq!(under_relaxation_factor(&[1.0, -2.0], &[0.5, 1.0], 0.99, 1e-10), 1.0);

    // 多变量取最小
    let factor = under_relaxation_factor(&[1.0, 1.0], &[1.98, 3.96], 0.99, 1e-10);
    assert!((factor - 0.25).abs() < 1e-12);
}

#[test]
fn test_under_relaxation_below_floor_cancels_update() {
    let factor = under_relaxation_factor(&[1.0], &[1e12], 0.99, 1e-10);
    assert_eq!(factor, 0.0);
}

#[test]
fn test_zero_time_step_freezes_node() {
    let generator = DualMeshGenerator::new(3, 3, 1.0, 1.0);
    let hierarchy = MeshHierarchy::single(generator.build().unwrap());
    let mesh = hierarchy.finest();
    let frozen = generator.node_index(1, 1);

    let mut flow = FlowField::uniform(mesh.n_point(), 2, DVec3::new(0.6, 0.2, 0.0), 1.0, 0.1);
    flow.set_delta_time(frozen, 0.0);

    let config = ScalarSolverConfig {
        scalar_far_field: vec![0.5],
        ..Default::default()
    };
    let mut solver = ScalarSolver::builder(config).build(&hierarchy).unwrap();
    for p in 0..mesh.n_point() {
        let x = mesh.coord(p);
        solver.state_mut().node_mut(p)[0] = 0.2 + 0.4 * x.x + 0.1 * x.y;
    }
    let before = solver.state().solution.clone();

    solver.iteration(mesh, &flow).unwrap();

    let after = &solver.state().solution;
    assert_eq!(after[frozen], before[frozen]);
    assert_eq!(solver.state().delta_time[frozen], 0.0);
    assert!(after.iter().zip(&before).any(|(a, b)| (a - b).abs() > 1e-8));
    assert!(solver.last_linear_iterations() > 0);
}
