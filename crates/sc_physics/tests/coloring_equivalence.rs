// crates/sc_physics/tests/coloring_equivalence.rs

//! 着色等价性测试
//!
//! 同一网格与状态下，直接模式与归约模式的残差和 Jacobian 一致。

use glam::DVec3;
use sc_config::ScalarSolverConfig;
use sc_mesh::{DualMeshGenerator, MeshHierarchy};
use sc_physics::{
    AssemblyMode, AverageGradientDiffusion, ConstantDiffusivity, FlowField, ScalarSolver,
};

fn assemble_with(mode: AssemblyMode, hierarchy: &MeshHierarchy, flow: &FlowField) -> ScalarSolver {
    let config = ScalarSolverConfig {
        edge_group_size: 2,
        min_chunk_size: 4,
        muscl_scalar: true,
        scalar_far_field: vec![0.25],
        ..Default::default()
    };
    let mesh = hierarchy.finest();
    let mut solver = ScalarSolver::builder(config)
        .viscous(AverageGradientDiffusion::default())
        .diffusivity(ConstantDiffusivity::uniform(0.02))
        .assembly_mode(mode)
        .build(hierarchy)
        .unwrap();
    assert_eq!(solver.adapter().mode(), mode);

    for p in 0..mesh.n_point() {
        let x = mesh.coord(p);
        solver.state_mut().node_mut(p)[0] = 0.1 + 0.3 * x.x * x.x + 0.2 * x.y;
    }
    solver.preprocessing(mesh, flow).unwrap();
    solver.upwind_residual(mesh, flow);
    solver.apply_boundary_conditions(mesh, flow).unwrap();
    solver
}

#[test]
fn test_direct_and_reducer_are_equivalent() {
    let hierarchy = MeshHierarchy::single(DualMeshGenerator::new(6, 5, 1.5, 1.0).build().unwrap());
    let flow = FlowField::uniform(hierarchy.finest().n_point(), 2, DVec3::new(0.8, -0.3, 0.0), 1.1, 0.05);

    let direct = assemble_with(AssemblyMode::Direct, &hierarchy, &flow);
    let reducer = assemble_with(AssemblyMode::Reducer, &hierarchy, &flow);
    assert!(direct.adapter().coloring().n_colors() > 1);

    for (p, (a, b)) in direct.residual().iter().zip(reducer.residual()).enumerate() {
        assert!((a - b).abs() < 1e-13, "残差在节点 {} 不一致: {} vs {}", p, a, b);
    }
    for (k, (a, b)) in direct
        .jacobian()
        .values()
        .iter()
        .zip(reducer.jacobian().values())
        .enumerate()
    {
        assert!((a - b).abs() < 1e-13, "Jacobian 第 {} 项不一致: {} vs {}", k, a, b);
    }
}
