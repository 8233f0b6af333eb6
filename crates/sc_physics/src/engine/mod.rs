// crates/sc_physics/src/engine/mod.rs

//! 组装引擎
//!
//! - [`assembly`]: 边循环残差与 Jacobian 组装
//! - [`implicit`]: 隐式线性系统准备、求解与更新
//! - [`dual_time`]: 双时间步物理时间源项与 GCL

pub mod assembly;
pub mod dual_time;
pub mod implicit;

use sc_config::ScalarSolverConfig;

pub use assembly::{sum_edge_fluxes, EdgeAssembler, FluxLaws};
pub use dual_time::{
    add_gcl_boundary_terms, add_gcl_edge_terms, add_moving_mesh_node_source, add_static_mesh_source,
    set_residual_dual_time,
};
pub use implicit::{complete_implicit_iteration, implicit_euler_iteration, prepare_implicit_iteration};

/// 节点循环的静态块大小，按当前线程池均分
pub(crate) fn node_chunk_size(config: &ScalarSolverConfig, n_point: usize) -> usize {
    config.node_chunk_size(n_point, rayon::current_num_threads())
}
