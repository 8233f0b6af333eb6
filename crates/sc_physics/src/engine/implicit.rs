// crates/sc_physics/src/engine/implicit.rs

//! 隐式线性系统的准备与收尾
//!
//! 一次隐式欧拉迭代：
//!
//! ```text
//! prepare   : dt_i = cfl_reduction · dt_flow,i
//!             A_ii += (V_i + V_per,i) / dt_i        (dt_i ≠ 0)
//!             冻结行 i, R_i = 0                      (dt_i = 0)
//!             b = −R,  x = 0,  统计残差范数
//! solve     : A x = b （halo 行清零）
//! complete  : 欠松弛 → 守恒型更新并裁剪 → 周期平均 → halo 同步
//! ```

use log::{debug, warn};
use rayon::prelude::*;
use sc_config::ScalarSolverConfig;
use sc_mesh::MeshGraph;

use super::node_chunk_size;
use crate::comms::{Communicator, ExchangeKind};
use crate::error::ScalarResult;
use crate::numerics::linear_algebra::{BlockCsrMatrix, SolverResult};
use crate::state::{add_conservative_solution, ScalarState};
use crate::traits::{FlowStateProvider, LinearSolver};
use crate::types::{NormPartial, ResidualNorms};

/// 准备线性系统，返回残差范数
///
/// 只处理计算域节点。`residual` 变为右端项 `−R`，`increment` 清零。
pub fn prepare_implicit_iteration(
    mesh: &MeshGraph,
    flow: &dyn FlowStateProvider,
    state: &mut ScalarState,
    config: &ScalarSolverConfig,
    residual: &mut [f64],
    increment: &mut [f64],
    jacobian: &mut BlockCsrMatrix,
) -> ResidualNorms {
    let n_var = state.n_var();
    let n_domain = mesh.n_point_domain();
    let cfl_reduction = config.cfl_reduction;
    let chunk = node_chunk_size(config, n_domain);

    let partial = jacobian
        .rows_mut(n_domain)
        .into_par_iter()
        .zip(residual.par_chunks_mut(n_var))
        .zip(increment.par_chunks_mut(n_var))
        .zip(state.delta_time.par_iter_mut())
        .enumerate()
        .with_min_len(chunk)
        .with_max_len(chunk)
        .fold(
            || NormPartial::new(n_var),
            |mut acc, (i, (((mut row, res), inc), dt_i))| {
                let dt = cfl_reduction * flow.delta_time(i);
                *dt_i = dt;

                if dt != 0.0 {
                    let vol = mesh.volume(i) + mesh.periodic_volume(i);
                    row.add_val_to_diag(vol / dt);
                } else {
                    row.freeze();
                    res.fill(0.0);
                }

                for r in res.iter_mut() {
                    *r = -*r;
                }
                inc.fill(0.0);
                acc.accumulate(i, res);
                acc
            },
        )
        .reduce(|| NormPartial::new(n_var), NormPartial::merge);

    let norms = partial.finalize(n_domain, |p| mesh.global_index(p), |p| mesh.coord(p));
    debug!(
        "残差 RMS = {:?}, 最大 = {:?} @ {:?}",
        norms.rms, norms.max, norms.max_point
    );
    norms
}

/// 应用增量并同步
///
/// 欠松弛因子取所有变量中 `allowable / ratio` 的最小值；可压缩流动按
/// `(ρ_old U + ΔU) / ρ` 更新，不可压缩流动 `ρ_old = ρ`。
pub fn complete_implicit_iteration(
    mesh: &MeshGraph,
    flow: &dyn FlowStateProvider,
    state: &mut ScalarState,
    config: &ScalarSolverConfig,
    increment: &[f64],
    comms: &mut dyn Communicator,
) -> ScalarResult<()> {
    let n_var = state.n_var();
    let n_domain = mesh.n_point_domain();
    let compressible = config.is_compressible();

    state.compute_under_relaxation(
        increment,
        n_domain,
        config.allowable_ratio,
        config.relaxation_floor,
    );

    let bounds: Vec<(f64, f64)> = (0..n_var).map(|var| config.clip_bounds(var)).collect();
    let relaxation = &state.under_relaxation;
    let chunk = node_chunk_size(config, n_domain);
    state
        .solution
        .par_chunks_mut(n_var)
        .take(n_domain)
        .enumerate()
        .with_min_len(chunk)
        .with_max_len(chunk)
        .for_each(|(i, sol)| {
            let density = flow.density(i);
            let density_old = if compressible {
                flow.density_old(i)
            } else {
                density
            };
            let relax = relaxation[i];
            for (var, u) in sol.iter_mut().enumerate() {
                let (lo, hi) = bounds[var];
                let delta = relax * increment[i * n_var + var];
                *u = add_conservative_solution(*u, delta, density, density_old, lo, hi);
            }
        });

    for (a, b) in mesh.periodic_pairs() {
        let request = comms.initiate(mesh, ExchangeKind::PeriodicImplicit { pair: (a, b) }, &state.solution, n_var)?;
        comms.complete(mesh, request, &mut state.solution, None)?;
    }

    let request = comms.initiate(mesh, ExchangeKind::Solution, &state.solution, n_var)?;
    comms.complete(mesh, request, &mut state.solution, None)
}

/// 一次隐式欧拉迭代
///
/// 线性求解不收敛不是错误，结果原样返回供调用方记录。
#[allow(clippy::too_many_arguments)]
pub fn implicit_euler_iteration(
    mesh: &MeshGraph,
    flow: &dyn FlowStateProvider,
    state: &mut ScalarState,
    config: &ScalarSolverConfig,
    residual: &mut [f64],
    increment: &mut [f64],
    jacobian: &mut BlockCsrMatrix,
    linear_solver: &mut dyn LinearSolver,
    comms: &mut dyn Communicator,
) -> ScalarResult<(ResidualNorms, SolverResult)> {
    let n_var = state.n_var();
    let norms = prepare_implicit_iteration(mesh, flow, state, config, residual, increment, jacobian);

    let halo = mesh.n_point_domain() * n_var;
    residual[halo..].par_iter_mut().for_each(|r| *r = 0.0);
    increment[halo..].par_iter_mut().for_each(|x| *x = 0.0);

    let result = linear_solver.solve(jacobian, residual, increment);
    if !result.is_converged() {
        warn!(
            "{} 未收敛: {} 次迭代, 残差 {:.3e}",
            linear_solver.name(),
            result.iterations,
            result.residual_norm
        );
    }

    complete_implicit_iteration(mesh, flow, state, config, increment, comms)?;
    Ok((norms, result))
}
