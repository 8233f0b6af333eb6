// crates/sc_physics/src/state.rs

//! 标量状态管理
//!
//! [`ScalarState`] 按结构数组（SoA）存放一个网格层上的全部节点数据，
//! 下标统一为 `point * n_var + var`。
//!
//! 只有 n+1 时间层在非线性迭代中被修改；n 与 n-1 时间层只在物理时间步
//! 结束时由 [`ScalarState::push_time_levels`] 推进。

use glam::DVec3;
use rayon::prelude::*;
use sc_foundation::{ScError, ScResult, EPS};

/// 标量状态
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarState {
    n_point: usize,
    n_var: usize,

    // ===== 时间层 =====
    /// n+1 时间层解
    pub solution: Vec<f64>,
    /// n 时间层解
    pub solution_n: Vec<f64>,
    /// n-1 时间层解
    pub solution_nm1: Vec<f64>,

    // ===== 每次外迭代重算的场 =====
    /// 节点梯度（重构与扩散共用）
    pub gradient: Vec<DVec3>,
    /// 限制因子
    pub limiter: Vec<f64>,
    /// 扩散系数
    pub diffusivity: Vec<f64>,

    // ===== 每节点标量 =====
    /// 伪时间步
    pub delta_time: Vec<f64>,
    /// 欠松弛因子
    pub under_relaxation: Vec<f64>,
}

impl ScalarState {
    /// 创建并以 `initial` 初始化所有时间层
    pub fn new(n_point: usize, n_var: usize, initial: &[f64]) -> ScResult<Self> {
        ScError::check_size("initial_state", n_var, initial.len())?;
        let solution: Vec<f64> = initial.iter().copied().cycle().take(n_point * n_var).collect();
        Ok(Self {
            n_point,
            n_var,
            solution_n: solution.clone(),
            solution_nm1: solution.clone(),
            solution,
            gradient: vec![DVec3::ZERO; n_point * n_var],
            limiter: vec![1.0; n_point * n_var],
            diffusivity: vec![0.0; n_point * n_var],
            delta_time: vec![0.0; n_point],
            under_relaxation: vec![1.0; n_point],
        })
    }

    /// 节点数
    #[inline]
    pub fn n_point(&self) -> usize {
        self.n_point
    }

    /// 变量个数
    #[inline]
    pub fn n_var(&self) -> usize {
        self.n_var
    }

    /// 节点解
    #[inline]
    pub fn node(&self, point: usize) -> &[f64] {
        &self.solution[point * self.n_var..(point + 1) * self.n_var]
    }

    /// 节点解（可变）
    #[inline]
    pub fn node_mut(&mut self, point: usize) -> &mut [f64] {
        &mut self.solution[point * self.n_var..(point + 1) * self.n_var]
    }

    /// 节点梯度
    #[inline]
    pub fn node_gradient(&self, point: usize) -> &[DVec3] {
        &self.gradient[point * self.n_var..(point + 1) * self.n_var]
    }

    /// 节点限制因子
    #[inline]
    pub fn node_limiter(&self, point: usize) -> &[f64] {
        &self.limiter[point * self.n_var..(point + 1) * self.n_var]
    }

    /// 节点扩散系数
    #[inline]
    pub fn node_diffusivity(&self, point: usize) -> &[f64] {
        &self.diffusivity[point * self.n_var..(point + 1) * self.n_var]
    }

    /// 所有节点设为同一状态
    pub fn fill(&mut self, value: &[f64]) -> ScResult<()> {
        ScError::check_size("fill_state", self.n_var, value.len())?;
        for chunk in self.solution.chunks_mut(self.n_var) {
            chunk.copy_from_slice(value);
        }
        Ok(())
    }

    /// 推进物理时间层：n-1 ← n，n ← n+1
    pub fn push_time_levels(&mut self) {
        std::mem::swap(&mut self.solution_nm1, &mut self.solution_n);
        self.solution_n.copy_from_slice(&self.solution);
    }

    /// 计算欠松弛因子
    ///
    /// 对每个计算域节点，取所有变量中 `allowable / ratio` 的最小值（不超过 1），
    /// `ratio = |ΔU| / (|U| + EPS)`；结果低于 `floor` 时置零，取消该节点本次更新。
    pub fn compute_under_relaxation(
        &mut self,
        increment: &[f64],
        n_point_domain: usize,
        allowable: f64,
        floor: f64,
    ) {
        let n_var = self.n_var;
        let solution = &self.solution;
        self.under_relaxation
            .par_iter_mut()
            .enumerate()
            .take(n_point_domain)
            .for_each(|(i, relax)| {
                *relax = under_relaxation_factor(
                    &solution[i * n_var..(i + 1) * n_var],
                    &increment[i * n_var..(i + 1) * n_var],
                    allowable,
                    floor,
                );
            });
    }
}

/// 单个节点的欠松弛因子
#[inline]
pub fn under_relaxation_factor(solution: &[f64], increment: &[f64], allowable: f64, floor: f64) -> f64 {
    let mut factor: f64 = 1.0;
    for (&u, &du) in solution.iter().zip(increment) {
        let ratio = du.abs() / (u.abs() + EPS);
        if ratio > allowable {
            factor = factor.min(allowable / ratio);
        }
    }
    if factor < floor {
        0.0
    } else {
        factor
    }
}

/// 带密度比修正的守恒型更新
///
/// `U_new = clamp((ρ_old U + ΔU) / ρ, lo, hi)`
#[inline]
pub fn add_conservative_solution(
    value: f64,
    delta: f64,
    density: f64,
    density_old: f64,
    lo: f64,
    hi: f64,
) -> f64 {
    ((density_old * value + delta) / density).clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_fill() {
        let mut state = ScalarState::new(3, 2, &[1.0, 2.0]).unwrap();
        assert_eq!(state.node(2), &[1.0, 2.0]);
        assert_eq!(state.solution_nm1.len(), 6);
        state.fill(&[0.0, 5.0]).unwrap();
        assert_eq!(state.node(1), &[0.0, 5.0]);
        assert!(ScalarState::new(3, 2, &[1.0]).is_err());
    }

    #[test]
    fn test_push_time_levels() {
        let mut state = ScalarState::new(2, 1, &[1.0]).unwrap();
        state.node_mut(0)[0] = 2.0;
        state.push_time_levels();
        state.node_mut(0)[0] = 3.0;
        state.push_time_levels();
        assert_eq!(state.solution_nm1[0], 2.0);
        assert_eq!(state.solution_n[0], 3.0);
        assert_eq!(state.solution[0], 3.0);
    }

    #[test]
    fn test_under_relaxation_factor() {
        // 增量为允许比的两倍：因子为 0.5
        let u = [2.0];
        let du = [2.0 * 0.99 * 2.0];
        let f = under_relaxation_factor(&u, &du, 0.99, 1e-10);
        assert!((f - 0.5).abs() < 1e-12);

        assert_eq!(under_relaxation_factor(&[1.0], &[0.5], 0.99, 1e-10), 1.0);
        // 零状态上的非零增量：比值极大，因子低于下限后置零
        assert_eq!(under_relaxation_factor(&[0.0], &[1.0], 0.99, 1e-10), 0.0);
    }

    #[test]
    fn test_factor_is_min_over_variables() {
        let f = under_relaxation_factor(&[1.0, 1.0], &[1.98, 3.96], 0.99, 1e-10);
        assert!((f - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_conservative_update() {
        assert_eq!(add_conservative_solution(0.5, 0.1, 1.0, 1.0, 0.0, 1.0), 0.6);
        // 密度比修正
        let u = add_conservative_solution(0.5, 0.0, 2.0, 1.0, f64::NEG_INFINITY, f64::INFINITY);
        assert_eq!(u, 0.25);
        // 裁剪
        assert_eq!(add_conservative_solution(0.9, 0.5, 1.0, 1.0, 0.0, 1.0), 1.0);
    }
}
