// crates/sc_physics/src/numerics/linear_algebra/solver.rs

//! 迭代线性求解器
//!
//! 提供块 CSR 系统 `A x = b` 的预条件 BiCGStab 求解器，实现
//! [`crate::traits::LinearSolver`]。只有计算域行参与迭代，
//! halo 行的右端项与解保持为零。
//!
//! # 使用示例
//!
//! ```ignore
//! use sc_physics::numerics::linear_algebra::{BiCgStab, SolverConfig};
//! use sc_physics::traits::LinearSolver;
//!
//! let mut solver = BiCgStab::new(SolverConfig::new(1e-8, 100));
//! let result = solver.solve(&matrix, &b, &mut x);
//! println!("{} 次迭代, 残差 {:e}", result.iterations, result.residual_norm);
//! ```

use serde::{Deserialize, Serialize};

use super::block_csr::BlockCsrMatrix;
use super::preconditioner::{BlockJacobiPreconditioner, IdentityPreconditioner, Preconditioner};
use super::vector_ops::{axpy, copy, dot, norm2};
use crate::traits::LinearSolver;
use sc_config::LinearSolverConfig;

// ============================================================================
// 配置与结果
// ============================================================================

/// 预条件器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PreconditionerKind {
    /// 无预条件
    Identity,
    /// 块 Jacobi
    #[default]
    BlockJacobi,
}

/// 求解器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// 相对收敛容差
    pub rtol: f64,
    /// 绝对收敛容差
    pub atol: f64,
    /// 最大迭代次数
    pub max_iter: usize,
    /// 预条件器
    pub preconditioner: PreconditionerKind,
    /// 是否输出每次迭代的残差（trace 级别）
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-14,
            max_iter: 1000,
            preconditioner: PreconditionerKind::default(),
            verbose: false,
        }
    }
}

impl SolverConfig {
    /// 创建求解器配置
    pub fn new(rtol: f64, max_iter: usize) -> Self {
        Self {
            rtol,
            max_iter,
            ..Default::default()
        }
    }

    /// 设置绝对容差
    pub fn with_atol(mut self, atol: f64) -> Self {
        self.atol = atol;
        self
    }

    /// 设置预条件器
    pub fn with_preconditioner(mut self, kind: PreconditionerKind) -> Self {
        self.preconditioner = kind;
        self
    }
}

impl From<&LinearSolverConfig> for SolverConfig {
    fn from(config: &LinearSolverConfig) -> Self {
        Self::new(config.tolerance, config.max_iterations)
    }
}

/// 求解器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// 收敛
    Converged,
    /// 达到最大迭代次数
    MaxIterationsReached,
    /// 发散
    Diverged,
    /// 停滞
    Stagnated,
}

/// 求解器结果
#[derive(Debug, Clone, PartialEq)]
pub struct SolverResult {
    /// 求解状态
    pub status: SolverStatus,
    /// 迭代次数
    pub iterations: usize,
    /// 最终残差范数
    pub residual_norm: f64,
    /// 初始残差范数
    pub initial_residual_norm: f64,
    /// 相对残差
    pub relative_residual: f64,
}

impl SolverResult {
    /// 是否成功收敛
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }

    fn new(status: SolverStatus, iterations: usize, residual: f64, initial: f64) -> Self {
        Self {
            status,
            iterations,
            residual_norm: residual,
            initial_residual_norm: initial,
            relative_residual: if initial > 0.0 { residual / initial } else { 0.0 },
        }
    }
}

// ============================================================================
// BiCGStab
// ============================================================================

/// 预条件双共轭梯度稳定法求解器（右预条件）
///
/// 适用于对流主导的非对称 Jacobian。
pub struct BiCgStab {
    config: SolverConfig,
    // 工作向量
    r: Vec<f64>,
    r0: Vec<f64>,
    p: Vec<f64>,
    v: Vec<f64>,
    s: Vec<f64>,
    t: Vec<f64>,
    p_hat: Vec<f64>,
    s_hat: Vec<f64>,
}

impl BiCgStab {
    /// 创建求解器
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            r: Vec::new(),
            r0: Vec::new(),
            p: Vec::new(),
            v: Vec::new(),
            s: Vec::new(),
            t: Vec::new(),
            p_hat: Vec::new(),
            s_hat: Vec::new(),
        }
    }

    /// 配置
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// 确保工作向量大小正确
    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            self.r = vec![0.0; n];
            self.r0 = vec![0.0; n];
            self.p = vec![0.0; n];
            self.v = vec![0.0; n];
            self.s = vec![0.0; n];
            self.t = vec![0.0; n];
            self.p_hat = vec![0.0; n];
            self.s_hat = vec![0.0; n];
        }
    }

    /// 使用给定预条件器求解
    pub fn solve_with<P: Preconditioner>(
        &mut self,
        matrix: &BlockCsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &P,
    ) -> SolverResult {
        let n = b.len();
        self.ensure_workspace(n);
        let rtol = self.config.rtol;
        let atol = self.config.atol;
        let stag_tol = 1e-30;
        let div_factor = 1e6;

        // r = b - A*x
        matrix.matvec(x, &mut self.r);
        for i in 0..n {
            self.r[i] = b[i] - self.r[i];
        }

        let initial_norm = norm2(&self.r);
        if initial_norm < atol {
            return SolverResult::new(SolverStatus::Converged, 0, initial_norm, initial_norm);
        }

        // 影子残差固定为初始残差
        copy(&self.r, &mut self.r0);

        let mut rho_old = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;
        self.v.fill(0.0);
        self.p.fill(0.0);

        for iter in 0..self.config.max_iter {
            let rho = dot(&self.r0, &self.r);
            if rho.abs() < stag_tol {
                let res = norm2(&self.r);
                return SolverResult::new(SolverStatus::Stagnated, iter, res, initial_norm);
            }

            let beta = if iter == 0 {
                0.0
            } else {
                (rho / rho_old) * (alpha / omega)
            };
            rho_old = rho;

            // p = r + beta * (p - omega * v)
            for i in 0..n {
                self.p[i] = self.r[i] + beta * (self.p[i] - omega * self.v[i]);
            }

            // v = A M⁻¹ p
            precond.apply(&self.p, &mut self.p_hat);
            matrix.matvec(&self.p_hat, &mut self.v);

            let r0v = dot(&self.r0, &self.v);
            if r0v.abs() < stag_tol {
                let res = norm2(&self.r);
                return SolverResult::new(SolverStatus::Stagnated, iter, res, initial_norm);
            }
            alpha = rho / r0v;

            // s = r - alpha * v
            for i in 0..n {
                self.s[i] = self.r[i] - alpha * self.v[i];
            }

            let s_norm = norm2(&self.s);
            if s_norm < atol || s_norm / initial_norm < rtol {
                axpy(alpha, &self.p_hat, x);
                return SolverResult::new(SolverStatus::Converged, iter + 1, s_norm, initial_norm);
            }

            // t = A M⁻¹ s
            precond.apply(&self.s, &mut self.s_hat);
            matrix.matvec(&self.s_hat, &mut self.t);

            let tt = dot(&self.t, &self.t);
            omega = if tt.abs() < stag_tol {
                1.0
            } else {
                dot(&self.t, &self.s) / tt
            };

            if omega.abs() < stag_tol {
                axpy(alpha, &self.p_hat, x);
                return SolverResult::new(SolverStatus::Stagnated, iter + 1, s_norm, initial_norm);
            }

            // x = x + alpha * p_hat + omega * s_hat
            axpy(alpha, &self.p_hat, x);
            axpy(omega, &self.s_hat, x);

            // r = s - omega * t
            for i in 0..n {
                self.r[i] = self.s[i] - omega * self.t[i];
            }

            let res_norm = norm2(&self.r);
            let rel_res = res_norm / initial_norm;

            if self.config.verbose {
                log::trace!("BiCGStab iter {}: residual = {:.6e}", iter + 1, res_norm);
            }

            if res_norm < atol || rel_res < rtol {
                return SolverResult::new(SolverStatus::Converged, iter + 1, res_norm, initial_norm);
            }

            if res_norm > initial_norm * div_factor {
                return SolverResult::new(SolverStatus::Diverged, iter + 1, res_norm, initial_norm);
            }
        }

        let res = norm2(&self.r);
        SolverResult::new(
            SolverStatus::MaxIterationsReached,
            self.config.max_iter,
            res,
            initial_norm,
        )
    }
}

impl LinearSolver for BiCgStab {
    fn name(&self) -> &'static str {
        "BiCGStab"
    }

    fn solve(&mut self, matrix: &BlockCsrMatrix, b: &[f64], x: &mut [f64]) -> SolverResult {
        match self.config.preconditioner {
            PreconditionerKind::Identity => {
                let precond = IdentityPreconditioner::new(matrix);
                self.solve_with(matrix, b, x, &precond)
            }
            PreconditionerKind::BlockJacobi => {
                let precond = BlockJacobiPreconditioner::from_matrix(matrix);
                self.solve_with(matrix, b, x, &precond)
            }
        }
    }
}
