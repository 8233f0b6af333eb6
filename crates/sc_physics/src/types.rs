// crates/sc_physics/src/types.rs

//! 组装核心类型定义
//!
//! - [`FluxResult`]: 通量律输出（残差与两个 Jacobian 块），每个工作线程一份
//! - [`ConvectiveInput`] / [`ViscousInput`]: 通量律输入视图
//! - [`ResidualNorms`]: 每变量 RMS / 最大残差及其位置
//! - [`PrimitiveLayout`]: 流场原始变量布局
//!
//! Jacobian 块按行主序存储，尺寸为 `n_var * n_var`。

use glam::DVec3;
use sc_foundation::KahanSum;
use serde::{Deserialize, Serialize};

// ============================================================
// 原始变量布局
// ============================================================

/// 流场原始变量布局
///
/// `[p, u, v, (w), T, ρ, ...]`：速度位于 `1..=n_dim`，密度位于 `n_dim + 2`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveLayout {
    /// 空间维数
    pub n_dim: usize,
}

impl PrimitiveLayout {
    /// 创建布局
    pub fn new(n_dim: usize) -> Self {
        Self { n_dim }
    }

    /// 最少原始变量个数
    #[inline]
    pub fn min_len(&self) -> usize {
        self.n_dim + 3
    }

    /// 密度所在位置
    #[inline]
    pub fn density_index(&self) -> usize {
        self.n_dim + 2
    }

    /// 读取速度
    #[inline]
    pub fn velocity(&self, primitive: &[f64]) -> DVec3 {
        let mut v = DVec3::ZERO;
        for d in 0..self.n_dim {
            v[d] = primitive[1 + d];
        }
        v
    }

    /// 读取密度
    #[inline]
    pub fn density(&self, primitive: &[f64]) -> f64 {
        primitive[self.density_index()]
    }
}

// ============================================================
// 通量结果
// ============================================================

/// 单条边（或边界面）的通量计算结果
///
/// 作为工作区复用：每个 rayon 任务创建一份，计算前由通量律整体覆盖。
#[derive(Debug, Clone, PartialEq)]
pub struct FluxResult {
    n_var: usize,
    /// 残差贡献
    pub residual: Vec<f64>,
    /// 对 i 端未知量的线性化
    pub jacobian_i: Vec<f64>,
    /// 对 j 端未知量的线性化
    pub jacobian_j: Vec<f64>,
}

impl FluxResult {
    /// 创建零结果
    pub fn new(n_var: usize) -> Self {
        Self {
            n_var,
            residual: vec![0.0; n_var],
            jacobian_i: vec![0.0; n_var * n_var],
            jacobian_j: vec![0.0; n_var * n_var],
        }
    }

    /// 变量个数
    #[inline]
    pub fn n_var(&self) -> usize {
        self.n_var
    }

    /// 清零
    pub fn reset(&mut self) {
        self.residual.fill(0.0);
        self.jacobian_i.fill(0.0);
        self.jacobian_j.fill(0.0);
    }

    /// 将两个 Jacobian 块设为对角阵 `diag_i * I` 与 `diag_j * I`
    pub fn set_diagonal_jacobians(&mut self, diag_i: f64, diag_j: f64) {
        self.jacobian_i.fill(0.0);
        self.jacobian_j.fill(0.0);
        for v in 0..self.n_var {
            self.jacobian_i[v * self.n_var + v] = diag_i;
            self.jacobian_j[v * self.n_var + v] = diag_j;
        }
    }
}

// ============================================================
// 通量律输入
// ============================================================

/// 对流通量输入
#[derive(Debug, Clone, Copy)]
pub struct ConvectiveInput<'a> {
    /// 原始变量布局
    pub layout: PrimitiveLayout,
    /// 面法向（从 i 指向 j，模长为面积）
    pub normal: DVec3,
    /// i 端流场原始变量
    pub primitive_i: &'a [f64],
    /// j 端流场原始变量
    pub primitive_j: &'a [f64],
    /// i 端标量
    pub scalar_i: &'a [f64],
    /// j 端标量
    pub scalar_j: &'a [f64],
    /// 两端网格速度（动网格）
    pub grid_velocity: Option<(DVec3, DVec3)>,
}

/// 粘性（扩散）通量输入
#[derive(Debug, Clone, Copy)]
pub struct ViscousInput<'a> {
    /// 原始变量布局
    pub layout: PrimitiveLayout,
    /// 面法向（从 i 指向 j，模长为面积）
    pub normal: DVec3,
    /// i 端坐标
    pub coord_i: DVec3,
    /// j 端坐标
    pub coord_j: DVec3,
    /// i 端流场原始变量
    pub primitive_i: &'a [f64],
    /// j 端流场原始变量
    pub primitive_j: &'a [f64],
    /// i 端标量
    pub scalar_i: &'a [f64],
    /// j 端标量
    pub scalar_j: &'a [f64],
    /// i 端标量梯度（每变量一个）
    pub gradient_i: &'a [DVec3],
    /// j 端标量梯度
    pub gradient_j: &'a [DVec3],
    /// i 端扩散系数（每变量一个）
    pub diffusivity_i: &'a [f64],
    /// j 端扩散系数
    pub diffusivity_j: &'a [f64],
}

// ============================================================
// 残差范数
// ============================================================

/// 每变量残差范数及最大值位置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualNorms {
    /// RMS 范数 `sqrt(Σ R² / n_point_domain)`
    pub rms: Vec<f64>,
    /// 最大绝对残差
    pub max: Vec<f64>,
    /// 最大残差所在节点的全局编号
    pub max_point: Vec<usize>,
    /// 最大残差所在节点坐标
    pub max_coord: Vec<DVec3>,
}

impl ResidualNorms {
    /// 零范数
    pub fn zeros(n_var: usize) -> Self {
        Self {
            rms: vec![0.0; n_var],
            max: vec![0.0; n_var],
            max_point: vec![0; n_var],
            max_coord: vec![DVec3::ZERO; n_var],
        }
    }

    /// 所有变量中最大的 RMS
    pub fn max_rms(&self) -> f64 {
        self.rms.iter().copied().fold(0.0, f64::max)
    }
}

/// 线程局部的范数部分和
///
/// 节点循环中每个 rayon 任务持有一份，最后经一次显式归约合并。
#[derive(Debug, Clone)]
pub(crate) struct NormPartial {
    pub sum_sq: Vec<KahanSum>,
    pub max: Vec<f64>,
    pub max_local: Vec<usize>,
}

impl NormPartial {
    pub fn new(n_var: usize) -> Self {
        Self {
            sum_sq: vec![KahanSum::new(); n_var],
            max: vec![0.0; n_var],
            max_local: vec![usize::MAX; n_var],
        }
    }

    /// 累加一个节点的残差
    #[inline]
    pub fn accumulate(&mut self, point: usize, residual: &[f64]) {
        for (var, &r) in residual.iter().enumerate() {
            self.sum_sq[var].add(r * r);
            let a = r.abs();
            if a > self.max[var] || (a == self.max[var] && point < self.max_local[var]) {
                self.max[var] = a;
                self.max_local[var] = point;
            }
        }
    }

    /// 合并两个部分和（相同最大值取较小节点编号，结果与调度无关）
    pub fn merge(mut self, other: Self) -> Self {
        for var in 0..self.max.len() {
            self.sum_sq[var] = self.sum_sq[var].merge(other.sum_sq[var]);
            let take_other = other.max[var] > self.max[var]
                || (other.max[var] == self.max[var] && other.max_local[var] < self.max_local[var]);
            if take_other {
                self.max[var] = other.max[var];
                self.max_local[var] = other.max_local[var];
            }
        }
        self
    }

    /// 生成最终范数
    pub fn finalize(
        self,
        n_point_domain: usize,
        global_index: impl Fn(usize) -> usize,
        coord: impl Fn(usize) -> DVec3,
    ) -> ResidualNorms {
        let n = n_point_domain.max(1) as f64;
        let n_var = self.max.len();
        let mut norms = ResidualNorms::zeros(n_var);
        for var in 0..n_var {
            norms.rms[var] = (self.sum_sq[var].value() / n).sqrt();
            norms.max[var] = self.max[var];
            if self.max_local[var] != usize::MAX {
                norms.max_point[var] = global_index(self.max_local[var]);
                norms.max_coord[var] = coord(self.max_local[var]);
            }
        }
        norms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let layout = PrimitiveLayout::new(2);
        let prim = [101325.0, 1.0, -2.0, 300.0, 1.2];
        assert_eq!(layout.velocity(&prim), DVec3::new(1.0, -2.0, 0.0));
        assert_eq!(layout.density(&prim), 1.2);
        assert_eq!(layout.min_len(), 5);
    }

    #[test]
    fn test_flux_result_diagonal() {
        let mut f = FluxResult::new(2);
        f.set_diagonal_jacobians(3.0, -1.0);
        assert_eq!(f.jacobian_i, vec![3.0, 0.0, 0.0, 3.0]);
        assert_eq!(f.jacobian_j, vec![-1.0, 0.0, 0.0, -1.0]);
        f.reset();
        assert!(f.jacobian_i.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_norm_partial_merge_order_independent() {
        let mut a = NormPartial::new(1);
        a.accumulate(0, &[1.0]);
        a.accumulate(1, &[-3.0]);
        let mut b = NormPartial::new(1);
        b.accumulate(2, &[3.0]);
        b.accumulate(3, &[2.0]);

        let ab = a.clone().merge(b.clone());
        let ba = b.merge(a);
        assert_eq!(ab.max_local, ba.max_local);
        assert_eq!(ab.max_local[0], 1);

        let norms = ab.finalize(4, |p| p + 100, |p| DVec3::splat(p as f64));
        assert!((norms.rms[0] - (23.0f64 / 4.0).sqrt()).abs() < 1e-14);
        assert_eq!(norms.max[0], 3.0);
        assert_eq!(norms.max_point[0], 101);
        assert_eq!(norms.max_coord[0], DVec3::splat(1.0));
    }
}
