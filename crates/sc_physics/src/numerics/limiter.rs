// crates/sc_physics/src/numerics/limiter.rs

//! 基于节点的斜率限制器
//!
//! 限制因子 α ∈ [0, 1] 作用于重构:
//!
//! ```text
//! q_face = q_i + α * (∇q_i · r)
//! ```
//!
//! 其中 r 为节点到边中点的向量。节点限制因子取所有关联边的最小值。
//!
//! - [`BarthJespersen`]: 严格保证不产生新极值
//! - [`Venkatakrishnan`]: 光滑版本，ε² = (K·h)³

use glam::DVec3;
use rayon::prelude::*;
use sc_mesh::MeshGraph;

/// 梯度视为零的阈值
const GRADIENT_TOL: f64 = 1e-12;

/// 限制器接口
pub trait SlopeLimiter: Send + Sync {
    /// 名称
    fn name(&self) -> &'static str;

    /// 单个面的限制因子
    ///
    /// - `delta`: 梯度投影 ∇q·r
    /// - `delta_max`: q_max - q_i（≥ 0）
    /// - `delta_min`: q_min - q_i（≤ 0）
    /// - `h`: 节点特征尺度
    fn limit(&self, delta: f64, delta_max: f64, delta_min: f64, h: f64) -> f64;
}

/// Barth-Jespersen 限制器
#[derive(Debug, Clone, Copy, Default)]
pub struct BarthJespersen;

impl SlopeLimiter for BarthJespersen {
    fn name(&self) -> &'static str {
        "BarthJespersen"
    }

    #[inline]
    fn limit(&self, delta: f64, delta_max: f64, delta_min: f64, _h: f64) -> f64 {
        if delta.abs() < GRADIENT_TOL {
            return 1.0;
        }
        if delta > 0.0 {
            if delta_max > GRADIENT_TOL {
                (delta_max / delta).min(1.0)
            } else {
                0.0
            }
        } else if delta_min < -GRADIENT_TOL {
            (delta_min / delta).min(1.0)
        } else {
            0.0
        }
    }
}

/// Venkatakrishnan 限制器
#[derive(Debug, Clone, Copy)]
pub struct Venkatakrishnan {
    /// K 参数，越大限制越弱
    pub k: f64,
}

impl Default for Venkatakrishnan {
    fn default() -> Self {
        Self { k: 0.05 }
    }
}

impl Venkatakrishnan {
    /// 光滑限制函数 φ(x, y)，x 为梯度投影，y 为允许变化量（同号）
    #[inline]
    fn phi(x: f64, y: f64, eps2: f64) -> f64 {
        let numerator = y * y + eps2 + 2.0 * x * y;
        let denominator = y * y + 2.0 * x * x + x * y + eps2;
        if denominator.abs() < f64::MIN_POSITIVE {
            1.0
        } else {
            numerator / denominator
        }
    }
}

impl SlopeLimiter for Venkatakrishnan {
    fn name(&self) -> &'static str {
        "Venkatakrishnan"
    }

    #[inline]
    fn limit(&self, delta: f64, delta_max: f64, delta_min: f64, h: f64) -> f64 {
        if delta.abs() < GRADIENT_TOL {
            return 1.0;
        }
        let kh = self.k * h;
        let eps2 = kh * kh * kh;
        let y = if delta > 0.0 { delta_max } else { delta_min };
        Self::phi(delta, y, eps2).clamp(0.0, 1.0)
    }
}

/// 计算所有节点、所有变量的限制因子
///
/// `values`、`gradient`、`limiter` 均按 `[point * n_var + var]` 存放。
pub fn compute_node_limiter(
    mesh: &MeshGraph,
    values: &[f64],
    gradient: &[DVec3],
    n_var: usize,
    law: &dyn SlopeLimiter,
    limiter: &mut [f64],
) {
    let n_dim = mesh.n_dim() as f64;

    limiter
        .par_chunks_mut(n_var)
        .enumerate()
        .for_each(|(i, lim)| {
            let h = mesh.volume(i).powf(1.0 / n_dim);
            let xi = mesh.coord(i);
            for (var, out) in lim.iter_mut().enumerate() {
                let qi = values[i * n_var + var];
                let (mut q_min, mut q_max) = (qi, qi);
                for &e in mesh.node_edges(i) {
                    let (a, b) = mesh.edge_nodes(e);
                    let j = if a == i { b } else { a };
                    let qj = values[j * n_var + var];
                    q_min = q_min.min(qj);
                    q_max = q_max.max(qj);
                }

                let g = gradient[i * n_var + var];
                let mut alpha: f64 = 1.0;
                for &e in mesh.node_edges(i) {
                    let (a, b) = mesh.edge_nodes(e);
                    let j = if a == i { b } else { a };
                    let r = 0.5 * (mesh.coord(j) - xi);
                    alpha = alpha.min(law.limit(g.dot(r), q_max - qi, q_min - qi, h));
                }
                *out = alpha;
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_mesh::generation::DualMeshGenerator;

    #[test]
    fn test_barth_jespersen() {
        let bj = BarthJespersen;
        assert_eq!(bj.limit(0.0, 1.0, -1.0, 1.0), 1.0);
        assert_eq!(bj.limit(0.5, 1.0, -1.0, 1.0), 1.0);
        assert_eq!(bj.limit(2.0, 1.0, -1.0, 1.0), 0.5);
        assert_eq!(bj.limit(-4.0, 1.0, -1.0, 1.0), 0.25);
        // 局部极值
        assert_eq!(bj.limit(1.0, 0.0, -1.0, 1.0), 0.0);
    }

    #[test]
    fn test_venkatakrishnan_range() {
        let vk = Venkatakrishnan { k: 0.3 };
        for &delta in &[-3.0, -0.5, 0.2, 1.0, 5.0] {
            let phi = vk.limit(delta, 1.0, -1.0, 0.1);
            assert!((0.0..=1.0).contains(&phi), "delta={} phi={}", delta, phi);
        }
        // 小梯度几乎不限制
        assert!(vk.limit(0.01, 1.0, -1.0, 0.1) > 0.99);
        // 大梯度强限制
        assert!(vk.limit(10.0, 1.0, -1.0, 0.01) < 0.2);
    }

    #[test]
    fn test_linear_field_not_limited_in_interior() {
        let mesh = DualMeshGenerator::new(4, 4, 1.0, 1.0).build().unwrap();
        let values: Vec<f64> = (0..mesh.n_point()).map(|p| mesh.coord(p).x).collect();
        let gradient = vec![DVec3::X; mesh.n_point()];
        let mut lim = vec![0.0; mesh.n_point()];
        compute_node_limiter(&mesh, &values, &gradient, 1, &BarthJespersen, &mut lim);
        // 内部节点：半边增量不超过邻居极差
        assert_eq!(lim[2 * 5 + 2], 1.0);
    }
}
