// crates/sc_physics/src/numerics/reconstruction.rs

//! 沿半边的 MUSCL 重构
//!
//! ```text
//! q_L = q_i + α_i (∇q_i · d)
//! q_R = q_j − α_j (∇q_j · d)
//! d   = ½ (x_j − x_i)
//! ```
//!
//! 两端从共享面的两侧逼近，因此 i 端加投影、j 端减投影。

use glam::DVec3;

/// 重构端点状态
///
/// 只重构前 `gradient.len()` 个变量，其余原样复制。
///
/// - `sign`: i 端取 `+1.0`，j 端取 `-1.0`
/// - `limiter`: `None` 表示不限制
#[inline]
pub fn reconstruct(
    values: &[f64],
    gradient: &[DVec3],
    limiter: Option<&[f64]>,
    half_edge: DVec3,
    sign: f64,
    out: &mut [f64],
) {
    out.copy_from_slice(values);
    for (var, g) in gradient.iter().enumerate().take(values.len()) {
        let mut proj = g.dot(half_edge);
        if let Some(lim) = limiter {
            proj *= lim[var];
        }
        out[var] += sign * proj;
    }
}
