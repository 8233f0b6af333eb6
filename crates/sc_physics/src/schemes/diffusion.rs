// crates/sc_physics/src/schemes/diffusion.rs

//! 平均梯度扩散通量（带边法向修正）
//!
//! ```text
//! e   = x_j − x_i
//! ∇Ȳ  = ½ (∇Y_i + ∇Y_j)
//! F   = D̄ [ ∇Ȳ·n − (∇Ȳ·e − (Y_j − Y_i)) (e·n)/|e|² ]
//! J_i = −D̄ (e·n)/|e|² I,  J_j = −J_i
//! ```
//!
//! 修正项以两点差分替换平均梯度在边方向的分量，抑制奇偶失耦。

use crate::traits::ViscousFluxLaw;
use crate::types::{FluxResult, ViscousInput};

/// 平均梯度扩散通量
#[derive(Debug, Clone, Copy)]
pub struct AverageGradientDiffusion {
    /// 是否启用边法向修正
    pub correct_gradient: bool,
}

impl Default for AverageGradientDiffusion {
    fn default() -> Self {
        Self {
            correct_gradient: true,
        }
    }
}

impl ViscousFluxLaw for AverageGradientDiffusion {
    fn name(&self) -> &'static str {
        "AverageGradientDiffusion"
    }

    fn compute(&self, input: &ViscousInput<'_>, implicit: bool, out: &mut FluxResult) {
        let edge = input.coord_j - input.coord_i;
        let dist2 = edge.length_squared();
        let proj_edge = if dist2 > 0.0 {
            edge.dot(input.normal) / dist2
        } else {
            0.0
        };

        let n_var = out.n_var();
        for var in 0..n_var {
            let d = 0.5 * (input.diffusivity_i[var] + input.diffusivity_j[var]);
            let mean_grad = 0.5 * (input.gradient_i[var] + input.gradient_j[var]);
            let mut proj = mean_grad.dot(input.normal);
            if self.correct_gradient {
                let delta = input.scalar_j[var] - input.scalar_i[var];
                proj -= (mean_grad.dot(edge) - delta) * proj_edge;
            }
            out.residual[var] = d * proj;

            if implicit {
                out.jacobian_i[var * n_var..(var + 1) * n_var].fill(0.0);
                out.jacobian_j[var * n_var..(var + 1) * n_var].fill(0.0);
                out.jacobian_i[var * n_var + var] = -d * proj_edge;
                out.jacobian_j[var * n_var + var] = d * proj_edge;
            }
        }
    }
}
