// crates/sc_physics/src/schemes/upwind.rs

//! 标量迎风对流通量
//!
//! ```text
//! q  = ½ ((u_i − w_i) + (u_j − w_j)) · n
//! a0 = ½ (q + |q|),  a1 = ½ (q − |q|)
//! F  = a0 ρ_i Y_i + a1 ρ_j Y_j
//! J_i = a0 ρ_i I,  J_j = a1 ρ_j I
//! ```
//!
//! 输运量为 ρY，Jacobian 对 Y 线性化。

use crate::traits::ConvectiveFluxLaw;
use crate::types::{ConvectiveInput, FluxResult};

/// 标量一阶迎风通量
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarUpwind;

impl ScalarUpwind {
    /// 创建
    pub fn new() -> Self {
        Self
    }
}

impl ConvectiveFluxLaw for ScalarUpwind {
    fn name(&self) -> &'static str {
        "ScalarUpwind"
    }

    fn compute(&self, input: &ConvectiveInput<'_>, implicit: bool, out: &mut FluxResult) {
        let layout = input.layout;
        let mut u_i = layout.velocity(input.primitive_i);
        let mut u_j = layout.velocity(input.primitive_j);
        if let Some((w_i, w_j)) = input.grid_velocity {
            u_i -= w_i;
            u_j -= w_j;
        }

        let q = 0.5 * (u_i + u_j).dot(input.normal);
        let a0 = 0.5 * (q + q.abs());
        let a1 = 0.5 * (q - q.abs());
        let rho_i = layout.density(input.primitive_i);
        let rho_j = layout.density(input.primitive_j);

        for (var, r) in out.residual.iter_mut().enumerate() {
            *r = a0 * rho_i * input.scalar_i[var] + a1 * rho_j * input.scalar_j[var];
        }

        if implicit {
            out.set_diagonal_jacobians(a0 * rho_i, a1 * rho_j);
        }
    }
}
