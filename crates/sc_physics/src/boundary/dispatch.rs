// crates/sc_physics/src/boundary/dispatch.rs

//! 边界条件分派
//!
//! 每个标记在构造时映射到一种 [`BoundaryKind`]。远场、入口、出口以
//! 单侧对流通量计入残差：
//!
//! ```text
//! n_out = −n_b                  （存储法向指向域内）
//! F     = F(V_i, V_char; Y_i, Y_ext; n_out)
//! R_i  += F,   A_ii += J_i
//! ```
//!
//! 其余类型对标量残差无贡献，周期标记由周期交换处理。

use std::collections::HashMap;

use log::debug;
use sc_config::ScalarSolverConfig;
use sc_mesh::MeshGraph;

use super::inlet::InletProfiles;
use super::types::BoundaryKind;
use crate::error::{ScalarResult, SolverError};
use crate::numerics::linear_algebra::BlockCsrMatrix;
use crate::state::ScalarState;
use crate::traits::{ConvectiveFluxLaw, FlowStateProvider};
use crate::types::{ConvectiveInput, FluxResult, PrimitiveLayout};

/// 边界分派器
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryDispatcher {
    kinds: Vec<BoundaryKind>,
}

impl BoundaryDispatcher {
    /// 按标记名映射边界类型
    ///
    /// 周期配对的标记未映射时默认为 [`BoundaryKind::Periodic`]；
    /// 其他未映射的标记返回 [`SolverError::UnmappedMarker`]。
    pub fn new(mesh: &MeshGraph, mapping: &HashMap<String, BoundaryKind>) -> ScalarResult<Self> {
        let kinds = mesh
            .markers()
            .iter()
            .map(|marker| match mapping.get(&marker.tag) {
                Some(&kind) => Ok(kind),
                None if marker.periodic_donor.is_some() => Ok(BoundaryKind::Periodic),
                None => Err(SolverError::UnmappedMarker {
                    tag: marker.tag.clone(),
                }),
            })
            .collect::<ScalarResult<Vec<_>>>()?;
        debug!("边界分派: {:?}", kinds);
        Ok(Self { kinds })
    }

    /// 所有非周期标记使用同一类型
    pub fn uniform(mesh: &MeshGraph, kind: BoundaryKind) -> Self {
        let kinds = mesh
            .markers()
            .iter()
            .map(|marker| {
                if marker.periodic_donor.is_some() {
                    BoundaryKind::Periodic
                } else {
                    kind
                }
            })
            .collect();
        Self { kinds }
    }

    /// 标记类型
    #[inline]
    pub fn kind(&self, marker: usize) -> BoundaryKind {
        self.kinds[marker]
    }

    /// 全部标记类型
    #[inline]
    pub fn kinds(&self) -> &[BoundaryKind] {
        &self.kinds
    }

    /// 施加边界条件
    ///
    /// 只处理计算域节点；显式格式不写 `jacobian`。
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        mesh: &MeshGraph,
        flow: &dyn FlowStateProvider,
        state: &ScalarState,
        config: &ScalarSolverConfig,
        inlet: &InletProfiles,
        law: &dyn ConvectiveFluxLaw,
        residual: &mut [f64],
        jacobian: &mut BlockCsrMatrix,
    ) {
        let n_var = state.n_var();
        let implicit = config.is_implicit();
        let layout = PrimitiveLayout::new(mesh.n_dim());
        let mut flux = FluxResult::new(n_var);
        let mut outlet_state = vec![0.0; n_var];

        for (m, marker) in mesh.markers().iter().enumerate() {
            let kind = self.kinds[m];
            if !kind.contributes_flux() {
                continue;
            }

            for (v, vertex) in marker.vertices.iter().enumerate() {
                let i = vertex.node;
                if !mesh.is_domain(i) {
                    continue;
                }

                let scalar_i = state.node(i);
                let scalar_j: &[f64] = match kind {
                    BoundaryKind::FarField => &config.scalar_far_field,
                    BoundaryKind::Inlet => inlet.get(m, v),
                    _ => {
                        outlet_state.copy_from_slice(scalar_i);
                        &outlet_state
                    }
                };

                let grid_velocity = config.dynamic_grid.then(|| {
                    let w = mesh.grid_velocity(i);
                    (w, w)
                });

                let input = ConvectiveInput {
                    layout,
                    normal: -vertex.normal,
                    primitive_i: flow.primitive(i),
                    primitive_j: flow.characteristic_primitive(m, v),
                    scalar_i,
                    scalar_j,
                    grid_velocity,
                };
                law.compute(&input, implicit, &mut flux);

                for (r, f) in residual[i * n_var..(i + 1) * n_var].iter_mut().zip(&flux.residual) {
                    *r += f;
                }
                if implicit {
                    jacobian.add_to_diag_block(i, &flux.jacobian_i);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowField;
    use crate::schemes::ScalarUpwind;
    use glam::DVec3;
    use sc_mesh::generation::DualMeshGenerator;

    #[test]
    fn test_mapping_and_unmapped_marker() {
        let mesh = DualMeshGenerator::new(2, 2, 1.0, 1.0).periodic_x(true).build().unwrap();
        let mut mapping = HashMap::new();
        mapping.insert(mesh.marker(2).tag.clone(), BoundaryKind::Inlet);
        mapping.insert(mesh.marker(3).tag.clone(), BoundaryKind::Outlet);
        let dispatcher = BoundaryDispatcher::new(&mesh, &mapping).unwrap();
        assert_eq!(
            dispatcher.kinds(),
            &[
                BoundaryKind::Periodic,
                BoundaryKind::Periodic,
                BoundaryKind::Inlet,
                BoundaryKind::Outlet
            ]
        );

        mapping.remove(&mesh.marker(3).tag);
        let err = BoundaryDispatcher::new(&mesh, &mapping).unwrap_err();
        assert!(matches!(err, SolverError::UnmappedMarker { .. }));
    }

    #[test]
    fn test_far_field_inflow_and_outflow() {
        // 速度 +x：左边界入流，右边界出流
        let generator = DualMeshGenerator::new(1, 1, 1.0, 1.0);
        let mesh = generator.build().unwrap();
        let flow = FlowField::uniform(mesh.n_point(), 2, DVec3::X, 1.0, 0.1);
        let state = ScalarState::new(mesh.n_point(), 1, &[0.5]).unwrap();
        let config = ScalarSolverConfig {
            scalar_far_field: vec![1.0],
            ..Default::default()
        };
        let inlet = InletProfiles::new(&mesh, &config.scalar_far_field);
        let mut dispatcher = BoundaryDispatcher::uniform(&mesh, BoundaryKind::Symmetry);
        dispatcher.kinds[0] = BoundaryKind::FarField;
        dispatcher.kinds[1] = BoundaryKind::FarField;

        let mut residual = vec![0.0; mesh.n_point()];
        let mut jac = BlockCsrMatrix::from_mesh(&mesh, 1);
        dispatcher.apply(&mesh, &flow, &state, &config, &inlet, &ScalarUpwind, &mut residual, &mut jac);

        // 左侧面积 0.5：F = −0.5 · 1.0，右侧 F = 0.5 · 0.5
        let left = generator.node_index(0, 0);
        let right = generator.node_index(1, 0);
        assert!((residual[left] + 0.5).abs() < 1e-14);
        assert!((residual[right] - 0.25).abs() < 1e-14);
        assert_eq!(jac.diag_block(left), &[0.0]);
        assert!((jac.diag_block(right)[0] - 0.5).abs() < 1e-14);
    }

    #[test]
    fn test_wall_kinds_contribute_nothing() {
        let mesh = DualMeshGenerator::new(2, 2, 1.0, 1.0).build().unwrap();
        let flow = FlowField::uniform(mesh.n_point(), 2, DVec3::new(1.0, 1.0, 0.0), 1.0, 0.1);
        let state = ScalarState::new(mesh.n_point(), 1, &[0.5]).unwrap();
        let config = ScalarSolverConfig::default();
        let inlet = InletProfiles::new(&mesh, &[0.0]);
        let mut residual = vec![0.0; mesh.n_point()];
        let mut jac = BlockCsrMatrix::from_mesh(&mesh, 1);
        BoundaryDispatcher::uniform(&mesh, BoundaryKind::EulerWall).apply(
            &mesh,
            &flow,
            &state,
            &config,
            &inlet,
            &ScalarUpwind,
            &mut residual,
            &mut jac,
        );
        assert!(residual.iter().all(|&r| r == 0.0));
    }
}
