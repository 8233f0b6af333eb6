// crates/sc_physics/src/boundary/types.rs

//! 边界类型

use serde::{Deserialize, Serialize};

/// 边界标记类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    /// 对称面（零通量）
    Symmetry,
    /// 无粘壁面（零通量）
    EulerWall,
    /// 热流壁面（零标量通量）
    HeatFluxWall,
    /// 等温壁面（零标量通量）
    IsothermalWall,
    /// 远场：对远场参考状态的单侧通量
    FarField,
    /// 入口：对入口剖面的单侧通量
    Inlet,
    /// 出口：零梯度（外部状态取内部值）
    Outlet,
    /// 周期：由周期交换处理
    Periodic,
    /// 内部边界（不参与 GCL 边界项）
    Internal,
}

impl BoundaryKind {
    /// 是否对残差有贡献
    #[inline]
    pub fn contributes_flux(&self) -> bool {
        matches!(self, Self::FarField | Self::Inlet | Self::Outlet)
    }

    /// 是否内部边界
    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal)
    }
}
