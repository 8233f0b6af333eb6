// crates/sc_physics/src/coloring.rs

//! 边着色适配器
//!
//! 根据着色的并行效率选择边循环的累加方式：
//!
//! - **直接模式**：颜色之间顺序执行，颜色内部按分组并行，
//!   直接写入节点残差与 Jacobian（同一颜色的不同分组不共享节点）
//! - **归约模式**：单一自然着色，按边写入边通量缓冲区，
//!   边循环结束后再按节点并行求和
//!
//! 调度块大小为 `next_multiple(min_chunk_size, group_size)`，保证一个分组
//! 不会被拆到两个任务中。

use log::{debug, warn};
use sc_config::ScalarSolverConfig;
use sc_foundation::next_multiple;
use sc_mesh::{EdgeColoring, MeshGraph};

use crate::error::ScalarResult;

/// 边循环累加方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyMode {
    /// 直接写入节点
    Direct,
    /// 边通量缓冲 + 节点归约
    Reducer,
}

/// 边着色适配器
#[derive(Debug, Clone)]
pub struct ColoringAdapter {
    mode: AssemblyMode,
    coloring: EdgeColoring,
    chunk_size: usize,
}

impl ColoringAdapter {
    /// 按配置从网格计算着色并选择模式
    pub fn from_mesh(graph: &MeshGraph, config: &ScalarSolverConfig) -> Self {
        let coloring = EdgeColoring::greedy(graph, config.edge_group_size);
        Self::select(
            graph,
            coloring,
            config.coloring_efficiency_threshold,
            config.min_chunk_size,
        )
    }

    /// 由预计算着色选择模式
    ///
    /// 效率低于阈值或着色验证失败时使用归约模式。
    pub fn select(
        graph: &MeshGraph,
        coloring: EdgeColoring,
        threshold: f64,
        min_chunk_size: usize,
    ) -> Self {
        let efficiency = coloring.efficiency();
        let mode = if efficiency < threshold {
            debug!(
                "着色效率 {:.3} 低于阈值 {:.3}，使用归约模式",
                efficiency, threshold
            );
            AssemblyMode::Reducer
        } else if let Err(err) = coloring.validate(graph) {
            warn!("着色验证失败，改用归约模式: {}", err);
            AssemblyMode::Reducer
        } else {
            debug!(
                "直接模式: {} 种颜色, group_size={}, 效率 {:.3}",
                coloring.n_colors(),
                coloring.group_size(),
                efficiency
            );
            AssemblyMode::Direct
        };
        Self::build(graph, coloring, mode, min_chunk_size)
    }

    /// 强制指定模式
    ///
    /// 直接模式要求着色通过验证，否则返回错误。
    pub fn with_mode(
        graph: &MeshGraph,
        coloring: EdgeColoring,
        mode: AssemblyMode,
        min_chunk_size: usize,
    ) -> ScalarResult<Self> {
        if mode == AssemblyMode::Direct {
            coloring.validate(graph)?;
        }
        Ok(Self::build(graph, coloring, mode, min_chunk_size))
    }

    fn build(
        graph: &MeshGraph,
        coloring: EdgeColoring,
        mode: AssemblyMode,
        min_chunk_size: usize,
    ) -> Self {
        let coloring = match mode {
            AssemblyMode::Direct => coloring,
            AssemblyMode::Reducer => EdgeColoring::natural(graph.n_edge()),
        };
        let chunk_size = next_multiple(min_chunk_size.max(1), coloring.group_size());
        Self {
            mode,
            coloring,
            chunk_size,
        }
    }

    /// 累加方式
    #[inline]
    pub fn mode(&self) -> AssemblyMode {
        self.mode
    }

    /// 是否归约模式
    #[inline]
    pub fn is_reducer(&self) -> bool {
        self.mode == AssemblyMode::Reducer
    }

    /// 使用的着色
    #[inline]
    pub fn coloring(&self) -> &EdgeColoring {
        &self.coloring
    }

    /// 调度块大小（分组大小的整数倍）
    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
