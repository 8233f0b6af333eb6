// crates/sc_mesh/src/coloring.rs

//! 边分组着色
//!
//! 将边按连续 `group_size` 条划分为分组，再对分组着色：
//! 同一颜色的不同分组不共享任何节点，分组内部的边由同一工作线程顺序处理。
//!
//! 分组按编号递增追加到颜色中，因此只有全局最后一个分组可能不满，
//! 且它总位于所在颜色的末尾，按 `group_size` 切块总能对齐分组边界。

use log::{debug, warn};

use crate::error::{MeshError, MeshResult};
use crate::graph::MeshGraph;

/// 颜色数上限（节点已用颜色以 64 位掩码记录）
pub const MAX_COLORS: usize = 64;

/// 默认分组大小
pub const DEFAULT_GROUP_SIZE: usize = 512;

/// 边着色结果
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeColoring {
    /// 每个颜色包含的边（按分组连续存放）
    colors: Vec<Vec<usize>>,
    /// 分组大小
    group_size: usize,
    /// 估计并行效率
    efficiency: f64,
}

impl EdgeColoring {
    /// 自然着色：所有边放入一个颜色，分组大小为 1
    ///
    /// 该颜色内部存在冲突，只能用于按边写入的归约模式，效率记为 0。
    pub fn natural(n_edge: usize) -> Self {
        Self {
            colors: vec![(0..n_edge).collect()],
            group_size: 1,
            efficiency: 0.0,
        }
    }

    /// 贪心分组着色
    ///
    /// 颜色数超过 [`MAX_COLORS`] 时退回自然着色。
    pub fn greedy(graph: &MeshGraph, group_size: usize) -> Self {
        let group_size = group_size.max(1);
        let n_edge = graph.n_edge();
        if n_edge == 0 {
            return Self {
                colors: Vec::new(),
                group_size,
                efficiency: 1.0,
            };
        }

        let mut node_mask = vec![0u64; graph.n_point()];
        let mut colors: Vec<Vec<usize>> = Vec::new();

        for group_start in (0..n_edge).step_by(group_size) {
            let group_end = (group_start + group_size).min(n_edge);

            // 分组涉及节点已占用的颜色
            let used = (group_start..group_end).fold(0u64, |acc, e| {
                let (i, j) = graph.edge_nodes(e);
                acc | node_mask[i] | node_mask[j]
            });

            let color = (!used).trailing_zeros() as usize;
            if color >= MAX_COLORS {
                warn!(
                    "边着色需要超过 {} 种颜色 (group_size={})，退回自然着色",
                    MAX_COLORS, group_size
                );
                return Self::natural(n_edge);
            }

            let bit = 1u64 << color;
            for e in group_start..group_end {
                let (i, j) = graph.edge_nodes(e);
                node_mask[i] |= bit;
                node_mask[j] |= bit;
            }

            if color == colors.len() {
                colors.push(Vec::new());
            }
            colors[color].extend(group_start..group_end);
        }

        let mut result = Self {
            colors,
            group_size,
            efficiency: 0.0,
        };
        result.efficiency = result.parallel_efficiency(rayon::current_num_threads());
        debug!(
            "边着色完成: {} 条边, {} 种颜色, group_size={}, 效率={:.3}",
            n_edge,
            result.n_colors(),
            group_size,
            result.efficiency
        );
        result
    }

    /// 颜色数
    #[inline]
    pub fn n_colors(&self) -> usize {
        self.colors.len()
    }

    /// 分组大小
    #[inline]
    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// 构建时估计的并行效率
    #[inline]
    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    /// 指定颜色的边
    #[inline]
    pub fn color(&self, color: usize) -> &[usize] {
        &self.colors[color]
    }

    /// 所有颜色
    #[inline]
    pub fn colors(&self) -> &[Vec<usize>] {
        &self.colors
    }

    /// 边总数
    pub fn n_edge(&self) -> usize {
        self.colors.iter().map(Vec::len).sum()
    }

    /// 给定线程数下的并行效率
    ///
    /// 理想耗时为总边数除以线程数，实际耗时先按颜色、再按分组块量化。
    pub fn parallel_efficiency(&self, n_threads: usize) -> f64 {
        let n_threads = n_threads.max(1);
        let total = self.n_edge();
        if total == 0 {
            return 1.0;
        }
        let ideal = total as f64 / n_threads as f64;
        let real: usize = self
            .colors
            .iter()
            .map(|c| {
                let n_groups = c.len().div_ceil(self.group_size);
                self.group_size * n_groups.div_ceil(n_threads)
            })
            .sum();
        ideal / real as f64
    }

    /// 验证同一颜色的不同分组不共享节点，且每条边恰好出现一次
    pub fn validate(&self, graph: &MeshGraph) -> MeshResult<()> {
        if self.n_edge() != graph.n_edge() {
            return Err(MeshError::count_mismatch(
                "colored_edges",
                graph.n_edge(),
                self.n_edge(),
            ));
        }

        let mut seen = vec![false; graph.n_edge()];
        // 节点最近一次被哪个 (颜色, 分组) 占用
        let mut owner: Vec<Option<(usize, usize)>> = vec![None; graph.n_point()];

        for (c, edges) in self.colors.iter().enumerate() {
            for (g, group) in edges.chunks(self.group_size).enumerate() {
                for &e in group {
                    if e >= graph.n_edge() || std::mem::replace(&mut seen[e], true) {
                        return Err(MeshError::topology(
                            "validate_coloring",
                            format!("边 {} 越界或重复出现", e),
                        ));
                    }
                    let (i, j) = graph.edge_nodes(e);
                    for node in [i, j] {
                        match owner[node] {
                            Some((oc, og)) if oc == c && og != g => {
                                return Err(MeshError::ColoringConflict {
                                    color: c,
                                    edge: e,
                                    node,
                                });
                            }
                            _ => owner[node] = Some((c, g)),
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
