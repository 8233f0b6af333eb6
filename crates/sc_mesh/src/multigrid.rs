// crates/sc_mesh/src/multigrid.rs

//! 多重网格层级
//!
//! 第 0 层为最细网格，第 k 层的每个粗节点记录其在第 k-1 层的子控制体。
//! 粗层由相邻节点贪心聚合生成，粗控制体体积等于子控制体体积之和。

use std::collections::HashMap;

use glam::DVec3;
use log::{debug, warn};
use smallvec::SmallVec;

use crate::error::{MeshError, MeshResult};
use crate::graph::{MarkerVertex, MeshGraph};

/// 子控制体列表
pub type Children = SmallVec<[usize; 8]>;

/// 单个网格层
#[derive(Debug, Clone)]
pub struct MeshLevel {
    graph: MeshGraph,
    /// 每个节点在上一（更细）层的子节点，最细层为空
    children: Vec<Children>,
}

impl MeshLevel {
    /// 网格图
    #[inline]
    pub fn graph(&self) -> &MeshGraph {
        &self.graph
    }

    /// 可变网格图（动网格更新）
    #[inline]
    pub fn graph_mut(&mut self) -> &mut MeshGraph {
        &mut self.graph
    }

    /// 节点的子控制体
    #[inline]
    pub fn children(&self, point: usize) -> &[usize] {
        self.children.get(point).map(|c| c.as_slice()).unwrap_or(&[])
    }
}

/// 多重网格层级
#[derive(Debug, Clone)]
pub struct MeshHierarchy {
    levels: Vec<MeshLevel>,
}

impl MeshHierarchy {
    /// 单层（无多重网格）
    pub fn single(graph: MeshGraph) -> Self {
        Self {
            levels: vec![MeshLevel {
                graph,
                children: Vec::new(),
            }],
        }
    }

    /// 由外部提供的粗层及子节点关系构建
    ///
    /// `coarse[k]` 为第 k+1 层网格图及其每个节点在第 k 层的子节点。
    pub fn from_levels(
        finest: MeshGraph,
        coarse: Vec<(MeshGraph, Vec<Vec<usize>>)>,
    ) -> MeshResult<Self> {
        let mut hierarchy = Self::single(finest);
        for (graph, children) in coarse {
            let fine = hierarchy.graph(hierarchy.levels.len() - 1);
            validate_children(fine, &graph, &children)?;
            hierarchy.levels.push(MeshLevel {
                graph,
                children: children.into_iter().map(Children::from_vec).collect(),
            });
        }
        Ok(hierarchy)
    }

    /// 贪心聚合生成 `n_coarse` 个粗层
    pub fn agglomerate(finest: MeshGraph, n_coarse: usize) -> MeshResult<Self> {
        let mut hierarchy = Self::single(finest);
        for k in 0..n_coarse {
            let fine = hierarchy.graph(k);
            let (graph, children) = agglomerate_level(fine)?;
            debug!(
                "多重网格第 {} 层: {} 节点 -> {} 节点, {} 条边",
                k + 1,
                fine.n_point(),
                graph.n_point(),
                graph.n_edge()
            );
            hierarchy.levels.push(MeshLevel { graph, children });
        }
        Ok(hierarchy)
    }

    /// 层数（含最细层）
    #[inline]
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// 粗层数
    #[inline]
    pub fn n_coarse_levels(&self) -> usize {
        self.levels.len() - 1
    }

    /// 指定层
    #[inline]
    pub fn level(&self, level: usize) -> &MeshLevel {
        &self.levels[level]
    }

    /// 指定层（可变）
    #[inline]
    pub fn level_mut(&mut self, level: usize) -> &mut MeshLevel {
        &mut self.levels[level]
    }

    /// 指定层网格图
    #[inline]
    pub fn graph(&self, level: usize) -> &MeshGraph {
        &self.levels[level].graph
    }

    /// 最细层网格图
    #[inline]
    pub fn finest(&self) -> &MeshGraph {
        &self.levels[0].graph
    }
}

/// 检查每个细节点恰好属于一个粗节点，且粗节点体积与子体积之和一致
fn validate_children(fine: &MeshGraph, coarse: &MeshGraph, children: &[Vec<usize>]) -> MeshResult<()> {
    if children.len() != coarse.n_point() {
        return Err(MeshError::count_mismatch("children", coarse.n_point(), children.len()));
    }
    let mut assigned = vec![false; fine.n_point()];
    for (parent, list) in children.iter().enumerate() {
        let mut vol = 0.0;
        for &child in list {
            if child >= fine.n_point() || std::mem::replace(&mut assigned[child], true) {
                return Err(MeshError::topology(
                    "multigrid",
                    format!("子节点 {} 越界或被多次聚合", child),
                ));
            }
            vol += fine.volume(child);
        }
        let parent_vol = coarse.volume(parent);
        if (vol - parent_vol).abs() > 1e-10 * parent_vol.max(1.0) {
            return Err(MeshError::topology(
                "multigrid",
                format!("粗节点 {} 体积 {} 与子体积之和 {} 不一致", parent, parent_vol, vol),
            ));
        }
    }
    if let Some(orphan) = assigned.iter().position(|a| !a) {
        return Err(MeshError::topology(
            "multigrid",
            format!("细节点 {} 未被聚合", orphan),
        ));
    }
    Ok(())
}

/// 聚合一层：种子节点吸收所有未分配的相邻节点
fn agglomerate_level(fine: &MeshGraph) -> MeshResult<(MeshGraph, Vec<Children>)> {
    const UNASSIGNED: usize = usize::MAX;
    let n_fine = fine.n_point();
    let mut parent = vec![UNASSIGNED; n_fine];
    let mut children: Vec<Children> = Vec::new();

    // 计算域节点只与计算域节点聚合
    for seed in 0..fine.n_point_domain() {
        if parent[seed] != UNASSIGNED {
            continue;
        }
        let id = children.len();
        let mut group = Children::new();
        parent[seed] = id;
        group.push(seed);
        for &e in fine.node_edges(seed) {
            let (i, j) = fine.edge_nodes(e);
            let other = if i == seed { j } else { i };
            if fine.is_domain(other) && parent[other] == UNASSIGNED {
                parent[other] = id;
                group.push(other);
            }
        }
        children.push(group);
    }
    let n_coarse_domain = children.len();

    // halo 节点各自成为粗 halo 节点
    for halo in fine.n_point_domain()..n_fine {
        parent[halo] = children.len();
        children.push(Children::from_slice(&[halo]));
    }

    let mut builder = MeshGraph::builder(fine.n_dim());
    let mut volume_n: Vec<f64> = Vec::with_capacity(children.len());
    let mut volume_nm1: Vec<f64> = Vec::with_capacity(children.len());
    for group in &children {
        let vol: f64 = group.iter().map(|&c| fine.volume(c)).sum();
        let centroid = group
            .iter()
            .fold(DVec3::ZERO, |acc, &c| acc + fine.coord(c) * fine.volume(c))
            / vol;
        builder.add_node(centroid, vol);
        volume_n.push(group.iter().map(|&c| fine.volume_n(c)).sum());
        volume_nm1.push(group.iter().map(|&c| fine.volume_nm1(c)).sum());
    }

    // 粗边法向为跨越两粗节点的细边法向之和（统一从小编号指向大编号）
    let mut edge_lookup: HashMap<(usize, usize), usize> = HashMap::new();
    let mut coarse_edges: Vec<((usize, usize), DVec3)> = Vec::new();
    for e in 0..fine.n_edge() {
        let (i, j) = fine.edge_nodes(e);
        let (p, q) = (parent[i], parent[j]);
        if p == q {
            continue;
        }
        let (key, normal) = if p < q {
            ((p, q), fine.edge_normal(e))
        } else {
            ((q, p), -fine.edge_normal(e))
        };
        match edge_lookup.get(&key) {
            Some(&idx) => coarse_edges[idx].1 += normal,
            None => {
                edge_lookup.insert(key, coarse_edges.len());
                coarse_edges.push((key, normal));
            }
        }
    }
    for ((p, q), normal) in coarse_edges {
        builder.add_edge(p, q, normal);
    }

    // 边界顶点按粗节点合并
    let mut marker_counts = Vec::with_capacity(fine.n_marker());
    for marker in fine.markers() {
        let mut vertices: Vec<MarkerVertex> = Vec::new();
        let mut lookup: HashMap<usize, usize> = HashMap::new();
        for v in &marker.vertices {
            let p = parent[v.node];
            match lookup.get(&p) {
                Some(&idx) => vertices[idx].normal += v.normal,
                None => {
                    lookup.insert(p, vertices.len());
                    vertices.push(MarkerVertex { node: p, normal: v.normal });
                }
            }
        }
        marker_counts.push(vertices.len());
        builder.add_marker(marker.tag.clone(), vertices);
    }
    for (m, marker) in fine.markers().iter().enumerate() {
        if let Some(donor) = marker.periodic_donor {
            if m < donor {
                if marker_counts[m] == marker_counts[donor] {
                    builder.pair_periodic(m, donor);
                } else {
                    warn!(
                        "周期标记 {} 聚合后顶点数不一致 ({} vs {})，粗层不配对",
                        marker.tag, marker_counts[m], marker_counts[donor]
                    );
                }
            }
        }
    }

    // 粗 halo 节点沿用细 halo 拥有者所在粗节点的全局编号
    let mut global = Vec::with_capacity(children.len());
    let mut next_free = n_coarse_domain;
    for (id, group) in children.iter().enumerate() {
        if id < n_coarse_domain {
            global.push(id);
            continue;
        }
        let owner = fine
            .global_to_local(fine.global_index(group[0]))
            .map(|owner| parent[owner]);
        match owner {
            Some(p) => global.push(p),
            None => {
                global.push(next_free);
                next_free += 1;
            }
        }
    }
    builder.n_point_domain(n_coarse_domain).global_indices(global);

    let mut graph = builder.build()?;
    let volume = graph.volumes().to_vec();
    graph.set_volumes(volume, volume_n, volume_nm1)?;
    Ok((graph, children))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::DualMeshGenerator;

    #[test]
    fn test_agglomerate_preserves_volume() {
        let fine = DualMeshGenerator::new(6, 6, 3.0, 3.0).build().unwrap();
        let total = fine.total_domain_volume();
        let h = MeshHierarchy::agglomerate(fine, 2).unwrap();
        assert_eq!(h.n_levels(), 3);
        for k in 1..3 {
            let coarse = h.graph(k);
            assert!(coarse.n_point() < h.graph(k - 1).n_point());
            assert!((coarse.total_domain_volume() - total).abs() < 1e-10);
            for p in 0..coarse.n_point() {
                let vol: f64 = h
                    .level(k)
                    .children(p)
                    .iter()
                    .map(|&c| h.graph(k - 1).volume(c))
                    .sum();
                assert!((vol - coarse.volume(p)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_coarse_level_closed() {
        let fine = DualMeshGenerator::new(5, 4, 1.0, 1.0).build().unwrap();
        let h = MeshHierarchy::agglomerate(fine, 1).unwrap();
        let mesh = h.graph(1);
        let mut sum = vec![DVec3::ZERO; mesh.n_point()];
        for e in 0..mesh.n_edge() {
            let (i, j) = mesh.edge_nodes(e);
            sum[i] += mesh.edge_normal(e);
            sum[j] -= mesh.edge_normal(e);
        }
        for marker in mesh.markers() {
            for v in &marker.vertices {
                sum[v.node] -= v.normal;
            }
        }
        assert!(sum.iter().all(|s| s.length() < 1e-12));
    }

    #[test]
    fn test_from_levels_rejects_orphan() {
        let fine = DualMeshGenerator::new(1, 1, 1.0, 1.0).build().unwrap();
        let mut b = MeshGraph::builder(2);
        b.add_node(DVec3::ZERO, 0.5);
        let coarse = b.build().unwrap();
        let result = MeshHierarchy::from_levels(fine, vec![(coarse, vec![vec![0, 1]])]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_levels_accepts_valid() {
        let fine = DualMeshGenerator::new(1, 1, 1.0, 1.0).build().unwrap();
        let mut b = MeshGraph::builder(2);
        b.add_node(DVec3::ZERO, 1.0);
        let coarse = b.build().unwrap();
        let h = MeshHierarchy::from_levels(fine, vec![(coarse, vec![vec![0, 1, 2, 3]])]).unwrap();
        assert_eq!(h.level(1).children(0), &[0, 1, 2, 3]);
    }
}
