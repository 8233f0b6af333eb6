// crates/sc_mesh/src/graph.rs

//! 边式对偶网格图
//!
//! 以节点（控制体）和有向边（面）组织的只读网格，供边循环组装使用。
//!
//! # 约定
//!
//! - 节点 `0..n_point_domain` 为计算域节点，其余为 halo 节点
//! - 边法向从 `node0` 指向 `node1`，模长为面面积
//! - 边界顶点法向指向计算域内部，模长为边界面面积
//! - 2D 网格的 z 分量恒为 0，体积即面积

use std::collections::{HashMap, HashSet};

use glam::DVec3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{MeshError, MeshResult};

/// 节点关联边列表
pub type NodeEdges = SmallVec<[usize; 8]>;

// ============================================================
// 边界标记
// ============================================================

/// 边界顶点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerVertex {
    /// 所在节点
    pub node: usize,
    /// 边界面法向（指向域内）
    pub normal: DVec3,
}

/// 边界标记
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// 标记名称
    pub tag: String,
    /// 顶点列表
    pub vertices: Vec<MarkerVertex>,
    /// 周期配对标记（第 k 个顶点与配对标记的第 k 个顶点互为像点）
    pub periodic_donor: Option<usize>,
}

impl Marker {
    /// 顶点数
    #[inline]
    pub fn n_vertex(&self) -> usize {
        self.vertices.len()
    }
}

// ============================================================
// 网格图
// ============================================================

/// 边式对偶网格图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshGraph {
    n_dim: usize,
    n_point_domain: usize,
    n_global_point_domain: usize,

    // ===== 节点数据 =====
    coords: Vec<DVec3>,
    volume: Vec<f64>,
    volume_n: Vec<f64>,
    volume_nm1: Vec<f64>,
    periodic_volume: Vec<f64>,
    grid_velocity: Vec<DVec3>,
    global_index: Vec<usize>,
    global_to_local: HashMap<usize, usize>,
    node_edges: Vec<NodeEdges>,

    // ===== 边数据 =====
    edges: Vec<[usize; 2]>,
    edge_normals: Vec<DVec3>,

    // ===== 边界数据 =====
    markers: Vec<Marker>,
}

impl MeshGraph {
    /// 创建构建器
    pub fn builder(n_dim: usize) -> MeshGraphBuilder {
        MeshGraphBuilder::new(n_dim)
    }

    // =========================================================================
    // 基本统计
    // =========================================================================

    /// 空间维数
    #[inline]
    pub fn n_dim(&self) -> usize {
        self.n_dim
    }

    /// 节点总数（含 halo）
    #[inline]
    pub fn n_point(&self) -> usize {
        self.coords.len()
    }

    /// 计算域节点数
    #[inline]
    pub fn n_point_domain(&self) -> usize {
        self.n_point_domain
    }

    /// 全局计算域节点数
    #[inline]
    pub fn n_global_point_domain(&self) -> usize {
        self.n_global_point_domain
    }

    /// 边数
    #[inline]
    pub fn n_edge(&self) -> usize {
        self.edges.len()
    }

    /// 标记数
    #[inline]
    pub fn n_marker(&self) -> usize {
        self.markers.len()
    }

    // =========================================================================
    // 节点访问
    // =========================================================================

    /// 是否为计算域节点
    #[inline]
    pub fn is_domain(&self, point: usize) -> bool {
        point < self.n_point_domain
    }

    /// 节点坐标
    #[inline]
    pub fn coord(&self, point: usize) -> DVec3 {
        self.coords[point]
    }

    /// 当前控制体体积（n+1 时间层）
    #[inline]
    pub fn volume(&self, point: usize) -> f64 {
        self.volume[point]
    }

    /// n 时间层体积
    #[inline]
    pub fn volume_n(&self, point: usize) -> f64 {
        self.volume_n[point]
    }

    /// n-1 时间层体积
    #[inline]
    pub fn volume_nm1(&self, point: usize) -> f64 {
        self.volume_nm1[point]
    }

    /// 周期像点贡献的附加体积
    #[inline]
    pub fn periodic_volume(&self, point: usize) -> f64 {
        self.periodic_volume[point]
    }

    /// 网格速度
    #[inline]
    pub fn grid_velocity(&self, point: usize) -> DVec3 {
        self.grid_velocity[point]
    }

    /// 全局编号
    #[inline]
    pub fn global_index(&self, point: usize) -> usize {
        self.global_index[point]
    }

    /// 全局编号映射到本地计算域节点
    #[inline]
    pub fn global_to_local(&self, global: usize) -> Option<usize> {
        self.global_to_local.get(&global).copied()
    }

    /// 节点关联的边
    #[inline]
    pub fn node_edges(&self, point: usize) -> &[usize] {
        &self.node_edges[point]
    }

    /// 所有节点坐标
    #[inline]
    pub fn coords(&self) -> &[DVec3] {
        &self.coords
    }

    /// 所有节点体积
    #[inline]
    pub fn volumes(&self) -> &[f64] {
        &self.volume
    }

    // =========================================================================
    // 边访问
    // =========================================================================

    /// 边的两个端点
    #[inline]
    pub fn edge_nodes(&self, edge: usize) -> (usize, usize) {
        let [i, j] = self.edges[edge];
        (i, j)
    }

    /// 边法向
    #[inline]
    pub fn edge_normal(&self, edge: usize) -> DVec3 {
        self.edge_normals[edge]
    }

    /// 所有边
    #[inline]
    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    // =========================================================================
    // 边界访问
    // =========================================================================

    /// 所有标记
    #[inline]
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// 指定标记
    #[inline]
    pub fn marker(&self, marker: usize) -> &Marker {
        &self.markers[marker]
    }

    /// 按名称查找标记
    pub fn marker_index(&self, tag: &str) -> Option<usize> {
        self.markers.iter().position(|m| m.tag == tag)
    }

    /// 周期标记对 `(marker, donor)`，每对只出现一次
    pub fn periodic_pairs(&self) -> Vec<(usize, usize)> {
        self.markers
            .iter()
            .enumerate()
            .filter_map(|(m, marker)| match marker.periodic_donor {
                Some(donor) if m < donor => Some((m, donor)),
                _ => None,
            })
            .collect()
    }

    /// halo 节点及其本地拥有者 `(halo, owner)`
    ///
    /// 拥有者是全局编号相同的计算域节点；无本地拥有者的 halo 节点不出现。
    pub fn halo_donors(&self) -> Vec<(usize, usize)> {
        (self.n_point_domain..self.n_point())
            .filter_map(|halo| {
                self.global_to_local(self.global_index[halo])
                    .map(|owner| (halo, owner))
            })
            .collect()
    }

    // =========================================================================
    // 动网格更新（由外部网格运动模块调用）
    // =========================================================================

    /// 设置网格速度
    pub fn set_grid_velocities(&mut self, velocities: Vec<DVec3>) -> MeshResult<()> {
        if velocities.len() != self.n_point() {
            return Err(MeshError::count_mismatch(
                "grid_velocity",
                self.n_point(),
                velocities.len(),
            ));
        }
        self.grid_velocity = velocities;
        Ok(())
    }

    /// 设置三个时间层的体积
    pub fn set_volumes(
        &mut self,
        volume: Vec<f64>,
        volume_n: Vec<f64>,
        volume_nm1: Vec<f64>,
    ) -> MeshResult<()> {
        let n = self.n_point();
        for (name, v) in [("volume", &volume), ("volume_n", &volume_n), ("volume_nm1", &volume_nm1)] {
            if v.len() != n {
                return Err(MeshError::count_mismatch(name, n, v.len()));
            }
        }
        self.volume = volume;
        self.volume_n = volume_n;
        self.volume_nm1 = volume_nm1;
        Ok(())
    }

    /// 推进体积时间层：n-1 ← n，n ← 当前
    pub fn shift_volume_levels(&mut self) {
        self.volume_nm1.clone_from(&self.volume_n);
        self.volume_n.clone_from(&self.volume);
    }

    /// 设置周期附加体积
    pub fn set_periodic_volumes(&mut self, periodic_volume: Vec<f64>) -> MeshResult<()> {
        if periodic_volume.len() != self.n_point() {
            return Err(MeshError::count_mismatch(
                "periodic_volume",
                self.n_point(),
                periodic_volume.len(),
            ));
        }
        self.periodic_volume = periodic_volume;
        Ok(())
    }

    /// 计算域总体积
    pub fn total_domain_volume(&self) -> f64 {
        self.volume[..self.n_point_domain].iter().sum()
    }
}

// ============================================================
// 构建器
// ============================================================

/// 网格图构建器
#[derive(Debug, Clone)]
pub struct MeshGraphBuilder {
    n_dim: usize,
    coords: Vec<DVec3>,
    volume: Vec<f64>,
    edges: Vec<[usize; 2]>,
    edge_normals: Vec<DVec3>,
    markers: Vec<Marker>,
    n_point_domain: Option<usize>,
    n_global_point_domain: Option<usize>,
    global_index: Option<Vec<usize>>,
}

impl MeshGraphBuilder {
    /// 创建构建器
    pub fn new(n_dim: usize) -> Self {
        Self {
            n_dim,
            coords: Vec::new(),
            volume: Vec::new(),
            edges: Vec::new(),
            edge_normals: Vec::new(),
            markers: Vec::new(),
            n_point_domain: None,
            n_global_point_domain: None,
            global_index: None,
        }
    }

    /// 添加节点，返回节点编号
    pub fn add_node(&mut self, coord: DVec3, volume: f64) -> usize {
        self.coords.push(coord);
        self.volume.push(volume);
        self.coords.len() - 1
    }

    /// 添加边，返回边编号
    pub fn add_edge(&mut self, i: usize, j: usize, normal: DVec3) -> usize {
        self.edges.push([i, j]);
        self.edge_normals.push(normal);
        self.edges.len() - 1
    }

    /// 添加边界标记，返回标记编号
    pub fn add_marker(&mut self, tag: impl Into<String>, vertices: Vec<MarkerVertex>) -> usize {
        self.markers.push(Marker {
            tag: tag.into(),
            vertices,
            periodic_donor: None,
        });
        self.markers.len() - 1
    }

    /// 将两个标记配对为周期边界
    pub fn pair_periodic(&mut self, a: usize, b: usize) -> &mut Self {
        if let Some(m) = self.markers.get_mut(a) {
            m.periodic_donor = Some(b);
        }
        if let Some(m) = self.markers.get_mut(b) {
            m.periodic_donor = Some(a);
        }
        self
    }

    /// 设置计算域节点数（其余节点为 halo）
    pub fn n_point_domain(&mut self, n: usize) -> &mut Self {
        self.n_point_domain = Some(n);
        self
    }

    /// 设置全局计算域节点数
    pub fn n_global_point_domain(&mut self, n: usize) -> &mut Self {
        self.n_global_point_domain = Some(n);
        self
    }

    /// 设置全局编号
    pub fn global_indices(&mut self, indices: Vec<usize>) -> &mut Self {
        self.global_index = Some(indices);
        self
    }

    /// 构建并验证网格图
    pub fn build(self) -> MeshResult<MeshGraph> {
        if self.n_dim != 2 && self.n_dim != 3 {
            return Err(MeshError::topology("build", format!("不支持的维数 {}", self.n_dim)));
        }

        let n_point = self.coords.len();
        let n_point_domain = self.n_point_domain.unwrap_or(n_point);
        if n_point_domain > n_point {
            return Err(MeshError::count_mismatch("n_point_domain", n_point, n_point_domain));
        }

        for (p, &v) in self.volume.iter().enumerate() {
            if !(v > 0.0) {
                return Err(MeshError::topology("build", format!("节点 {} 体积非正: {}", p, v)));
            }
        }

        // 边端点检查与节点-边关联
        let mut node_edges: Vec<NodeEdges> = vec![NodeEdges::new(); n_point];
        let mut seen_pairs = HashSet::with_capacity(self.edges.len());
        for (e, &[i, j]) in self.edges.iter().enumerate() {
            if i >= n_point || j >= n_point {
                return Err(MeshError::topology(
                    "build",
                    format!("边 {} 端点 ({}, {}) 越界", e, i, j),
                ));
            }
            if i == j {
                return Err(MeshError::topology("build", format!("边 {} 为自环", e)));
            }
            // 每对节点只允许一条边（非对角块按边独占）
            if !seen_pairs.insert((i.min(j), i.max(j))) {
                return Err(MeshError::topology(
                    "build",
                    format!("边 {} 重复连接节点 ({}, {})", e, i, j),
                ));
            }
            node_edges[i].push(e);
            node_edges[j].push(e);
        }

        for marker in &self.markers {
            if let Some(v) = marker.vertices.iter().find(|v| v.node >= n_point) {
                return Err(MeshError::topology(
                    "build",
                    format!("标记 {} 顶点节点 {} 越界", marker.tag, v.node),
                ));
            }
            if let Some(donor) = marker.periodic_donor {
                let partner = self.markers.get(donor).ok_or_else(|| {
                    MeshError::topology("build", format!("标记 {} 周期配对 {} 不存在", marker.tag, donor))
                })?;
                if partner.n_vertex() != marker.n_vertex() {
                    return Err(MeshError::count_mismatch(
                        "periodic_vertices",
                        marker.n_vertex(),
                        partner.n_vertex(),
                    ));
                }
            }
        }

        let global_index = match self.global_index {
            Some(g) if g.len() != n_point => {
                return Err(MeshError::count_mismatch("global_index", n_point, g.len()))
            }
            Some(g) => g,
            None => (0..n_point).collect(),
        };

        let mut global_to_local = HashMap::with_capacity(n_point_domain);
        for (local, &global) in global_index.iter().enumerate().take(n_point_domain) {
            if global_to_local.insert(global, local).is_some() {
                return Err(MeshError::topology(
                    "build",
                    format!("全局编号 {} 重复", global),
                ));
            }
        }

        let n_global_point_domain = self.n_global_point_domain.unwrap_or(n_point_domain);

        Ok(MeshGraph {
            n_dim: self.n_dim,
            n_point_domain,
            n_global_point_domain,
            volume_n: self.volume.clone(),
            volume_nm1: self.volume.clone(),
            periodic_volume: vec![0.0; n_point],
            grid_velocity: vec![DVec3::ZERO; n_point],
            coords: self.coords,
            volume: self.volume,
            global_index,
            global_to_local,
            node_edges,
            edges: self.edges,
            edge_normals: self.edge_normals,
            markers: self.markers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_node_graph() -> MeshGraph {
        let mut b = MeshGraph::builder(2);
        b.add_node(DVec3::new(0.0, 0.0, 0.0), 1.0);
        b.add_node(DVec3::new(1.0, 0.0, 0.0), 1.0);
        b.add_edge(0, 1, DVec3::X);
        b.build().unwrap()
    }

    #[test]
    fn test_build_two_nodes() {
        let g = two_node_graph();
        assert_eq!(g.n_point(), 2);
        assert_eq!(g.n_edge(), 1);
        assert_eq!(g.edge_nodes(0), (0, 1));
        assert_eq!(g.node_edges(0), &[0]);
        assert_eq!(g.node_edges(1), &[0]);
        assert!(g.is_domain(1));
        assert_eq!(g.global_to_local(1), Some(1));
    }

    #[test]
    fn test_reject_bad_edge() {
        let mut b = MeshGraph::builder(2);
        b.add_node(DVec3::ZERO, 1.0);
        b.add_edge(0, 3, DVec3::X);
        assert!(b.build().is_err());
    }

    #[test]
    fn test_reject_duplicate_edge() {
        let mut b = MeshGraph::builder(2);
        b.add_node(DVec3::ZERO, 1.0);
        b.add_node(DVec3::X, 1.0);
        b.add_edge(0, 1, DVec3::X);
        b.add_edge(1, 0, -DVec3::X);
        assert!(b.build().is_err());
    }

    #[test]
    fn test_reject_non_positive_volume() {
        let mut b = MeshGraph::builder(2);
        b.add_node(DVec3::ZERO, 0.0);
        assert!(b.build().is_err());
    }

    #[test]
    fn test_halo_donors() {
        let mut b = MeshGraph::builder(2);
        b.add_node(DVec3::ZERO, 1.0);
        b.add_node(DVec3::X, 1.0);
        b.add_node(DVec3::X, 1.0);
        b.add_edge(0, 1, DVec3::X);
        b.add_edge(0, 2, DVec3::X);
        b.n_point_domain(2).global_indices(vec![0, 1, 1]);
        let g = b.build().unwrap();
        assert!(!g.is_domain(2));
        assert_eq!(g.halo_donors(), vec![(2, 1)]);
    }

    #[test]
    fn test_periodic_pairs() {
        let mut b = MeshGraph::builder(2);
        b.add_node(DVec3::ZERO, 1.0);
        b.add_node(DVec3::X, 1.0);
        b.add_edge(0, 1, DVec3::X);
        let m0 = b.add_marker("left", vec![MarkerVertex { node: 0, normal: DVec3::X }]);
        let m1 = b.add_marker("right", vec![MarkerVertex { node: 1, normal: -DVec3::X }]);
        b.pair_periodic(m0, m1);
        let g = b.build().unwrap();
        assert_eq!(g.periodic_pairs(), vec![(0, 1)]);
        assert_eq!(g.marker_index("right"), Some(1));
    }

    #[test]
    fn test_shift_volume_levels() {
        let mut g = two_node_graph();
        g.set_volumes(vec![3.0, 3.0], vec![2.0, 2.0], vec![1.0, 1.0]).unwrap();
        g.shift_volume_levels();
        assert_eq!(g.volume_n(0), 3.0);
        assert_eq!(g.volume_nm1(0), 2.0);
        assert!(g.set_grid_velocities(vec![DVec3::ZERO]).is_err());
    }
}
