// crates/sc_mesh/src/generation.rs

//! 网格生成模块
//!
//! 提供简单的结构化对偶网格生成工具，用于测试和验证。
//!
//! # 使用示例
//!
//! ```rust
//! use sc_mesh::generation::DualMeshGenerator;
//!
//! // 4x3 个网格间隔，5x4 个节点
//! let mesh = DualMeshGenerator::new(4, 3, 4.0, 3.0).build().unwrap();
//!
//! assert_eq!(mesh.n_point(), 20);
//! assert_eq!(mesh.n_edge(), 4 * 4 + 5 * 3);
//! assert!((mesh.total_domain_volume() - 12.0).abs() < 1e-12);
//! ```

use glam::DVec3;

use crate::error::MeshResult;
use crate::graph::{MarkerVertex, MeshGraph};

/// 矩形顶点中心对偶网格生成器
///
/// 节点位于矩形网格点上，按行主序编号；控制体为以节点为中心的矩形，
/// 边界节点的控制体被域边界截断。生成的边界标记依次为
/// `left`、`right`、`bottom`、`top`。
pub struct DualMeshGenerator {
    /// x 方向间隔数
    nx: usize,
    /// y 方向间隔数
    ny: usize,
    /// x 方向域长度
    lx: f64,
    /// y 方向域长度
    ly: f64,
    /// x 方向起点
    x0: f64,
    /// y 方向起点
    y0: f64,
    /// 是否将左右边界配对为周期边界
    periodic_x: bool,
}

impl DualMeshGenerator {
    /// 创建生成器
    ///
    /// # 参数
    ///
    /// - `nx`: x 方向间隔数
    /// - `ny`: y 方向间隔数
    /// - `lx`: x 方向域长度
    /// - `ly`: y 方向域长度
    pub fn new(nx: usize, ny: usize, lx: f64, ly: f64) -> Self {
        Self {
            nx: nx.max(1),
            ny: ny.max(1),
            lx,
            ly,
            x0: 0.0,
            y0: 0.0,
            periodic_x: false,
        }
    }

    /// 设置原点偏移
    pub fn with_origin(mut self, x0: f64, y0: f64) -> Self {
        self.x0 = x0;
        self.y0 = y0;
        self
    }

    /// 左右边界配对为周期边界
    pub fn periodic_x(mut self, enable: bool) -> Self {
        self.periodic_x = enable;
        self
    }

    /// x 方向间距
    pub fn dx(&self) -> f64 {
        self.lx / self.nx as f64
    }

    /// y 方向间距
    pub fn dy(&self) -> f64 {
        self.ly / self.ny as f64
    }

    /// 节点编号
    #[inline]
    pub fn node_index(&self, a: usize, b: usize) -> usize {
        b * (self.nx + 1) + a
    }

    /// 构建网格图
    pub fn build(&self) -> MeshResult<MeshGraph> {
        let dx = self.dx();
        let dy = self.dy();
        let (nx, ny) = (self.nx, self.ny);

        // 控制体在 x/y 方向的宽度（边界处减半）
        let wx = |a: usize| if a == 0 || a == nx { 0.5 * dx } else { dx };
        let wy = |b: usize| if b == 0 || b == ny { 0.5 * dy } else { dy };

        let mut builder = MeshGraph::builder(2);

        for b in 0..=ny {
            for a in 0..=nx {
                let coord = DVec3::new(self.x0 + a as f64 * dx, self.y0 + b as f64 * dy, 0.0);
                builder.add_node(coord, wx(a) * wy(b));
            }
        }

        // 水平边：面位于 x + dx/2，面积为控制体 y 向宽度
        for b in 0..=ny {
            for a in 0..nx {
                builder.add_edge(
                    self.node_index(a, b),
                    self.node_index(a + 1, b),
                    DVec3::new(wy(b), 0.0, 0.0),
                );
            }
        }
        // 竖直边
        for b in 0..ny {
            for a in 0..=nx {
                builder.add_edge(
                    self.node_index(a, b),
                    self.node_index(a, b + 1),
                    DVec3::new(0.0, wx(a), 0.0),
                );
            }
        }

        // 边界顶点法向指向域内
        let left = (0..=ny)
            .map(|b| MarkerVertex {
                node: self.node_index(0, b),
                normal: DVec3::new(wy(b), 0.0, 0.0),
            })
            .collect();
        let right = (0..=ny)
            .map(|b| MarkerVertex {
                node: self.node_index(nx, b),
                normal: DVec3::new(-wy(b), 0.0, 0.0),
            })
            .collect();
        let bottom = (0..=nx)
            .map(|a| MarkerVertex {
                node: self.node_index(a, 0),
                normal: DVec3::new(0.0, wx(a), 0.0),
            })
            .collect();
        let top = (0..=nx)
            .map(|a| MarkerVertex {
                node: self.node_index(a, ny),
                normal: DVec3::new(0.0, -wx(a), 0.0),
            })
            .collect();

        let m_left = builder.add_marker("left", left);
        let m_right = builder.add_marker("right", right);
        builder.add_marker("bottom", bottom);
        builder.add_marker("top", top);

        if self.periodic_x {
            builder.pair_periodic(m_left, m_right);
        }

        let mut graph = builder.build()?;
        if self.periodic_x {
            // 周期像点的附加体积为对侧控制体体积
            let mut periodic_volume = vec![0.0; graph.n_point()];
            for b in 0..=ny {
                let (l, r) = (self.node_index(0, b), self.node_index(nx, b));
                periodic_volume[l] = graph.volume(r);
                periodic_volume[r] = graph.volume(l);
            }
            graph.set_periodic_volumes(periodic_volume)?;
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 每个节点的外法向（边 + 边界）之和应为零
    #[test]
    fn test_dual_mesh_closed() {
        let mesh = DualMeshGenerator::new(3, 4, 3.0, 2.0).build().unwrap();
        let mut sum = vec![DVec3::ZERO; mesh.n_point()];
        for e in 0..mesh.n_edge() {
            let (i, j) = mesh.edge_nodes(e);
            let n = mesh.edge_normal(e);
            sum[i] += n;
            sum[j] -= n;
        }
        for marker in mesh.markers() {
            for v in &marker.vertices {
                sum[v.node] -= v.normal;
            }
        }
        for s in sum {
            assert!(s.length() < 1e-12, "未闭合: {:?}", s);
        }
    }

    #[test]
    fn test_total_volume() {
        let mesh = DualMeshGenerator::new(5, 2, 10.0, 4.0)
            .with_origin(-1.0, 2.0)
            .build()
            .unwrap();
        assert!((mesh.total_domain_volume() - 40.0).abs() < 1e-10);
        assert_eq!(mesh.coord(0), DVec3::new(-1.0, 2.0, 0.0));
    }

    #[test]
    fn test_periodic_markers() {
        let mesh = DualMeshGenerator::new(2, 2, 1.0, 1.0)
            .periodic_x(true)
            .build()
            .unwrap();
        assert_eq!(mesh.periodic_pairs(), vec![(0, 1)]);
        assert_eq!(mesh.marker(0).n_vertex(), 3);
        assert!((mesh.periodic_volume(0) - mesh.volume(2)).abs() < 1e-15);
    }
}
