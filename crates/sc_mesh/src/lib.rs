// crates/sc_mesh/src/lib.rs

//! ScalarTransport 网格模块
//!
//! 提供边式对偶网格图，供标量输运求解器的边循环组装使用。
//!
//! # 核心类型
//!
//! - [`MeshGraph`]: 只读网格图（节点、有向边、边界标记）
//! - [`MeshHierarchy`]: 多重网格层级及粗细层子控制体关系
//! - [`EdgeColoring`]: 边分组着色及并行效率估计
//!
//! # 示例
//!
//! ```rust
//! use sc_mesh::{DualMeshGenerator, EdgeColoring};
//!
//! let mesh = DualMeshGenerator::new(8, 8, 1.0, 1.0).build().unwrap();
//! let coloring = EdgeColoring::greedy(&mesh, 4);
//! assert!(coloring.validate(&mesh).is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coloring;
pub mod error;
pub mod generation;
pub mod graph;
pub mod multigrid;

pub use coloring::{EdgeColoring, DEFAULT_GROUP_SIZE, MAX_COLORS};
pub use error::{MeshError, MeshResult};
pub use generation::DualMeshGenerator;
pub use graph::{Marker, MarkerVertex, MeshGraph, MeshGraphBuilder, NodeEdges};
pub use multigrid::{Children, MeshHierarchy, MeshLevel};
