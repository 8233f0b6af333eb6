// crates/sc_physics/src/boundary/inlet.rs

//! 入口剖面表
//!
//! 所有标记的顶点记录连续存放在一块定长数组中，按 (标记, 顶点) 索引：
//! `values[(offset[marker] + vertex) * n_var + var]`。

use sc_foundation::{ScError, ScResult};
use sc_mesh::MeshGraph;

/// 入口剖面表
#[derive(Debug, Clone, PartialEq)]
pub struct InletProfiles {
    n_var: usize,
    /// 每个标记的首个顶点记录位置（长度 n_marker + 1）
    offsets: Vec<usize>,
    values: Vec<f64>,
}

impl InletProfiles {
    /// 按网格标记分配，初值为 `initial`
    pub fn new(mesh: &MeshGraph, initial: &[f64]) -> Self {
        let n_var = initial.len();
        let mut offsets = Vec::with_capacity(mesh.n_marker() + 1);
        offsets.push(0);
        for marker in mesh.markers() {
            offsets.push(offsets[offsets.len() - 1] + marker.n_vertex());
        }
        let n_record = offsets[offsets.len() - 1];
        let values = initial.iter().copied().cycle().take(n_record * n_var).collect();
        Self {
            n_var,
            offsets,
            values,
        }
    }

    /// 变量个数
    #[inline]
    pub fn n_var(&self) -> usize {
        self.n_var
    }

    /// 标记数
    #[inline]
    pub fn n_marker(&self) -> usize {
        self.offsets.len() - 1
    }

    /// 标记的顶点数
    #[inline]
    pub fn n_vertex(&self, marker: usize) -> usize {
        self.offsets[marker + 1] - self.offsets[marker]
    }

    fn record_index(&self, marker: usize, vertex: usize) -> ScResult<usize> {
        ScError::check_index("inlet_marker", marker, self.n_marker())?;
        ScError::check_index("inlet_vertex", vertex, self.n_vertex(marker))?;
        Ok(self.offsets[marker] + vertex)
    }

    /// 顶点记录（越界时 panic，组装热路径使用）
    #[inline]
    pub fn get(&self, marker: usize, vertex: usize) -> &[f64] {
        let k = self.offsets[marker] + vertex;
        &self.values[k * self.n_var..(k + 1) * self.n_var]
    }

    /// 顶点记录（带越界检查）
    pub fn try_get(&self, marker: usize, vertex: usize) -> ScResult<&[f64]> {
        let k = self.record_index(marker, vertex)?;
        Ok(&self.values[k * self.n_var..(k + 1) * self.n_var])
    }

    /// 写入顶点记录
    pub fn set(&mut self, marker: usize, vertex: usize, values: &[f64]) -> ScResult<()> {
        ScError::check_size("inlet_values", self.n_var, values.len())?;
        let k = self.record_index(marker, vertex)?;
        self.values[k * self.n_var..(k + 1) * self.n_var].copy_from_slice(values);
        Ok(())
    }

    /// 标记的所有顶点设为同一状态
    pub fn set_uniform(&mut self, marker: usize, values: &[f64]) -> ScResult<()> {
        ScError::check_size("inlet_values", self.n_var, values.len())?;
        ScError::check_index("inlet_marker", marker, self.n_marker())?;
        let start = self.offsets[marker] * self.n_var;
        let end = self.offsets[marker + 1] * self.n_var;
        for record in self.values[start..end].chunks_mut(self.n_var) {
            record.copy_from_slice(values);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_mesh::generation::DualMeshGenerator;

    #[test]
    fn test_layout_and_access() {
        let mesh = DualMeshGenerator::new(2, 3, 1.0, 1.0).build().unwrap();
        let mut inlet = InletProfiles::new(&mesh, &[0.1, 0.2]);
        assert_eq!(inlet.n_marker(), 4);
        assert_eq!(inlet.n_vertex(0), 4);
        assert_eq!(inlet.n_vertex(2), 3);
        assert_eq!(inlet.get(3, 2), &[0.1, 0.2]);

        inlet.set(1, 3, &[5.0, 6.0]).unwrap();
        assert_eq!(inlet.get(1, 3), &[5.0, 6.0]);
        assert_eq!(inlet.get(2, 0), &[0.1, 0.2]);

        inlet.set_uniform(2, &[7.0, 8.0]).unwrap();
        assert_eq!(inlet.get(2, 2), &[7.0, 8.0]);
        assert_eq!(inlet.get(1, 3), &[5.0, 6.0]);
    }

    #[test]
    fn test_bounds_checked() {
        let mesh = DualMeshGenerator::new(1, 1, 1.0, 1.0).build().unwrap();
        let mut inlet = InletProfiles::new(&mesh, &[0.0]);
        assert!(inlet.set(4, 0, &[1.0]).is_err());
        assert!(inlet.set(0, 2, &[1.0]).is_err());
        assert!(inlet.set(0, 0, &[1.0, 2.0]).is_err());
        assert!(inlet.try_get(0, 1).is_ok());
    }
}
