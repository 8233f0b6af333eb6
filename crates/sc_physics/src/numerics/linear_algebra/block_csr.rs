// crates/sc_physics/src/numerics/linear_algebra/block_csr.rs

//! 块压缩稀疏行（Block CSR）矩阵
//!
//! 每个非零元是 `n_var × n_var` 的稠密块（行主序）。稀疏模式由网格图决定：
//! 每个节点一个对角块，每条边两个非对角块 `(i, j)` 与 `(j, i)`。
//!
//! # 格式说明
//!
//! - `row_ptr`: 行指针，长度 `n_row + 1`
//! - `col_idx`: 块列索引，每行内升序
//! - `values`: 块值，第 `k` 个块占 `values[k*bs2 .. (k+1)*bs2]`
//!
//! 同一行的所有块在 `values` 中连续存放，节点循环因此可以按行安全地切分。
//!
//! # 边的块操作
//!
//! | 操作 | ii | ij | ji | jj |
//! |------|----|----|----|----|
//! | `update_blocks` | +Ji | +Jj | −Ji | −Jj |
//! | `update_blocks_sub` | −Ji | −Jj | +Ji | +Jj |
//! | `set_blocks` | | =Jj | =−Ji | |
//! | `update_blocks_sub_edge` | | −Jj | +Ji | |

use rayon::prelude::*;
use sc_foundation::{ScError, ScResult};
use sc_mesh::MeshGraph;

use crate::shared::SharedSlice;

// =============================================================================
// 块运算辅助
// =============================================================================

#[inline]
fn block_add(dst: &mut [f64], src: &[f64]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}

#[inline]
fn block_sub(dst: &mut [f64], src: &[f64]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d -= s;
    }
}

#[inline]
fn block_set_neg(dst: &mut [f64], src: &[f64]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = -s;
    }
}

#[inline]
fn block_add_diag(dst: &mut [f64], n_var: usize, val: f64) {
    for v in 0..n_var {
        dst[v * n_var + v] += val;
    }
}

// =============================================================================
// 稀疏模式
// =============================================================================

/// 块稀疏模式（与值分离）
#[derive(Debug, Clone, PartialEq)]
pub struct BlockPattern {
    n_row: usize,
    n_row_domain: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    /// 每行对角块位置
    diag: Vec<usize>,
    /// 每个块的转置块位置
    transpose: Vec<usize>,
    /// 每条边的 (i, j) 块位置
    edge_ij: Vec<usize>,
    /// 每条边的 (j, i) 块位置
    edge_ji: Vec<usize>,
}

impl BlockPattern {
    /// 由网格图构建
    pub fn from_mesh(graph: &MeshGraph) -> Self {
        let n_row = graph.n_point();
        let mut row_ptr = Vec::with_capacity(n_row + 1);
        let mut col_idx = Vec::new();
        row_ptr.push(0);

        for i in 0..n_row {
            let mut cols: Vec<usize> = graph
                .node_edges(i)
                .iter()
                .map(|&e| {
                    let (a, b) = graph.edge_nodes(e);
                    if a == i {
                        b
                    } else {
                        a
                    }
                })
                .collect();
            cols.push(i);
            cols.sort_unstable();
            cols.dedup();
            col_idx.extend_from_slice(&cols);
            row_ptr.push(col_idx.len());
        }

        let mut pattern = Self {
            n_row,
            n_row_domain: graph.n_point_domain(),
            row_ptr,
            col_idx,
            diag: Vec::new(),
            transpose: Vec::new(),
            edge_ij: Vec::new(),
            edge_ji: Vec::new(),
        };

        // 模式对称，以下查找必定成功
        pattern.diag = (0..n_row)
            .map(|i| pattern.find_index(i, i).unwrap_or(usize::MAX))
            .collect();
        pattern.transpose = (0..n_row)
            .flat_map(|i| {
                let p = &pattern;
                (p.row_ptr[i]..p.row_ptr[i + 1])
                    .map(move |k| p.find_index(p.col_idx[k], i).unwrap_or(usize::MAX))
            })
            .collect();
        let (edge_ij, edge_ji) = graph
            .edges()
            .iter()
            .map(|&[i, j]| {
                (
                    pattern.find_index(i, j).unwrap_or(usize::MAX),
                    pattern.find_index(j, i).unwrap_or(usize::MAX),
                )
            })
            .unzip();
        pattern.edge_ij = edge_ij;
        pattern.edge_ji = edge_ji;
        pattern
    }

    /// 行数（含 halo）
    #[inline]
    pub fn n_row(&self) -> usize {
        self.n_row
    }

    /// 计算域行数
    #[inline]
    pub fn n_row_domain(&self) -> usize {
        self.n_row_domain
    }

    /// 非零块数
    #[inline]
    pub fn nnz_blocks(&self) -> usize {
        self.col_idx.len()
    }

    /// 行指针
    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// 块列索引
    #[inline]
    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    /// 对角块位置
    #[inline]
    pub fn diag(&self, row: usize) -> usize {
        self.diag[row]
    }

    /// 边的 (i, j) 与 (j, i) 块位置
    #[inline]
    pub fn edge_blocks(&self, edge: usize) -> (usize, usize) {
        (self.edge_ij[edge], self.edge_ji[edge])
    }

    /// 查找块 (row, col) 的位置（二分查找）
    pub fn find_index(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.n_row {
            return None;
        }
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        self.col_idx[start..end]
            .binary_search(&col)
            .ok()
            .map(|offset| start + offset)
    }
}

// =============================================================================
// 行视图
// =============================================================================

/// 单行的可变视图（节点并行循环使用）
pub struct RowMut<'a> {
    values: &'a mut [f64],
    diag_offset: usize,
    n_var: usize,
}

impl RowMut<'_> {
    /// 对角块
    #[inline]
    pub fn diag_block_mut(&mut self) -> &mut [f64] {
        let bs2 = self.n_var * self.n_var;
        &mut self.values[self.diag_offset * bs2..(self.diag_offset + 1) * bs2]
    }

    /// 对角块加 `val * I`
    #[inline]
    pub fn add_val_to_diag(&mut self, val: f64) {
        let n_var = self.n_var;
        block_add_diag(self.diag_block_mut(), n_var, val);
    }

    /// 对角块置为 `val * I`
    pub fn set_val_to_diag(&mut self, val: f64) {
        let n_var = self.n_var;
        let block = self.diag_block_mut();
        block.fill(0.0);
        block_add_diag(block, n_var, val);
    }

    /// 冻结本行：对角块为单位阵，非对角块清零
    pub fn freeze(&mut self) {
        self.values.fill(0.0);
        self.set_val_to_diag(1.0);
    }
}

// =============================================================================
// 矩阵
// =============================================================================

/// 块 CSR 矩阵
#[derive(Debug, Clone, PartialEq)]
pub struct BlockCsrMatrix {
    pattern: BlockPattern,
    n_var: usize,
    values: Vec<f64>,
}

impl BlockCsrMatrix {
    /// 由网格图创建零矩阵
    pub fn from_mesh(graph: &MeshGraph, n_var: usize) -> Self {
        let pattern = BlockPattern::from_mesh(graph);
        let values = vec![0.0; pattern.nnz_blocks() * n_var * n_var];
        Self {
            pattern,
            n_var,
            values,
        }
    }

    /// 稀疏模式
    #[inline]
    pub fn pattern(&self) -> &BlockPattern {
        &self.pattern
    }

    /// 块尺寸
    #[inline]
    pub fn n_var(&self) -> usize {
        self.n_var
    }

    /// 行数（含 halo）
    #[inline]
    pub fn n_row(&self) -> usize {
        self.pattern.n_row
    }

    /// 计算域行数
    #[inline]
    pub fn n_row_domain(&self) -> usize {
        self.pattern.n_row_domain
    }

    /// 所有块值
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    fn bs2(&self) -> usize {
        self.n_var * self.n_var
    }

    /// 全部清零
    pub fn set_zero(&mut self) {
        self.values.par_iter_mut().for_each(|v| *v = 0.0);
    }

    /// 块 (row, col)；不在模式中返回 `None`
    pub fn block(&self, row: usize, col: usize) -> Option<&[f64]> {
        let bs2 = self.bs2();
        self.pattern
            .find_index(row, col)
            .map(|k| &self.values[k * bs2..(k + 1) * bs2])
    }

    /// 对角块
    #[inline]
    pub fn diag_block(&self, row: usize) -> &[f64] {
        let bs2 = self.bs2();
        let k = self.pattern.diag[row];
        &self.values[k * bs2..(k + 1) * bs2]
    }

    fn block_at_mut(&mut self, k: usize) -> &mut [f64] {
        let bs2 = self.bs2();
        &mut self.values[k * bs2..(k + 1) * bs2]
    }

    /// 块 (row, col) 加上 `block`
    pub fn add_block(&mut self, row: usize, col: usize, block: &[f64]) -> ScResult<()> {
        ScError::check_size("jacobian_block", self.bs2(), block.len())?;
        let k = self.pattern.find_index(row, col).ok_or_else(|| {
            ScError::invalid_input(format!("块 ({}, {}) 不在稀疏模式中", row, col))
        })?;
        block_add(self.block_at_mut(k), block);
        Ok(())
    }

    /// 对角块加上 `block`
    pub fn add_to_diag_block(&mut self, row: usize, block: &[f64]) {
        let k = self.pattern.diag[row];
        block_add(self.block_at_mut(k), block);
    }

    /// 对角块加 `val * I`
    pub fn add_val_to_diag(&mut self, row: usize, val: f64) {
        let n_var = self.n_var;
        let k = self.pattern.diag[row];
        block_add_diag(self.block_at_mut(k), n_var, val);
    }

    /// 对角块置为 `val * I`
    pub fn set_val_to_diag(&mut self, row: usize, val: f64) {
        let n_var = self.n_var;
        let k = self.pattern.diag[row];
        let block = self.block_at_mut(k);
        block.fill(0.0);
        block_add_diag(block, n_var, val);
    }

    /// 边贡献：直接模式（对流）
    pub fn update_blocks(&mut self, edge: usize, i: usize, j: usize, block_i: &[f64], block_j: &[f64]) {
        let writer = self.writer();
        // SAFETY: 独占借用，不存在其他访问者
        unsafe { writer.update_blocks(edge, i, j, block_i, block_j) }
    }

    /// 边贡献：直接模式（粘性，符号相反）
    pub fn update_blocks_sub(
        &mut self,
        edge: usize,
        i: usize,
        j: usize,
        block_i: &[f64],
        block_j: &[f64],
    ) {
        let writer = self.writer();
        // SAFETY: 独占借用
        unsafe { writer.update_blocks_sub(edge, i, j, block_i, block_j) }
    }

    /// 边贡献：归约模式，只写非对角块
    pub fn set_blocks(&mut self, edge: usize, block_i: &[f64], block_j: &[f64]) {
        let writer = self.writer();
        // SAFETY: 独占借用
        unsafe { writer.set_blocks(edge, block_i, block_j) }
    }

    /// 边贡献：归约模式的粘性部分
    pub fn update_blocks_sub_edge(&mut self, edge: usize, block_i: &[f64], block_j: &[f64]) {
        let writer = self.writer();
        // SAFETY: 独占借用
        unsafe { writer.update_blocks_sub_edge(edge, block_i, block_j) }
    }

    /// 对角块置为所在列非对角块之和的相反数 `A_ii = −Σ_{k≠i} A_ki`
    pub fn set_diagonal_as_column_sum(&mut self) {
        let bs2 = self.bs2();
        let pattern = &self.pattern;
        let values = &self.values;

        let sums: Vec<f64> = (0..pattern.n_row)
            .into_par_iter()
            .flat_map_iter(|i| {
                let mut sum = vec![0.0; bs2];
                for k in pattern.row_ptr[i]..pattern.row_ptr[i + 1] {
                    if pattern.col_idx[k] == i {
                        continue;
                    }
                    // 行 i 的第 k 个块对应列 i 中的块 (col, i)
                    let t = pattern.transpose[k];
                    block_sub(&mut sum, &values[t * bs2..(t + 1) * bs2]);
                }
                sum
            })
            .collect();

        let diag = &self.pattern.diag;
        let values_shared = SharedSlice::new(&mut self.values);
        sums.par_chunks(bs2).enumerate().for_each(|(i, sum)| {
            // SAFETY: 每行对角块位置互不相同
            let block = unsafe { values_shared.slice_mut(diag[i] * bs2, bs2) };
            block.copy_from_slice(sum);
        });
    }

    /// 冻结一行：对角为单位阵，非对角清零
    #[cfg(test)]
    pub(crate) fn freeze_row(&mut self, row: usize) {
        let bs2 = self.bs2();
        let start = self.pattern.row_ptr[row] * bs2;
        let end = self.pattern.row_ptr[row + 1] * bs2;
        self.values[start..end].fill(0.0);
        self.set_val_to_diag(row, 1.0);
    }

    /// 前 `n_rows` 行的可变视图（按行切分，互不重叠）
    pub fn rows_mut(&mut self, n_rows: usize) -> Vec<RowMut<'_>> {
        let bs2 = self.bs2();
        let n_var = self.n_var;
        let n_rows = n_rows.min(self.pattern.n_row);
        let mut rows = Vec::with_capacity(n_rows);
        let mut rest: &mut [f64] = &mut self.values;
        for i in 0..n_rows {
            let len = (self.pattern.row_ptr[i + 1] - self.pattern.row_ptr[i]) * bs2;
            let (row, tail) = std::mem::take(&mut rest).split_at_mut(len);
            rows.push(RowMut {
                values: row,
                diag_offset: self.pattern.diag[i] - self.pattern.row_ptr[i],
                n_var,
            });
            rest = tail;
        }
        rows
    }

    /// 矩阵-向量乘法 `y = A x`，只计算计算域行，halo 行置零
    pub fn matvec(&self, x: &[f64], y: &mut [f64]) {
        let n_var = self.n_var;
        let bs2 = self.bs2();
        let n_domain = self.pattern.n_row_domain;
        debug_assert_eq!(x.len(), self.pattern.n_row * n_var);
        debug_assert_eq!(y.len(), self.pattern.n_row * n_var);

        y.par_chunks_mut(n_var).enumerate().for_each(|(i, yi)| {
            yi.fill(0.0);
            if i >= n_domain {
                return;
            }
            for k in self.pattern.row_ptr[i]..self.pattern.row_ptr[i + 1] {
                let col = self.pattern.col_idx[k];
                let block = &self.values[k * bs2..(k + 1) * bs2];
                let xj = &x[col * n_var..(col + 1) * n_var];
                for (r, out) in yi.iter_mut().enumerate() {
                    let row = &block[r * n_var..(r + 1) * n_var];
                    *out += row.iter().zip(xj).map(|(&a, &b)| a * b).sum::<f64>();
                }
            }
        });
    }

    /// 并行写入器
    pub(crate) fn writer(&mut self) -> JacobianWriter<'_> {
        JacobianWriter {
            pattern: &self.pattern,
            n_var: self.n_var,
            values: SharedSlice::new(&mut self.values),
        }
    }
}

// =============================================================================
// 并行写入器
// =============================================================================

/// 边循环中多线程共享的 Jacobian 写入器
///
/// 块位置的互斥性来自网格层：`MeshGraphBuilder::build` 拒绝重复边，
/// 边 `e` 的两个非对角块 `(i, j)`、`(j, i)` 只由该边写入；对角块的
/// 互斥由 `EdgeColoring::validate`（同一颜色的不同分组不共享节点）保证。
pub(crate) struct JacobianWriter<'a> {
    pattern: &'a BlockPattern,
    n_var: usize,
    values: SharedSlice<'a, f64>,
}

impl JacobianWriter<'_> {
    /// # Safety
    ///
    /// 返回引用存活期间，块 `k` 不得被其他引用访问。
    #[inline]
    #[allow(clippy::mut_from_ref)]
    unsafe fn block(&self, k: usize) -> &mut [f64] {
        let bs2 = self.n_var * self.n_var;
        unsafe { self.values.slice_mut(k * bs2, bs2) }
    }

    /// 直接模式对流贡献
    ///
    /// # Safety
    ///
    /// 调用期间没有其他线程访问行 `i` 与行 `j`：调用方必须在通过
    /// `EdgeColoring::validate` 的着色下，按完整分组分配任务。
    pub unsafe fn update_blocks(&self, edge: usize, i: usize, j: usize, block_i: &[f64], block_j: &[f64]) {
        let (ij, ji) = self.pattern.edge_blocks(edge);
        unsafe {
            block_add(self.block(self.pattern.diag[i]), block_i);
            block_add(self.block(ij), block_j);
            block_sub(self.block(ji), block_i);
            block_sub(self.block(self.pattern.diag[j]), block_j);
        }
    }

    /// 直接模式粘性贡献
    ///
    /// # Safety
    ///
    /// 同 [`Self::update_blocks`]。
    pub unsafe fn update_blocks_sub(
        &self,
        edge: usize,
        i: usize,
        j: usize,
        block_i: &[f64],
        block_j: &[f64],
    ) {
        let (ij, ji) = self.pattern.edge_blocks(edge);
        unsafe {
            block_sub(self.block(self.pattern.diag[i]), block_i);
            block_sub(self.block(ij), block_j);
            block_add(self.block(ji), block_i);
            block_add(self.block(self.pattern.diag[j]), block_j);
        }
    }

    /// 归约模式对流贡献：`A_ij = Jj`，`A_ji = −Ji`
    ///
    /// # Safety
    ///
    /// 调用期间没有其他线程访问边 `edge` 的两个非对角块，即每条边只由
    /// 一个任务处理（重复边已在网格构建时拒绝）。
    pub unsafe fn set_blocks(&self, edge: usize, block_i: &[f64], block_j: &[f64]) {
        let (ij, ji) = self.pattern.edge_blocks(edge);
        unsafe {
            self.block(ij).copy_from_slice(block_j);
            block_set_neg(self.block(ji), block_i);
        }
    }

    /// 归约模式粘性贡献：`A_ij −= Jj`，`A_ji += Ji`
    ///
    /// # Safety
    ///
    /// 同 [`Self::set_blocks`]。
    pub unsafe fn update_blocks_sub_edge(&self, edge: usize, block_i: &[f64], block_j: &[f64]) {
        let (ij, ji) = self.pattern.edge_blocks(edge);
        unsafe {
            block_sub(self.block(ij), block_j);
            block_add(self.block(ji), block_i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use sc_mesh::generation::DualMeshGenerator;

    fn line_mesh() -> MeshGraph {
        // 0 - 1 - 2
        let mut b = MeshGraph::builder(2);
        for k in 0..3 {
            b.add_node(DVec3::new(k as f64, 0.0, 0.0), 1.0);
        }
        b.add_edge(0, 1, DVec3::X);
        b.add_edge(1, 2, DVec3::X);
        b.build().unwrap()
    }

    #[test]
    fn test_pattern_from_mesh() {
        let m = BlockCsrMatrix::from_mesh(&line_mesh(), 2);
        assert_eq!(m.pattern().row_ptr(), &[0, 2, 5, 7]);
        assert_eq!(m.pattern().col_idx(), &[0, 1, 0, 1, 2, 1, 2]);
        assert_eq!(m.pattern().diag(1), 3);
        assert_eq!(m.pattern().edge_blocks(1), (4, 5));
        assert_eq!(m.values().len(), 7 * 4);
    }

    #[test]
    fn test_update_blocks_signs() {
        let mut m = BlockCsrMatrix::from_mesh(&line_mesh(), 1);
        m.update_blocks(0, 0, 1, &[2.0], &[-1.0]);
        assert_eq!(m.block(0, 0).unwrap(), &[2.0]);
        assert_eq!(m.block(0, 1).unwrap(), &[-1.0]);
        assert_eq!(m.block(1, 0).unwrap(), &[-2.0]);
        assert_eq!(m.block(1, 1).unwrap(), &[1.0]);

        m.update_blocks_sub(0, 0, 1, &[2.0], &[-1.0]);
        assert!(m.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_column_sum_matches_direct() {
        let mesh = DualMeshGenerator::new(2, 2, 1.0, 1.0).build().unwrap();
        let mut direct = BlockCsrMatrix::from_mesh(&mesh, 2);
        let mut reducer = direct.clone();
        for e in 0..mesh.n_edge() {
            let (i, j) = mesh.edge_nodes(e);
            let ji = [1.0 + e as f64, 0.5, -0.25, 2.0];
            let jj = [-0.5, 0.1 * e as f64, 0.3, -1.0];
            direct.update_blocks(e, i, j, &ji, &jj);
            reducer.set_blocks(e, &ji, &jj);
            let vi = [0.2, 0.0, 0.0, 0.2];
            let vj = [-0.2, 0.0, 0.0, -0.2];
            direct.update_blocks_sub(e, i, j, &vi, &vj);
            reducer.update_blocks_sub_edge(e, &vi, &vj);
        }
        reducer.set_diagonal_as_column_sum();
        for (a, b) in direct.values().iter().zip(reducer.values()) {
            assert!((a - b).abs() < 1e-13, "{} != {}", a, b);
        }
    }

    #[test]
    fn test_matvec_skips_halo_rows() {
        let mut b = MeshGraph::builder(2);
        b.add_node(DVec3::ZERO, 1.0);
        b.add_node(DVec3::X, 1.0);
        b.add_edge(0, 1, DVec3::X);
        b.n_point_domain(1);
        let mesh = b.build().unwrap();

        let mut m = BlockCsrMatrix::from_mesh(&mesh, 1);
        m.add_val_to_diag(0, 2.0);
        m.add_block(0, 1, &[1.0]).unwrap();
        m.add_val_to_diag(1, 5.0);
        let mut y = vec![9.0; 2];
        m.matvec(&[1.0, 3.0], &mut y);
        assert_eq!(y, vec![5.0, 0.0]);
    }

    #[test]
    fn test_freeze_row_and_rows_mut() {
        let mut m = BlockCsrMatrix::from_mesh(&line_mesh(), 1);
        m.update_blocks(0, 0, 1, &[2.0], &[-1.0]);
        m.update_blocks(1, 1, 2, &[3.0], &[-4.0]);
        m.freeze_row(1);
        assert_eq!(m.block(1, 0).unwrap(), &[0.0]);
        assert_eq!(m.block(1, 1).unwrap(), &[1.0]);
        assert_eq!(m.block(1, 2).unwrap(), &[0.0]);
        assert_eq!(m.block(0, 1).unwrap(), &[-1.0]);

        let mut rows = m.rows_mut(3);
        rows[2].add_val_to_diag(10.0);
        rows[0].set_val_to_diag(7.0);
        drop(rows);
        assert_eq!(m.diag_block(2), &[14.0]);
        assert_eq!(m.diag_block(0), &[7.0]);
    }

    #[test]
    fn test_add_block_outside_pattern() {
        let mut m = BlockCsrMatrix::from_mesh(&line_mesh(), 1);
        assert!(m.add_block(0, 2, &[1.0]).is_err());
        assert!(m.add_block(0, 1, &[1.0, 2.0]).is_err());
    }
}
