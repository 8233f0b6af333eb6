// crates/sc_physics/src/numerics/linear_algebra/preconditioner.rs

//! 预条件器
//!
//! - [`IdentityPreconditioner`]: 恒等（无预条件）
//! - [`BlockJacobiPreconditioner`]: 块 Jacobi，逐行求对角块的逆
//!
//! 预条件器只作用于计算域行，halo 行输出为零。

use rayon::prelude::*;

use super::block_csr::BlockCsrMatrix;

/// 奇异判定阈值
const PIVOT_TOL: f64 = 1e-300;

/// 预条件器接口
pub trait Preconditioner: Send + Sync {
    /// z = M⁻¹ r
    fn apply(&self, r: &[f64], z: &mut [f64]);

    /// 名称
    fn name(&self) -> &'static str;
}

/// 恒等预条件器
#[derive(Debug, Clone, Copy)]
pub struct IdentityPreconditioner {
    n_domain_dofs: usize,
}

impl IdentityPreconditioner {
    /// 按矩阵的计算域自由度创建
    pub fn new(matrix: &BlockCsrMatrix) -> Self {
        Self {
            n_domain_dofs: matrix.n_row_domain() * matrix.n_var(),
        }
    }
}

impl Preconditioner for IdentityPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        let n = self.n_domain_dofs.min(z.len());
        z[..n].copy_from_slice(&r[..n]);
        z[n..].fill(0.0);
    }

    fn name(&self) -> &'static str {
        "Identity"
    }
}

/// 块 Jacobi 预条件器
///
/// 奇异或非有限的对角块退化为单位阵。
#[derive(Debug, Clone)]
pub struct BlockJacobiPreconditioner {
    n_var: usize,
    n_row_domain: usize,
    /// 每个计算域行对角块的逆（行主序）
    inv_diag: Vec<f64>,
}

impl BlockJacobiPreconditioner {
    /// 从矩阵构建
    pub fn from_matrix(matrix: &BlockCsrMatrix) -> Self {
        let n_var = matrix.n_var();
        let bs2 = n_var * n_var;
        let n_row_domain = matrix.n_row_domain();
        let mut inv_diag = vec![0.0; n_row_domain * bs2];

        inv_diag
            .par_chunks_mut(bs2)
            .enumerate()
            .for_each(|(i, inv)| {
                if !invert_block(matrix.diag_block(i), n_var, inv) {
                    inv.fill(0.0);
                    for v in 0..n_var {
                        inv[v * n_var + v] = 1.0;
                    }
                }
            });

        Self {
            n_var,
            n_row_domain,
            inv_diag,
        }
    }
}

impl Preconditioner for BlockJacobiPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        let n_var = self.n_var;
        let bs2 = n_var * n_var;
        let n_row_domain = self.n_row_domain;
        z.par_chunks_mut(n_var).enumerate().for_each(|(i, zi)| {
            if i >= n_row_domain {
                zi.fill(0.0);
                return;
            }
            let inv = &self.inv_diag[i * bs2..(i + 1) * bs2];
            let ri = &r[i * n_var..(i + 1) * n_var];
            for (row, out) in zi.iter_mut().enumerate() {
                *out = inv[row * n_var..(row + 1) * n_var]
                    .iter()
                    .zip(ri)
                    .map(|(&a, &b)| a * b)
                    .sum();
            }
        });
    }

    fn name(&self) -> &'static str {
        "BlockJacobi"
    }
}

/// Gauss-Jordan 列主元求逆，奇异时返回 false
fn invert_block(block: &[f64], n: usize, inv: &mut [f64]) -> bool {
    let mut a = block.to_vec();
    inv.fill(0.0);
    for v in 0..n {
        inv[v * n + v] = 1.0;
    }

    for col in 0..n {
        // 选主元
        let mut pivot_row = col;
        let mut pivot_abs = a[col * n + col].abs();
        for row in (col + 1)..n {
            let v = a[row * n + col].abs();
            if v > pivot_abs {
                pivot_abs = v;
                pivot_row = row;
            }
        }
        if !pivot_abs.is_finite() || pivot_abs < PIVOT_TOL {
            return false;
        }
        if pivot_row != col {
            for k in 0..n {
                a.swap(col * n + k, pivot_row * n + k);
                inv.swap(col * n + k, pivot_row * n + k);
            }
        }

        let pivot = a[col * n + col];
        for k in 0..n {
            a[col * n + k] /= pivot;
            inv[col * n + k] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row * n + col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                a[row * n + k] -= factor * a[col * n + k];
                inv[row * n + k] -= factor * inv[col * n + k];
            }
        }
    }
    inv.iter().all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use sc_mesh::MeshGraph;

    #[test]
    fn test_invert_block_2x2() {
        let block = [4.0, 1.0, 2.0, 3.0];
        let mut inv = [0.0; 4];
        assert!(invert_block(&block, 2, &mut inv));
        // det = 10
        let expected = [0.3, -0.1, -0.2, 0.4];
        for (a, b) in inv.iter().zip(expected) {
            assert!((a - b).abs() < 1e-14);
        }
    }

    #[test]
    fn test_invert_needs_pivoting() {
        let block = [0.0, 1.0, 1.0, 0.0];
        let mut inv = [0.0; 4];
        assert!(invert_block(&block, 2, &mut inv));
        assert_eq!(inv, [0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_singular_block_falls_back_to_identity() {
        let mut b = MeshGraph::builder(2);
        b.add_node(DVec3::ZERO, 1.0);
        b.add_node(DVec3::X, 1.0);
        b.add_edge(0, 1, DVec3::X);
        let mesh = b.build().unwrap();

        let mut m = BlockCsrMatrix::from_mesh(&mesh, 1);
        m.add_val_to_diag(0, 4.0);
        // 行 1 对角为零
        let precond = BlockJacobiPreconditioner::from_matrix(&m);
        let mut z = vec![0.0; 2];
        precond.apply(&[2.0, 3.0], &mut z);
        assert_eq!(z, vec![0.5, 3.0]);
    }

    #[test]
    fn test_identity_zeroes_halo() {
        let mut b = MeshGraph::builder(2);
        b.add_node(DVec3::ZERO, 1.0);
        b.add_node(DVec3::X, 1.0);
        b.add_edge(0, 1, DVec3::X);
        b.n_point_domain(1);
        let mesh = b.build().unwrap();
        let m = BlockCsrMatrix::from_mesh(&mesh, 2);

        let precond = IdentityPreconditioner::new(&m);
        let mut z = vec![9.0; 4];
        precond.apply(&[1.0, 2.0, 3.0, 4.0], &mut z);
        assert_eq!(z, vec![1.0, 2.0, 0.0, 0.0]);
    }
}
