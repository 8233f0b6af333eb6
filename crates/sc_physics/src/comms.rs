// crates/sc_physics/src/comms.rs

//! 两阶段 halo/周期交换
//!
//! [`Communicator::initiate`] 打包发送数据并返回 [`PendingExchange`] 请求对象，
//! [`Communicator::complete`] 消费该对象并把结果写回目标数组。请求对象
//! 带 `#[must_use]`，未完成的交换在编译期即可发现。
//!
//! 交换种类：
//!
//! | 种类 | 数据 | 作用 |
//! |------|------|------|
//! | `Solution` | 解 | 拥有者 → halo 复制 |
//! | `PeriodicResidual` | 残差（及 Jacobian 对角块） | 周期像点两侧求和 |
//! | `PeriodicImplicit` | 解 | 周期像点两侧取平均 |

use sc_mesh::MeshGraph;

use crate::error::{ScalarResult, SolverError};
use crate::numerics::linear_algebra::BlockCsrMatrix;

/// 交换种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    /// halo 节点解同步
    Solution,
    /// 周期标记对的残差累加
    PeriodicResidual {
        /// 标记对 `(marker, donor)`
        pair: (usize, usize),
    },
    /// 周期标记对的解平均
    PeriodicImplicit {
        /// 标记对 `(marker, donor)`
        pair: (usize, usize),
    },
}

/// 进行中的交换请求
#[must_use = "交换请求必须交给 Communicator::complete"]
#[derive(Debug)]
pub struct PendingExchange {
    kind: ExchangeKind,
    n_var: usize,
    /// 目标节点
    targets: Vec<usize>,
    /// 每个目标节点收到的值（`targets.len() * n_var`）
    buffer: Vec<f64>,
}

impl PendingExchange {
    /// 交换种类
    #[inline]
    pub fn kind(&self) -> ExchangeKind {
        self.kind
    }

    /// 目标节点数
    #[inline]
    pub fn n_targets(&self) -> usize {
        self.targets.len()
    }
}

/// 两阶段通信接口
pub trait Communicator: Send {
    /// 打包并发起交换
    fn initiate(
        &mut self,
        mesh: &MeshGraph,
        kind: ExchangeKind,
        values: &[f64],
        n_var: usize,
    ) -> ScalarResult<PendingExchange>;

    /// 等待交换完成并写回
    ///
    /// `jacobian` 只在隐式周期残差交换中使用：两个像点的对角块互相累加，
    /// 非对角耦合不交换。每个像点保留各自一侧的邻居耦合，线性解得到的
    /// 两份增量在 [`ExchangeKind::PeriodicImplicit`] 中取平均后一致。
    fn complete(
        &mut self,
        mesh: &MeshGraph,
        request: PendingExchange,
        values: &mut [f64],
        jacobian: Option<&mut BlockCsrMatrix>,
    ) -> ScalarResult<()>;
}

// ============================================================
// 单进程实现
// ============================================================

/// 单进程通信
///
/// halo 节点的拥有者由全局编号在本地确定；周期像点为配对标记中
/// 下标相同的顶点。
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComms;

impl SerialComms {
    /// 创建
    pub fn new() -> Self {
        Self
    }
}

/// 周期标记对的像点 `(a, b)`
fn periodic_images(mesh: &MeshGraph, (ma, mb): (usize, usize)) -> ScalarResult<Vec<(usize, usize)>> {
    if ma >= mesh.n_marker() || mb >= mesh.n_marker() {
        return Err(SolverError::exchange(format!("周期标记对 ({}, {}) 越界", ma, mb)));
    }
    let a = &mesh.marker(ma).vertices;
    let b = &mesh.marker(mb).vertices;
    if a.len() != b.len() {
        return Err(SolverError::exchange(format!(
            "周期标记 {} 与 {} 顶点数不同: {} / {}",
            ma,
            mb,
            a.len(),
            b.len()
        )));
    }
    Ok(a.iter().zip(b).map(|(va, vb)| (va.node, vb.node)).collect())
}

impl Communicator for SerialComms {
    fn initiate(
        &mut self,
        mesh: &MeshGraph,
        kind: ExchangeKind,
        values: &[f64],
        n_var: usize,
    ) -> ScalarResult<PendingExchange> {
        if values.len() != mesh.n_point() * n_var {
            return Err(SolverError::exchange(format!(
                "{:?} 数据长度 {} 与网格 {} × {} 不符",
                kind,
                values.len(),
                mesh.n_point(),
                n_var
            )));
        }
        let node = |p: usize| &values[p * n_var..(p + 1) * n_var];

        let (targets, buffer) = match kind {
            ExchangeKind::Solution => {
                let donors = mesh.halo_donors();
                let targets = donors.iter().map(|&(halo, _)| halo).collect();
                let buffer = donors.iter().flat_map(|&(_, owner)| node(owner).iter().copied()).collect();
                (targets, buffer)
            }
            ExchangeKind::PeriodicResidual { pair } | ExchangeKind::PeriodicImplicit { pair } => {
                let scale = match kind {
                    ExchangeKind::PeriodicImplicit { .. } => 0.5,
                    _ => 1.0,
                };
                let images = periodic_images(mesh, pair)?;
                let mut targets = Vec::with_capacity(2 * images.len());
                let mut buffer = Vec::with_capacity(2 * images.len() * n_var);
                for (a, b) in images {
                    let combined: Vec<f64> = node(a)
                        .iter()
                        .zip(node(b))
                        .map(|(x, y)| scale * (x + y))
                        .collect();
                    for p in [a, b] {
                        targets.push(p);
                        buffer.extend_from_slice(&combined);
                    }
                }
                (targets, buffer)
            }
        };

        Ok(PendingExchange {
            kind,
            n_var,
            targets,
            buffer,
        })
    }

    fn complete(
        &mut self,
        mesh: &MeshGraph,
        request: PendingExchange,
        values: &mut [f64],
        jacobian: Option<&mut BlockCsrMatrix>,
    ) -> ScalarResult<()> {
        let n_var = request.n_var;
        if values.len() != mesh.n_point() * n_var || request.buffer.len() != request.targets.len() * n_var {
            return Err(SolverError::exchange(format!(
                "{:?} 完成阶段数据长度不符: 目标 {}, 缓冲 {}, 数据 {}",
                request.kind,
                request.targets.len(),
                request.buffer.len(),
                values.len()
            )));
        }

        for (&p, recv) in request.targets.iter().zip(request.buffer.chunks(n_var)) {
            values[p * n_var..(p + 1) * n_var].copy_from_slice(recv);
        }

        if let (ExchangeKind::PeriodicResidual { pair }, Some(jacobian)) = (request.kind, jacobian) {
            for (a, b) in periodic_images(mesh, pair)? {
                let block_a = jacobian.diag_block(a).to_vec();
                let block_b = jacobian.diag_block(b).to_vec();
                jacobian.add_to_diag_block(a, &block_b);
                jacobian.add_to_diag_block(b, &block_a);
            }
        }

        Ok(())
    }
}
