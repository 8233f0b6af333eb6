// crates/sc_physics/src/restart.rs

//! 重启加载与多重网格限制
//!
//! 重启数据为按全局编号升序排列的定长记录，只包含本地存在的计算域节点：
//!
//! ```text
//! record k = [ 其他求解器字段 (skip 个) | 本求解器 n_var 个标量 | 其余字段 ]
//! ```
//!
//! 加载后依次执行：halo 同步 → 依赖求解器钩子 → 逐层体积加权限制：
//!
//! ```text
//! U_c = Σ_{f ∈ children(c)} U_f · V_f / V_c
//! ```
//!
//! 第 k 层只读取第 k-1 层已限制的解。

use log::{debug, info};
use sc_mesh::{MeshGraph, MeshHierarchy, MeshLevel};

use crate::comms::{Communicator, ExchangeKind};
use crate::error::{ScalarResult, SolverError};
use crate::state::ScalarState;
use crate::traits::RestartHooks;

// ============================================================
// 重启缓冲区
// ============================================================

/// 外部读取器产生的平铺重启数据
#[derive(Debug, Clone, PartialEq)]
pub struct RestartBuffer {
    source: String,
    n_fields: usize,
    data: Vec<f64>,
}

impl RestartBuffer {
    /// 由平铺数据创建，长度必须是 `n_fields` 的整数倍
    pub fn new(source: impl Into<String>, n_fields: usize, data: Vec<f64>) -> ScalarResult<Self> {
        let source = source.into();
        if n_fields == 0 || data.len() % n_fields != 0 {
            return Err(SolverError::RestartFormat(format!(
                "{}: 数据长度 {} 不是记录长度 {} 的整数倍",
                source,
                data.len(),
                n_fields
            )));
        }
        Ok(Self {
            source,
            n_fields,
            data,
        })
    }

    /// 由小端 `f64` 字节流创建
    pub fn from_le_bytes(source: impl Into<String>, n_fields: usize, bytes: &[u8]) -> ScalarResult<Self> {
        let source = source.into();
        let width = std::mem::size_of::<f64>();
        if bytes.len() % width != 0 {
            return Err(SolverError::RestartFormat(format!(
                "{}: 字节数 {} 不是 {} 的整数倍",
                source,
                bytes.len(),
                width
            )));
        }

        // 先分配对齐的 f64 缓冲，再按字节拷贝
        let mut data = vec![0.0f64; bytes.len() / width];
        bytemuck::cast_slice_mut::<f64, u8>(&mut data).copy_from_slice(bytes);
        for x in data.iter_mut() {
            *x = f64::from_bits(u64::from_le(x.to_bits()));
        }
        Self::new(source, n_fields, data)
    }

    /// 由标量状态生成重启数据（本求解器之前的字段填零）
    pub fn from_state(source: impl Into<String>, mesh: &MeshGraph, state: &ScalarState, skip: usize) -> Self {
        let n_var = state.n_var();
        let n_fields = skip + n_var;

        let mut points: Vec<usize> = (0..mesh.n_point_domain()).collect();
        points.sort_by_key(|&p| mesh.global_index(p));

        let mut data = Vec::with_capacity(points.len() * n_fields);
        for p in points {
            data.extend(std::iter::repeat(0.0).take(skip));
            data.extend_from_slice(state.node(p));
        }
        Self {
            source: source.into(),
            n_fields,
            data,
        }
    }

    /// 转为小端字节流
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let le: Vec<f64> = self
            .data
            .iter()
            .map(|x| f64::from_bits(x.to_bits().to_le()))
            .collect();
        bytemuck::cast_slice::<f64, u8>(&le).to_vec()
    }

    /// 来源名称
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 每条记录的字段数
    #[inline]
    pub fn n_fields(&self) -> usize {
        self.n_fields
    }

    /// 记录数
    #[inline]
    pub fn n_records(&self) -> usize {
        self.data.len() / self.n_fields
    }

    /// 第 `k` 条记录
    #[inline]
    pub fn record(&self, k: usize) -> &[f64] {
        &self.data[k * self.n_fields..(k + 1) * self.n_fields]
    }
}

// ============================================================
// 加载与限制
// ============================================================

/// 加载重启数据并限制到粗层，返回最细层读入的点数
///
/// `states[k]` 为第 k 层的标量状态，层数不超过网格层数。
pub fn load_restart(
    hierarchy: &MeshHierarchy,
    states: &mut [ScalarState],
    buffer: &RestartBuffer,
    skip: usize,
    comms: &mut dyn Communicator,
    hooks: &mut dyn RestartHooks,
) -> ScalarResult<usize> {
    if states.is_empty() || states.len() > hierarchy.n_levels() {
        return Err(SolverError::RestartFormat(format!(
            "状态层数 {} 与网格层数 {} 不符",
            states.len(),
            hierarchy.n_levels()
        )));
    }
    let mesh = hierarchy.finest();
    let n_var = states[0].n_var();
    if buffer.n_fields() < skip + n_var {
        return Err(SolverError::RestartFormat(format!(
            "{}: 记录长度 {} 小于跳过字段 {} 加变量数 {}",
            buffer.source(),
            buffer.n_fields(),
            skip,
            n_var
        )));
    }

    // 按全局编号升序，计数器只对本地存在的点递增
    let mut loaded = 0;
    for global in 0..mesh.n_global_point_domain() {
        let Some(local) = mesh.global_to_local(global) else {
            continue;
        };
        if loaded >= buffer.n_records() {
            break;
        }
        let record = buffer.record(loaded);
        states[0].node_mut(local).copy_from_slice(&record[skip..skip + n_var]);
        loaded += 1;
    }

    if loaded < mesh.n_point_domain() {
        return Err(SolverError::restart_mismatch(
            buffer.source(),
            loaded,
            mesh.n_point_domain(),
        ));
    }
    info!("重启 {}: 读入 {} 个点, 每点 {} 个字段", buffer.source(), loaded, buffer.n_fields());

    synchronize_level(mesh, &mut states[0], comms)?;
    hooks.flow_preprocessing(0);
    hooks.scalar_postprocessing(0, &mut states[0]);

    let n_levels = states.len();
    for k in 1..n_levels {
        let (fine, coarse) = states.split_at_mut(k);
        restrict_solution(hierarchy.level(k), hierarchy.graph(k - 1), &fine[k - 1], &mut coarse[0]);
        synchronize_level(hierarchy.graph(k), &mut coarse[0], comms)?;
        hooks.flow_preprocessing(k);
        hooks.scalar_postprocessing(k, &mut coarse[0]);
        debug!("重启解限制到第 {} 层: {} 个节点", k, hierarchy.graph(k).n_point());
    }

    if n_levels > 1 {
        info!("重启解已限制到 {} 个粗层", n_levels - 1);
    }
    Ok(loaded)
}

/// 体积加权限制
///
/// 只处理计算域节点；没有子节点的粗节点保留原值。
pub fn restrict_solution(
    coarse_level: &MeshLevel,
    fine_mesh: &MeshGraph,
    fine_state: &ScalarState,
    coarse_state: &mut ScalarState,
) {
    let coarse_mesh = coarse_level.graph();
    for parent in 0..coarse_mesh.n_point_domain() {
        let children = coarse_level.children(parent);
        if children.is_empty() {
            continue;
        }
        let inv_volume = 1.0 / coarse_mesh.volume(parent);
        let target = coarse_state.node_mut(parent);
        target.fill(0.0);
        for &child in children {
            let weight = fine_mesh.volume(child) * inv_volume;
            for (u, &f) in target.iter_mut().zip(fine_state.node(child)) {
                *u += f * weight;
            }
        }
    }
}

fn synchronize_level(mesh: &MeshGraph, state: &mut ScalarState, comms: &mut dyn Communicator) -> ScalarResult<()> {
    let n_var = state.n_var();
    let request = comms.initiate(mesh, ExchangeKind::Solution, &state.solution, n_var)?;
    comms.complete(mesh, request, &mut state.solution, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::SerialComms;
    use crate::traits::NoopHooks;
    use glam::DVec3;
    use sc_mesh::generation::DualMeshGenerator;

    #[derive(Default)]
    struct CountingHooks {
        flow: Vec<usize>,
        scalar: Vec<usize>,
    }

    impl RestartHooks for CountingHooks {
        fn flow_preprocessing(&mut self, level: usize) {
            self.flow.push(level);
        }

        fn scalar_postprocessing(&mut self, level: usize, _state: &mut ScalarState) {
            self.scalar.push(level);
        }
    }

    #[test]
    fn test_buffer_format_checks() {
        assert!(RestartBuffer::new("a", 3, vec![0.0; 7]).is_err());
        assert!(RestartBuffer::new("a", 0, vec![]).is_err());
        assert!(RestartBuffer::from_le_bytes("a", 1, &[0u8; 12]).is_err());

        let buffer = RestartBuffer::new("a", 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let bytes = buffer.to_le_bytes();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..8], &1.0f64.to_le_bytes());
        let decoded = RestartBuffer::from_le_bytes("a", 2, &bytes).unwrap();
        assert_eq!(decoded.record(1), &[3.0, 4.0]);
    }

    #[test]
    fn test_load_skips_absent_globals() {
        // 本地只有全局点 1 与 3
        let mut builder = MeshGraph::builder(2);
        builder.add_node(DVec3::ZERO, 1.0);
        builder.add_node(DVec3::X, 1.0);
        builder.add_edge(0, 1, DVec3::X);
        builder.global_indices(vec![3, 1]).n_global_point_domain(4);
        let mesh = builder.build().unwrap();
        let hierarchy = MeshHierarchy::single(mesh);

        let mut states = vec![ScalarState::new(2, 1, &[0.0]).unwrap()];
        // 记录按全局编号升序：先全局 1，再全局 3
        let buffer = RestartBuffer::new("partial.dat", 7, {
            let mut data = vec![0.0; 14];
            data[6] = 0.1;
            data[13] = 0.3;
            data
        })
        .unwrap();
        let mut hooks = CountingHooks::default();
        let loaded = load_restart(&hierarchy, &mut states, &buffer, 6, &mut SerialComms::new(), &mut hooks).unwrap();

        assert_eq!(loaded, 2);
        assert_eq!(states[0].solution, vec![0.3, 0.1]);
        assert_eq!(hooks.flow, vec![0]);
        assert_eq!(hooks.scalar, vec![0]);
    }

    #[test]
    fn test_short_buffer_is_mismatch() {
        let mesh = DualMeshGenerator::new(2, 2, 1.0, 1.0).build().unwrap();
        let hierarchy = MeshHierarchy::single(mesh);
        let mut states = vec![ScalarState::new(9, 1, &[0.0]).unwrap()];
        let buffer = RestartBuffer::new("short.dat", 7, vec![0.0; 7 * 8]).unwrap();
        let err = load_restart(&hierarchy, &mut states, &buffer, 6, &mut SerialComms::new(), &mut NoopHooks)
            .unwrap_err();
        match err {
            SolverError::RestartMismatch {
                source_name,
                loaded,
                expected,
            } => {
                assert_eq!(source_name, "short.dat");
                assert_eq!(loaded, 8);
                assert_eq!(expected, 9);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_restriction_is_volume_weighted() {
        let mut builder = MeshGraph::builder(2);
        builder.add_node(DVec3::ZERO, 1.0);
        builder.add_node(DVec3::X, 3.0);
        builder.add_edge(0, 1, DVec3::X);
        let fine = builder.build().unwrap();

        let mut builder = MeshGraph::builder(2);
        builder.add_node(DVec3::new(0.5, 0.0, 0.0), 4.0);
        let coarse = builder.build().unwrap();

        let hierarchy = MeshHierarchy::from_levels(fine, vec![(coarse, vec![vec![0, 1]])]).unwrap();
        let mut fine_state = ScalarState::new(2, 1, &[0.0]).unwrap();
        fine_state.solution = vec![2.0, 6.0];
        let mut coarse_state = ScalarState::new(1, 1, &[0.0]).unwrap();
        restrict_solution(hierarchy.level(1), hierarchy.graph(0), &fine_state, &mut coarse_state);
        assert!((coarse_state.solution[0] - 5.0).abs() < 1e-14);
    }
}
