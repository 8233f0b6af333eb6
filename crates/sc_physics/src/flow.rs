// crates/sc_physics/src/flow.rs

//! 存储型流场
//!
//! [`FlowField`] 以平铺数组实现 [`FlowStateProvider`]，供驱动程序在
//! 流场求解器与标量求解器之间传递状态，也用于测试构造流场。

use glam::DVec3;
use sc_foundation::{ScError, ScResult};

use crate::traits::FlowStateProvider;
use crate::types::PrimitiveLayout;

/// 默认参考温度 [K]
const REFERENCE_TEMPERATURE: f64 = 288.15;

/// 存储型流场
#[derive(Debug, Clone)]
pub struct FlowField {
    layout: PrimitiveLayout,
    n_point: usize,
    n_prim: usize,

    // ===== 节点数据 =====
    primitive: Vec<f64>,
    density_levels: Vec<[f64; 3]>,
    density_old: Vec<f64>,
    delta_time: Vec<f64>,
    gradient: Vec<DVec3>,
    limiter: Vec<f64>,
    laminar_viscosity: Vec<f64>,
    eddy_viscosity: Vec<f64>,

    // ===== 边界数据 =====
    free_stream: Vec<f64>,
    /// 每个标记的顶点特征状态（平铺），为空时使用自由来流
    marker_states: Vec<Vec<f64>>,
}

impl FlowField {
    /// 均匀流场
    ///
    /// 压力取 0，温度取参考温度，自由来流与内部状态相同。
    pub fn uniform(n_point: usize, n_dim: usize, velocity: DVec3, density: f64, delta_time: f64) -> Self {
        let layout = PrimitiveLayout::new(n_dim);
        let n_prim = layout.min_len();
        let mut state = vec![0.0; n_prim];
        for d in 0..n_dim {
            state[1 + d] = velocity[d];
        }
        state[n_dim + 1] = REFERENCE_TEMPERATURE;
        state[layout.density_index()] = density;

        let primitive = state.iter().copied().cycle().take(n_point * n_prim).collect();

        Self {
            layout,
            n_point,
            n_prim,
            primitive,
            density_levels: vec![[density; 3]; n_point],
            density_old: vec![density; n_point],
            delta_time: vec![delta_time; n_point],
            gradient: vec![DVec3::ZERO; n_point * n_prim],
            limiter: vec![1.0; n_point * n_prim],
            laminar_viscosity: vec![0.0; n_point],
            eddy_viscosity: vec![0.0; n_point],
            free_stream: state,
            marker_states: Vec::new(),
        }
    }

    /// 原始变量布局
    #[inline]
    pub fn layout(&self) -> PrimitiveLayout {
        self.layout
    }

    /// 节点数
    #[inline]
    pub fn n_point(&self) -> usize {
        self.n_point
    }

    /// 设置节点速度
    pub fn set_velocity(&mut self, point: usize, velocity: DVec3) {
        let base = point * self.n_prim;
        for d in 0..self.layout.n_dim {
            self.primitive[base + 1 + d] = velocity[d];
        }
    }

    /// 设置节点密度（原始变量与三个守恒时间层同时更新）
    pub fn set_density(&mut self, point: usize, density: f64) {
        self.primitive[point * self.n_prim + self.layout.density_index()] = density;
        self.density_levels[point] = [density; 3];
        self.density_old[point] = density;
    }

    /// 设置守恒密度的 n+1、n、n-1 时间层
    pub fn set_density_levels(&mut self, point: usize, levels: [f64; 3]) {
        self.density_levels[point] = levels;
    }

    /// 设置上一次非线性迭代的守恒密度
    pub fn set_density_old(&mut self, point: usize, density: f64) {
        self.density_old[point] = density;
    }

    /// 设置局部时间步
    pub fn set_delta_time(&mut self, point: usize, dt: f64) {
        self.delta_time[point] = dt;
    }

    /// 设置粘性
    pub fn set_viscosity(&mut self, point: usize, laminar: f64, eddy: f64) {
        self.laminar_viscosity[point] = laminar;
        self.eddy_viscosity[point] = eddy;
    }

    /// 设置第 `var` 个原始变量的重构梯度与限制因子
    pub fn set_reconstruction(&mut self, point: usize, var: usize, gradient: DVec3, limiter: f64) {
        self.gradient[point * self.n_prim + var] = gradient;
        self.limiter[point * self.n_prim + var] = limiter;
    }

    /// 设置自由来流原始变量
    pub fn set_free_stream(&mut self, state: Vec<f64>) -> ScResult<()> {
        ScError::check_size("free_stream", self.n_prim, state.len())?;
        self.free_stream = state;
        Ok(())
    }

    /// 设置标记各顶点的特征状态（按顶点平铺）
    pub fn set_marker_states(&mut self, marker: usize, states: Vec<f64>) -> ScResult<()> {
        if states.len() % self.n_prim != 0 {
            return Err(ScError::invalid_input(format!(
                "标记 {} 的特征状态长度 {} 不是 {} 的整数倍",
                marker,
                states.len(),
                self.n_prim
            )));
        }
        if self.marker_states.len() <= marker {
            self.marker_states.resize(marker + 1, Vec::new());
        }
        self.marker_states[marker] = states;
        Ok(())
    }
}

impl FlowStateProvider for FlowField {
    fn n_prim_var(&self) -> usize {
        self.n_prim
    }

    fn n_prim_var_grad(&self) -> usize {
        self.n_prim
    }

    fn primitive(&self, point: usize) -> &[f64] {
        &self.primitive[point * self.n_prim..(point + 1) * self.n_prim]
    }

    fn density(&self, point: usize) -> f64 {
        self.primitive[point * self.n_prim + self.layout.density_index()]
    }

    fn conservative_density_levels(&self, point: usize) -> [f64; 3] {
        self.density_levels[point]
    }

    fn density_old(&self, point: usize) -> f64 {
        self.density_old[point]
    }

    fn delta_time(&self, point: usize) -> f64 {
        self.delta_time[point]
    }

    fn reconstruction_gradient(&self, point: usize) -> &[DVec3] {
        &self.gradient[point * self.n_prim..(point + 1) * self.n_prim]
    }

    fn limiter(&self, point: usize) -> &[f64] {
        &self.limiter[point * self.n_prim..(point + 1) * self.n_prim]
    }

    fn characteristic_primitive(&self, marker: usize, vertex: usize) -> &[f64] {
        match self.marker_states.get(marker) {
            Some(states) if !states.is_empty() => {
                &states[vertex * self.n_prim..(vertex + 1) * self.n_prim]
            }
            _ => &self.free_stream,
        }
    }

    fn laminar_viscosity(&self, point: usize) -> f64 {
        self.laminar_viscosity[point]
    }

    fn eddy_viscosity(&self, point: usize) -> f64 {
        self.eddy_viscosity[point]
    }
}
