// crates/sc_physics/src/shared.rs

//! 跨线程共享的可变切片
//!
//! 着色直接模式下，同一颜色的不同分组并发写入残差与 Jacobian。
//! 写入位置互不重叠依赖两条网格层约束：
//!
//! - `sc_mesh::EdgeColoring::validate`：同一颜色的不同分组不共享节点，
//!   `ColoringAdapter` 只有在该检查通过后才进入直接模式；
//! - `MeshGraphBuilder::build` 拒绝重复连接同一对节点的边，
//!   因此每个非对角块只属于一条边。
//!
//! 本类型只负责把 `&mut [T]` 分发给多个线程，访问的互斥性由调用方保证。

use std::marker::PhantomData;

/// 可在线程间共享的可变切片视图
pub(crate) struct SharedSlice<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

impl<'a, T> SharedSlice<'a, T> {
    /// 从独占切片创建
    pub fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    /// 取 `[start, start + len)` 的可变子切片
    ///
    /// # Safety
    ///
    /// 返回的引用存活期间，该区间不得被任何其他引用（包括其他线程
    /// 经由本视图取得的引用）访问。
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slice_mut(&self, start: usize, len: usize) -> &mut [T] {
        assert!(start + len <= self.len, "SharedSlice 访问越界");
        // SAFETY: 区间已检查在界内；本函数的前置条件保证没有其他引用重叠
        unsafe { std::slice::from_raw_parts_mut(self.ptr.add(start), len) }
    }
}

unsafe impl<T: Send> Send for SharedSlice<'_, T> {}
unsafe impl<T: Send> Sync for SharedSlice<'_, T> {}
