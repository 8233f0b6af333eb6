// crates/sc_foundation/src/scalar.rs

//! 统一标量类型
//!
//! 求解器全部使用 `Scalar`（f64）。数值常量影响欠松弛和冻结节点的判定，
//! 修改前请同步检查相关测试。

/// 计算用标量类型
pub type Scalar = f64;

/// 防止除零的小量（欠松弛比值的分母偏置）
pub const EPS: Scalar = 1.0e-16;

/// 极小阈值：欠松弛因子低于此值时直接取消本次更新
pub const TINY: Scalar = 1.0e-10;

/// 不小于 `value` 的 `multiple` 的最小倍数
///
/// `multiple == 0` 时原样返回 `value`。
#[inline]
pub fn next_multiple(value: usize, multiple: usize) -> usize {
    if multiple == 0 {
        return value;
    }
    value.div_ceil(multiple) * multiple
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_multiple() {
        assert_eq!(next_multiple(128, 4), 128);
        assert_eq!(next_multiple(129, 4), 132);
        assert_eq!(next_multiple(5, 8), 8);
        assert_eq!(next_multiple(0, 8), 0);
        assert_eq!(next_multiple(7, 0), 7);
    }

    #[test]
    fn test_constants_ordering() {
        assert!(EPS < TINY);
        assert!(TINY > 0.0);
    }
}
