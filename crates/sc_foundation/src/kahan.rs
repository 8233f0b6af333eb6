// crates/sc_foundation/src/kahan.rs

//! Kahan 补偿求和

use crate::scalar::Scalar;

/// Kahan 求和器
///
/// 用于残差平方和等长序列累加，减少浮点误差。
/// 两个部分和可以通过 [`KahanSum::merge`] 合并（线程局部累加后归约）。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KahanSum {
    sum: Scalar,
    compensation: Scalar,
}

impl KahanSum {
    /// 创建新的求和器
    pub const fn new() -> Self {
        Self {
            sum: 0.0,
            compensation: 0.0,
        }
    }

    /// 添加一个值
    #[inline]
    pub fn add(&mut self, value: Scalar) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    /// 合并另一个部分和
    #[inline]
    pub fn merge(mut self, other: Self) -> Self {
        self.add(other.sum);
        self.add(-other.compensation);
        self
    }

    /// 获取当前求和值
    #[inline]
    pub fn value(&self) -> Scalar {
        self.sum
    }

    /// 重置求和器
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// 从迭代器求和
    pub fn sum_iter<I: IntoIterator<Item = Scalar>>(iter: I) -> Scalar {
        let mut kahan = Self::new();
        for v in iter {
            kahan.add(v);
        }
        kahan.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kahan_sum() {
        let data = vec![0.1; 1000];
        let sum = KahanSum::sum_iter(data.iter().copied());
        assert!((sum - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_merge_partials() {
        let mut a = KahanSum::new();
        let mut b = KahanSum::new();
        for _ in 0..500 {
            a.add(0.1);
            b.add(0.1);
        }
        let total = a.merge(b);
        assert!((total.value() - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_reset() {
        let mut k = KahanSum::new();
        k.add(3.0);
        k.reset();
        assert_eq!(k.value(), 0.0);
    }
}
