// crates/sc_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `ScError` 枚举和 `ScResult` 类型别名。
//!
//! # 错误分层
//!
//! 只有结构性不匹配（网格/重启文件、数组尺寸、索引）才作为错误上报。
//! 数值退化（零时间步、过大增量）由求解器就地处理，不经过本类型。
//!
//! # 示例
//!
//! ```
//! use sc_foundation::error::{ScError, ScResult};
//!
//! fn load() -> ScResult<()> {
//!     Err(ScError::invalid_input("重启缓冲区为空"))
//! }
//! assert!(load().is_err());
//! ```

use thiserror::Error;

/// 统一结果类型
pub type ScResult<T> = Result<T, ScError>;

/// ScalarTransport 基础错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScError {
    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    /// 数据超出范围
    #[error("数据超出范围: {field}={value}, 期望范围=[{min}, {max}]")]
    OutOfRange {
        /// 字段名
        field: &'static str,
        /// 实际值
        value: f64,
        /// 最小允许值
        min: f64,
        /// 最大允许值
        max: f64,
    },

    /// 无效网格拓扑
    #[error("无效的网格拓扑: {message}")]
    InvalidMesh {
        /// 具体错误信息
        message: String,
    },

    /// 内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 内部错误描述
        message: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl ScError {
    /// 无效输入
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 数据超出范围
    pub fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    /// 无效网格
    pub fn invalid_mesh(message: impl Into<String>) -> Self {
        Self::InvalidMesh {
            message: message.into(),
        }
    }

    /// 内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl ScError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> ScResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查值是否在范围内
    #[inline]
    pub fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> ScResult<()> {
        if value < min || value > max {
            Err(Self::out_of_range(field, value, min, max))
        } else {
            Ok(())
        }
    }

    /// 检查索引是否在范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> ScResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_size() {
        assert!(ScError::check_size("x", 3, 3).is_ok());
        let err = ScError::check_size("x", 3, 2).unwrap_err();
        assert_eq!(err, ScError::size_mismatch("x", 3, 2));
    }

    #[test]
    fn test_check_index() {
        assert!(ScError::check_index("node", 2, 3).is_ok());
        assert!(ScError::check_index("node", 3, 3).is_err());
    }

    #[test]
    fn test_check_range() {
        assert!(ScError::check_range("ratio", 0.5, 0.0, 1.0).is_ok());
        assert!(ScError::check_range("ratio", 1.5, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_display() {
        let err = ScError::invalid_mesh("边端点越界");
        assert!(err.to_string().contains("边端点越界"));
    }
}
