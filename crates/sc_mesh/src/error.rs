// crates/sc_mesh/src/error.rs
//! 网格处理错误类型
//!
//! 包含网格拓扑、尺寸与着色错误定义
//! 所有错误可转换为 `sc_foundation::ScError` 向上传播

use sc_foundation::ScError;
use thiserror::Error;

/// 网格模块结果类型
pub type MeshResult<T> = Result<T, MeshError>;

/// 网格错误枚举
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// 拓扑错误
    #[error("拓扑错误: {operation} 失败, {details}")]
    InvalidTopology {
        /// 出错的操作
        operation: &'static str,
        /// 详细说明
        details: String,
    },

    /// 元素数量不匹配
    #[error("元素数量不匹配: {context} 需要 {required} 个, 提供 {provided}")]
    ElementCountMismatch {
        /// 需要的数量
        required: usize,
        /// 实际提供的数量
        provided: usize,
        /// 上下文
        context: &'static str,
    },

    /// 着色冲突：同一颜色的两个分组共享节点
    #[error("着色冲突: 颜色 {color} 中边 {edge} 与其他分组共享节点 {node}")]
    ColoringConflict {
        /// 颜色编号
        color: usize,
        /// 冲突的边
        edge: usize,
        /// 共享的节点
        node: usize,
    },

    /// 标记未找到
    #[error("边界标记未找到: {tag}")]
    MarkerNotFound {
        /// 标记名称
        tag: String,
    },
}

impl MeshError {
    /// 拓扑错误
    pub fn topology(operation: &'static str, details: impl Into<String>) -> Self {
        Self::InvalidTopology {
            operation,
            details: details.into(),
        }
    }

    /// 数量不匹配
    pub fn count_mismatch(context: &'static str, required: usize, provided: usize) -> Self {
        Self::ElementCountMismatch {
            required,
            provided,
            context,
        }
    }
}

/// 转换到基础层错误
impl From<MeshError> for ScError {
    fn from(err: MeshError) -> Self {
        match err {
            MeshError::ElementCountMismatch {
                required,
                provided,
                context,
            } => ScError::size_mismatch(context, required, provided),
            other => ScError::invalid_mesh(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_sc_error() {
        let err: ScError = MeshError::count_mismatch("volume", 4, 3).into();
        assert_eq!(err, ScError::size_mismatch("volume", 4, 3));

        let err: ScError = MeshError::topology("build", "边端点越界").into();
        assert!(matches!(err, ScError::InvalidMesh { .. }));
    }
}
