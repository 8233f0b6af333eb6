// crates/sc_physics/src/error.rs

//! 求解器错误类型
//!
//! 只有结构性不匹配（重启文件与网格不符、边界标记未映射、数组尺寸错误）
//! 作为错误上报；零时间步和过大增量等数值退化在迭代内部就地处理。

use sc_config::ConfigError;
use sc_foundation::ScError;
use sc_mesh::MeshError;
use thiserror::Error;

/// 求解器结果类型
pub type ScalarResult<T> = Result<T, SolverError>;

/// 求解器错误
#[derive(Error, Debug)]
pub enum SolverError {
    /// 重启文件与网格不匹配
    #[error("重启文件 {source_name} 与网格不匹配: 读入 {loaded} 个点, 需要 {expected} 个")]
    RestartMismatch {
        /// 重启数据来源名称
        source_name: String,
        /// 实际读入的点数
        loaded: usize,
        /// 本地计算域点数
        expected: usize,
    },

    /// 重启缓冲区格式错误
    #[error("重启数据格式错误: {0}")]
    RestartFormat(String),

    /// 边界标记未指定边界类型
    #[error("边界标记 {tag} 未指定边界类型")]
    UnmappedMarker {
        /// 标记名称
        tag: String,
    },

    /// 通信交换请求与数据不匹配
    #[error("交换请求不匹配: {details}")]
    ExchangeMismatch {
        /// 详细说明
        details: String,
    },

    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 网格错误
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// 基础层错误
    #[error(transparent)]
    Foundation(#[from] ScError),
}

impl SolverError {
    /// 重启点数不匹配
    pub fn restart_mismatch(source_name: impl Into<String>, loaded: usize, expected: usize) -> Self {
        Self::RestartMismatch {
            source_name: source_name.into(),
            loaded,
            expected,
        }
    }

    /// 交换请求不匹配
    pub fn exchange(details: impl Into<String>) -> Self {
        Self::ExchangeMismatch {
            details: details.into(),
        }
    }
}
