//! 数据加载错误类型定义

use std::path::PathBuf;
use thiserror::Error;

/// 数据加载相关错误
#[derive(Debug, Error)]
pub enum DataError {
    /// 文件未找到
    #[error("文件未找到: {0}")]
    FileNotFound(PathBuf),

    /// IO 错误
    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 格式错误（如清单某行字段数不对）
    #[error("格式错误: {0}")]
    FormatError(String),

    /// 数据集为空
    #[error("{0}为空")]
    EmptySet(&'static str),

    /// 标签超出类别数
    #[error("标签越界: {label} >= {class_count}")]
    LabelOutOfRange { label: usize, class_count: usize },
}
