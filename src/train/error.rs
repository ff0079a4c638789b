//! 训练过程的错误类型

use thiserror::Error;

use crate::data::DataError;
use crate::nn::NetworkError;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("配置解析失败: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("配置无效: {0}")]
    InvalidConfiguration(String),

    #[error("训练器尚未初始化，请先调用`init()`")]
    NotInitialized,
}
