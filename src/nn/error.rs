//! 网络构建、传播与参数读写的错误类型定义

use thiserror::Error;

use super::TensorShape;
use crate::kernel::KernelError;

/// 网络相关错误
#[derive(Debug, Error)]
pub enum NetworkError {
    /// 网络中没有任何层
    #[error("网络中没有任何层")]
    EmptyNetwork,

    /// 相邻层形状不衔接
    #[error("第{layer_index}层的输入形状{got}与上一层的输出形状{expected}不一致")]
    ShapeMismatch {
        layer_index: usize,
        expected: TensorShape,
        got: TensorShape,
    },

    /// 层参数配置无效（如输出尺寸为零）
    #[error("无效配置: {0}")]
    InvalidConfiguration(String),

    /// 输入无效（类型或元素数不符）
    #[error("无效输入: {0}")]
    InvalidInput(String),

    /// 尚未前向传播（或尚未赋予输入）就进行了依赖其缓存的操作
    #[error("{0}尚未前向传播")]
    NotPropagated(String),

    /// 梯度与层数不一致
    #[error("梯度数量不符: 期望 {expected}, 实际 {got}")]
    DeltaCount { expected: usize, got: usize },

    /// 某层的梯度与其参数形状不一致
    #[error("第{layer_index}层的梯度与参数形状不符: 期望 {expected:?}, 实际 {got:?}")]
    DeltaShape {
        layer_index: usize,
        expected: Option<[[usize; 2]; 2]>,
        got: Option<[[usize; 2]; 2]>,
    },

    /// 导入的参数字节数与网络拓扑不符
    #[error("参数长度不符: 期望 {expected} 字节, 实际 {got} 字节")]
    ParameterLength { expected: usize, got: usize },

    #[error("核函数错误: {0}")]
    Kernel(#[from] KernelError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("图像错误: {0}")]
    Image(#[from] image::ImageError),

    #[error("序列化错误: {0}")]
    Serde(#[from] serde_json::Error),
}
