//! 核函数服务的错误类型定义

use thiserror::Error;

/// 核函数查找、缓冲区绑定与调度相关错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KernelError {
    /// 核函数名称无法解析
    #[error("未找到名为`{0}`的核函数")]
    KernelNotFound(String),

    /// 调度时所需的缓冲区未绑定
    #[error("核函数`{kernel}`所需的缓冲区`{buffer}`未绑定")]
    BufferNotBound { kernel: String, buffer: String },

    /// 缓冲区长度与几何参数不符
    #[error("缓冲区`{buffer}`长度不符: 期望 {expected}, 实际 {got}")]
    BufferLength {
        buffer: String,
        expected: usize,
        got: usize,
    },

    /// 调度时所需的整型参数未设置
    #[error("核函数`{kernel}`所需的整型参数`{name}`未设置")]
    UniformNotSet { kernel: String, name: String },

    /// 整型参数取值非法（如尺寸为负）
    #[error("核函数`{kernel}`的整型参数`{name}`取值非法: {value}")]
    InvalidUniform {
        kernel: String,
        name: String,
        value: i32,
    },

    /// 元素数超出最大尺寸档位
    #[error("图像尺寸过大: {elements}个元素超出了单次调度的最大容量{max}")]
    Capacity { elements: usize, max: usize },

    /// 线程组数量不足以覆盖全部工作量
    #[error("核函数`{kernel}`的线程组{groups:?}不足以覆盖{required:?}")]
    GridTooSmall {
        kernel: String,
        groups: [usize; 3],
        required: [usize; 3],
    },

    /// 程序已释放后又被调度
    #[error("核函数程序`{0}`已释放")]
    Released(String),
}
