use thiserror::Error;
mod ops;
pub use self::ops::*;

/// 矩阵服务的错误。矩阵层面的形状错误属于编程错误，
/// 故通常以`assert!(cond, "{}", MatrixError::...)`的形式直接panic。
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MatrixError {
    // 矩阵二元运算
    #[error(
        "形状不一致，故无法{operator}：第一个矩阵的形状为{matrix1_shape:?}，第二个矩阵的形状为{matrix2_shape:?}"
    )]
    OperatorError {
        operator: Operator,
        matrix1_shape: [usize; 2],
        matrix2_shape: [usize; 2],
    },
    #[error("数据长度{len}与形状{shape:?}不匹配")]
    DataLengthMismatch { len: usize, shape: [usize; 2] },
    #[error("矩阵重塑前后元素数须一致：原形状为{from:?}，目标形状为{to:?}")]
    IncompatibleReshape { from: [usize; 2], to: [usize; 2] },
}
