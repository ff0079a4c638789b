mod cost;
mod layer_convolution;
mod network;

use crate::matrix::Matrix;

/// 代理损失`L = Σ output ⊙ upstream`，其对输出的梯度恰为`upstream`。
/// 用f64求和以减小数值梯度的舍入误差
fn weighted_loss(output: &Matrix, upstream: &Matrix) -> f64 {
    output
        .as_slice()
        .iter()
        .zip(upstream.as_slice())
        .map(|(&o, &p)| o as f64 * p as f64)
        .sum()
}
