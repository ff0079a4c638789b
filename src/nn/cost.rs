/*
 * @Author       : 老董
 * @Date         : 2026-03-06
 * @Description  : 代价函数：对(输出, 期望)逐元素求代价及其导数，总代价为逐元素代价之和
 */

use serde::{Deserialize, Serialize};

use crate::matrix::Matrix;

/// 可选的代价函数，默认为`SoftMaxCrossEntropy`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CostFunction {
    /// (o - e)^2
    SquaredError,
    /// 1/2 (o - e)^2
    MeanSquaredError,
    /// -e * ln(softmax(o))
    #[default]
    SoftMaxCrossEntropy,
}

/// `exp(o_i) / Σ exp(o_j)`，在整个输出上计算（不减去最大值）
pub fn softmax(output: &Matrix) -> Matrix {
    let exp = output.map(f32::exp);
    let sum = exp.sum();
    exp.scale(1.0 / sum)
}

impl CostFunction {
    /// 逐元素代价
    pub fn cost(&self, output: &Matrix, expected: &Matrix) -> Matrix {
        match self {
            CostFunction::SquaredError => {
                let diff = output - expected;
                diff.hadamard(&diff)
            }
            CostFunction::MeanSquaredError => {
                let diff = output - expected;
                diff.hadamard(&diff).scale(0.5)
            }
            CostFunction::SoftMaxCrossEntropy => {
                let probabilities = softmax(output);
                let values = probabilities
                    .as_slice()
                    .iter()
                    .zip(expected.as_slice())
                    .map(|(&p, &e)| if e == 0.0 { 0.0 } else { -e * p.ln() })
                    .collect::<Vec<_>>();
                Matrix::new(&values, output.rows(), output.cols())
            }
        }
    }

    /// 逐元素导数（对输出求导）。
    ///
    /// NOTE: `SoftMaxCrossEntropy`的导数取`softmax(o)·Σe - e`，
    /// 仅当期望为独热向量（Σe = 1）时才等于标准形式`softmax(o) - e`
    pub fn derivative(&self, output: &Matrix, expected: &Matrix) -> Matrix {
        match self {
            CostFunction::SquaredError => (output - expected).scale(2.0),
            CostFunction::MeanSquaredError => output - expected,
            CostFunction::SoftMaxCrossEntropy => {
                let expected_sum = expected.sum();
                &softmax(output).scale(expected_sum) - expected
            }
        }
    }

    /// 总代价：逐元素代价之和
    pub fn error_cost(&self, output: &Matrix, expected: &Matrix) -> f32 {
        self.cost(output, expected).sum()
    }
}
