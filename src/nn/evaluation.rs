/*
 * @Author       : 老董
 * @Date         : 2026-03-06
 * @Description  : 单个样本反向传播的结果，以及按批次求平均
 */

use crate::matrix::Matrix;

/// 一个层参数的梯度，形状与该层的(权重, 偏置)一一对应
#[derive(Debug, Clone, PartialEq)]
pub struct WeightBiasDeltas {
    pub weight_deltas: Matrix,
    pub bias_deltas: Matrix,
}

impl WeightBiasDeltas {
    pub fn new(weight_deltas: Matrix, bias_deltas: Matrix) -> Self {
        Self {
            weight_deltas,
            bias_deltas,
        }
    }

    /// 两个梯度矩阵的形状
    pub fn shapes(&self) -> [[usize; 2]; 2] {
        [self.weight_deltas.shape(), self.bias_deltas.shape()]
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(
            self.weight_deltas.scale(factor),
            self.bias_deltas.scale(factor),
        )
    }

    /// `self += other * factor`
    pub fn add_scaled(&mut self, other: &WeightBiasDeltas, factor: f32) {
        self.weight_deltas += &other.weight_deltas.scale(factor);
        self.bias_deltas += &other.bias_deltas.scale(factor);
    }
}

/// 单个样本的反向传播评估结果
#[derive(Debug, Clone)]
pub struct BackPropagationEvaluation {
    /// 逐元素代价之和
    pub error_cost: f32,
    /// 每层的梯度，无参数的层为None
    pub deltas: Vec<Option<WeightBiasDeltas>>,
    pub output: Matrix,
    pub expected: Matrix,
}

impl BackPropagationEvaluation {
    /// 将一个批次的评估结果求平均：每个样本的梯度（及代价）都乘以`1/B`后求和。
    /// 输出与期望取最后一个样本的值。批次为空时返回None
    pub fn average(evaluations: &[BackPropagationEvaluation]) -> Option<BackPropagationEvaluation> {
        let last = evaluations.last()?;
        let factor = 1.0 / evaluations.len() as f32;

        let mut deltas: Vec<Option<WeightBiasDeltas>> = evaluations[0]
            .deltas
            .iter()
            .map(|d| d.as_ref().map(|d| d.scaled(factor)))
            .collect();
        for evaluation in &evaluations[1..] {
            for (sum, delta) in deltas.iter_mut().zip(&evaluation.deltas) {
                if let (Some(sum), Some(delta)) = (sum.as_mut(), delta) {
                    sum.add_scaled(delta, factor);
                }
            }
        }

        Some(BackPropagationEvaluation {
            error_cost: evaluations.iter().map(|e| e.error_cost * factor).sum(),
            deltas,
            output: last.output.clone(),
            expected: last.expected.clone(),
        })
    }
}
