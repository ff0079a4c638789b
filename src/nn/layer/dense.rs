/*
 * @Author       : 老董
 * @Date         : 2026-03-08
 * @Description  : 全连接层
 *
 * 前向：z = x · W + b，y = f(z)
 * 反向：gamma = f'(z) ⊙ δ，dW[i, j] = gamma[j] · x[i]，db = gamma，δ_in = gamma · Wᵀ
 *
 * 形状：x为(1, n_in)，W为(n_in, n_out)，b为(1, n_out)
 */

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{LayerInput, TraitLayer, apply_deltas, matrix_input};
use crate::matrix::{Activation, Matrix};
use crate::nn::{LayerTypeDescriptor, NetworkError, TensorShape, WeightBiasDeltas};

/// 全连接层
#[derive(Debug, Clone)]
pub struct Dense {
    input_tensor: TensorShape,
    output_tensor: TensorShape,
    activation: Activation,
    weights: Matrix,
    bias: Matrix,
    input: Option<Matrix>,
    prior_activation_output: Option<Matrix>,
    output: Matrix,
    layer_deltas: Option<Matrix>,
}

impl Dense {
    /// 创建全连接层，权重与偏置在[-1, 1]内均匀随机初始化
    pub fn new(inputs: usize, outputs: usize, activation: Activation) -> Self {
        Self {
            input_tensor: TensorShape::vector(inputs),
            output_tensor: TensorShape::vector(outputs),
            activation,
            weights: Matrix::new_random(-1.0, 1.0, inputs, outputs),
            bias: Matrix::new_random(-1.0, 1.0, 1, outputs),
            input: None,
            prior_activation_output: None,
            output: Matrix::zeros(1, outputs),
            layer_deltas: None,
        }
    }

    /// 用固定种子重新初始化参数
    pub fn seeded(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let [rows, cols] = self.weights.shape();
        self.weights = Matrix::new_random_with_rng(-1.0, 1.0, rows, cols, &mut rng);
        self.bias = Matrix::new_random_with_rng(-1.0, 1.0, 1, cols, &mut rng);
        self
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn bias(&self) -> &Matrix {
        &self.bias
    }
}

impl TraitLayer for Dense {
    fn input_tensor(&self) -> TensorShape {
        self.input_tensor
    }

    fn output_tensor(&self) -> TensorShape {
        self.output_tensor
    }

    fn assign_input(&mut self, input: LayerInput) -> Result<(), NetworkError> {
        self.input = Some(matrix_input(
            "Dense层",
            input,
            1,
            self.input_tensor.volume(),
        )?);
        Ok(())
    }

    fn forward_prop(&mut self) -> Result<(), NetworkError> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| NetworkError::NotPropagated("Dense层的输入".to_string()))?;
        let prior = &input.mat_mul(&self.weights) + &self.bias;
        self.output = prior.activate(self.activation);
        self.prior_activation_output = Some(prior);
        Ok(())
    }

    fn backprop(
        &mut self,
        layer_deltas: &Matrix,
    ) -> Result<Option<WeightBiasDeltas>, NetworkError> {
        let (Some(input), Some(prior)) = (&self.input, &self.prior_activation_output) else {
            return Err(NetworkError::NotPropagated("Dense层".to_string()));
        };
        let outputs = self.output_tensor.volume();
        let layer_deltas = matrix_input("Dense层的梯度", layer_deltas.clone().into(), 1, outputs)?;

        let gamma = prior
            .activate_derivative(self.activation)
            .hadamard(&layer_deltas);
        // 外积：dW[i, j] = gamma[j] · x[i]
        let weight_deltas = input.transpose().mat_mul(&gamma);
        self.layer_deltas = Some(gamma.mat_mul(&self.weights.transpose()));

        Ok(Some(WeightBiasDeltas::new(weight_deltas, gamma)))
    }

    fn apply_weight_bias_deltas(&mut self, deltas: Option<&WeightBiasDeltas>, learning_rate: f32) {
        apply_deltas(&mut self.weights, &mut self.bias, deltas, learning_rate);
    }

    fn output(&self) -> &Matrix {
        &self.output
    }

    fn prior_activation_output(&self) -> Option<&Matrix> {
        self.prior_activation_output.as_ref()
    }

    fn layer_deltas(&self) -> Option<&Matrix> {
        self.layer_deltas.as_ref()
    }

    fn parameters(&self) -> Option<(&Matrix, &Matrix)> {
        Some((&self.weights, &self.bias))
    }

    fn parameters_mut(&mut self) -> Option<(&mut Matrix, &mut Matrix)> {
        Some((&mut self.weights, &mut self.bias))
    }

    fn log_params(&self) {
        log::debug!("Dense: [W]{:?}", self.weights.as_slice());
        log::debug!("Dense: [B]{:?}", self.bias.as_slice());
    }

    fn describe(&self) -> LayerTypeDescriptor {
        LayerTypeDescriptor::Dense {
            outputs: self.output_tensor.volume(),
            activation: self.activation,
        }
    }
}
