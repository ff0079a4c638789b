/*
 * @Author       : 老董
 * @Date         : 2026-03-10
 * @Description  : 展平层：(depth, W·H) <-> (1, W·H·depth)，无激活、无参数
 */

use super::{LayerInput, TraitLayer, matrix_input};
use crate::matrix::Matrix;
use crate::nn::{LayerTypeDescriptor, NetworkError, TensorShape, WeightBiasDeltas};

#[derive(Debug, Clone)]
pub struct Flatten {
    input_tensor: TensorShape,
    output_tensor: TensorShape,
    input: Option<Matrix>,
    output: Matrix,
    layer_deltas: Option<Matrix>,
}

impl Flatten {
    pub fn new(input_tensor: TensorShape) -> Self {
        let volume = input_tensor.volume();
        Self {
            input_tensor,
            output_tensor: TensorShape::vector(volume),
            input: None,
            output: Matrix::zeros(1, volume),
            layer_deltas: None,
        }
    }
}

impl TraitLayer for Flatten {
    fn input_tensor(&self) -> TensorShape {
        self.input_tensor
    }

    fn output_tensor(&self) -> TensorShape {
        self.output_tensor
    }

    fn assign_input(&mut self, input: LayerInput) -> Result<(), NetworkError> {
        let [rows, cols] = self.input_tensor.matrix_shape();
        self.input = Some(matrix_input("展平层", input, rows, cols)?);
        Ok(())
    }

    fn forward_prop(&mut self) -> Result<(), NetworkError> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| NetworkError::NotPropagated("展平层的输入".to_string()))?;
        self.output.copy_from(input);
        Ok(())
    }

    fn backprop(
        &mut self,
        layer_deltas: &Matrix,
    ) -> Result<Option<WeightBiasDeltas>, NetworkError> {
        let [rows, cols] = self.input_tensor.matrix_shape();
        self.layer_deltas = Some(matrix_input(
            "展平层的梯度",
            layer_deltas.clone().into(),
            rows,
            cols,
        )?);
        Ok(None)
    }

    fn output(&self) -> &Matrix {
        &self.output
    }

    fn layer_deltas(&self) -> Option<&Matrix> {
        self.layer_deltas.as_ref()
    }

    fn describe(&self) -> LayerTypeDescriptor {
        LayerTypeDescriptor::Flatten
    }
}
