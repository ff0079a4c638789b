/*
 * @Author       : 老董
 * @Date         : 2026-03-11
 * @Description  : 网络：按顺序排列的层，负责前向/反向传播的编排与参数更新
 *
 * 数据严格单向流动：输入 -> 第0层 -> ... -> 第N-1层 -> 代价，
 * 再反向：代价导数 -> 第N-1层 -> ... -> 第0层。层之间传递的是输出的副本。
 */

mod model_io;

pub use model_io::PARAMETER_FILE_EXTENSION;

use super::{
    BackPropagationEvaluation, CostFunction, DESCRIPTOR_VERSION, Layer, LayerDescriptor,
    LayerInput, NetworkDescriptor, NetworkError, TraitLayer,
};
use crate::matrix::Matrix;

/// 神经网络。层只能追加，不能移除或重排；网络析构时一并释放各层的核函数缓冲区
#[derive(Debug, Default)]
pub struct Network {
    layers: Vec<Layer>,
    cost: CostFunction,
}

impl Network {
    pub fn new(cost: CostFunction) -> Self {
        Self {
            layers: Vec::new(),
            cost,
        }
    }

    /// 按描述重建网络（参数随机初始化）
    pub fn from_descriptor(descriptor: &NetworkDescriptor) -> Result<Self, NetworkError> {
        let mut network = Network::new(descriptor.cost);
        let mut input_tensor = descriptor.input_tensor;
        for layer_descriptor in &descriptor.layers {
            let layer = Layer::from_descriptor(input_tensor, &layer_descriptor.layer_type)?;
            input_tensor = layer.output_tensor();
            network.push(layer)?;
        }
        Ok(network)
    }

    /// 追加一层。新层的输入形状须等于上一层的输出形状
    pub fn push(&mut self, layer: impl Into<Layer>) -> Result<&mut Self, NetworkError> {
        let layer = layer.into();
        if let Some(last) = self.layers.last() {
            let expected = last.output_tensor();
            let got = layer.input_tensor();
            if expected != got {
                return Err(NetworkError::ShapeMismatch {
                    layer_index: self.layers.len(),
                    expected,
                    got,
                });
            }
        }
        self.layers.push(layer);
        Ok(self)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    /// 可变地访问某一层，例如手动设置参数；层的形状不可更改
    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn cost(&self) -> CostFunction {
        self.cost
    }

    pub fn set_cost(&mut self, cost: CostFunction) {
        self.cost = cost;
    }

    /// 最后一层的输出
    pub fn output(&self) -> Option<&Matrix> {
        self.layers.last().map(|layer| layer.output())
    }

    /// 前向传播：输入只赋给第0层，之后每层的输出复制给下一层，返回最后一层的输出
    pub fn forward_propagate(
        &mut self,
        input: impl Into<LayerInput>,
    ) -> Result<&Matrix, NetworkError> {
        let Some(last) = self.layers.len().checked_sub(1) else {
            log::error!("网络中没有任何层，无法前向传播");
            return Err(NetworkError::EmptyNetwork);
        };

        self.layers[0].assign_input(input.into())?;
        for i in 1..self.layers.len() {
            self.layers[i - 1].forward_prop()?;
            let output = self.layers[i - 1].output().clone();
            self.layers[i].assign_input(LayerInput::Matrix(output))?;
        }
        self.layers[last].forward_prop()?;
        Ok(self.layers[last].output())
    }

    /// 对单个样本做前向+反向传播，返回代价与每层的梯度（不更新参数）
    pub fn backpropagation(
        &mut self,
        input: impl Into<LayerInput>,
        expected: &Matrix,
    ) -> Result<BackPropagationEvaluation, NetworkError> {
        let output = self.forward_propagate(input)?.clone();
        if output.len() != expected.len() {
            return Err(NetworkError::InvalidInput(format!(
                "期望输出的元素数{}与网络输出的元素数{}不一致",
                expected.len(),
                output.len()
            )));
        }
        let expected = expected.reshape(output.rows(), output.cols());

        let error_cost = self.cost.error_cost(&output, &expected);
        let cost_derivative = self.cost.derivative(&output, &expected);

        let last = self.layers.len() - 1;
        let mut deltas = vec![None; self.layers.len()];
        deltas[last] = self.layers[last].backprop(&cost_derivative)?;
        for i in (0..last).rev() {
            let upstream = self.layers[i + 1]
                .layer_deltas()
                .cloned()
                .ok_or_else(|| NetworkError::NotPropagated(format!("第{}层", i + 1)))?;
            deltas[i] = self.layers[i].backprop(&upstream)?;
        }

        Ok(BackPropagationEvaluation {
            error_cost,
            deltas,
            output,
            expected,
        })
    }

    /// 按评估结果更新全部层的参数。先校验所有层的梯度形状，
    /// 全部通过后才开始更新，因此一次调用要么全部生效、要么都不生效
    pub fn apply_weight_bias_deltas(
        &mut self,
        evaluation: &BackPropagationEvaluation,
        learning_rate: f32,
    ) -> Result<(), NetworkError> {
        if evaluation.deltas.len() != self.layers.len() {
            return Err(NetworkError::DeltaCount {
                expected: self.layers.len(),
                got: evaluation.deltas.len(),
            });
        }
        for (layer_index, (layer, deltas)) in
            self.layers.iter().zip(&evaluation.deltas).enumerate()
        {
            let expected = layer
                .parameters()
                .map(|(weights, bias)| [weights.shape(), bias.shape()]);
            let got = deltas.as_ref().map(|d| d.shapes());
            if expected != got {
                return Err(NetworkError::DeltaShape {
                    layer_index,
                    expected,
                    got,
                });
            }
        }

        for (layer, deltas) in self.layers.iter_mut().zip(&evaluation.deltas) {
            layer.apply_weight_bias_deltas(deltas.as_ref(), learning_rate);
        }
        Ok(())
    }

    /// 参数总数
    pub fn param_count(&self) -> usize {
        self.layers.iter().filter_map(Layer::param_count).sum()
    }

    /// 网络拓扑的可序列化描述
    pub fn describe(&self) -> NetworkDescriptor {
        let layers = self
            .layers
            .iter()
            .enumerate()
            .map(|(index, layer)| LayerDescriptor {
                index,
                layer_type: layer.describe(),
                input_tensor: layer.input_tensor(),
                output_tensor: layer.output_tensor(),
                param_count: layer.param_count(),
            })
            .collect();
        NetworkDescriptor {
            version: DESCRIPTOR_VERSION.to_string(),
            input_tensor: self
                .layers
                .first()
                .map(|layer| layer.input_tensor())
                .unwrap_or_default(),
            cost: self.cost,
            layers,
            total_params: self.param_count(),
        }
    }

    /// 以debug级别打印每层参数
    pub fn log_params(&self) {
        for layer in &self.layers {
            layer.log_params();
        }
    }

    /// 释放所有层的核函数缓冲区
    pub fn release(&mut self) {
        for layer in &mut self.layers {
            layer.release();
        }
    }
}

impl Drop for Network {
    fn drop(&mut self) {
        self.release();
    }
}
