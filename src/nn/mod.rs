/*
 * @Author       : 老董
 * @Date         : 2026-03-08
 * @Description  : 负责卷积神经网络（CNN）的构建、前向/反向传播与参数更新
 */

mod cost;
mod descriptor;
mod error;
mod evaluation;
pub mod layer;
mod network;
mod shape;

pub use cost::{CostFunction, softmax};
pub use descriptor::{DESCRIPTOR_VERSION, LayerDescriptor, LayerTypeDescriptor, NetworkDescriptor};
pub use error::NetworkError;
pub use evaluation::{BackPropagationEvaluation, WeightBiasDeltas};
pub use layer::{Convolution, Dense, Flatten, Layer, LayerInput, Pooling, TraitLayer};
pub use network::{Network, PARAMETER_FILE_EXTENSION};
pub use shape::TensorShape;

pub use crate::kernel::InputSource;
pub use crate::matrix::Activation;

#[cfg(test)]
mod tests;
