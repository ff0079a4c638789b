/*
 * @Author       : 老董
 * @Date         : 2026-03-11
 * @Description  : 网络描述符（Network Descriptor）
 *                 网络拓扑的可序列化表示，用于保存配置、重建网络和调试输出
 */

use serde::{Deserialize, Serialize};

use super::{CostFunction, TensorShape};
use crate::kernel::InputSource;
use crate::matrix::Activation;

/// 当前描述符格式版本
pub const DESCRIPTOR_VERSION: &str = "1.0";

/// 网络的可序列化描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    /// 格式版本（用于向后兼容）
    pub version: String,
    /// 网络输入尺寸（第一层的输入）
    pub input_tensor: TensorShape,
    pub cost: CostFunction,
    /// 按顺序排列的层描述
    pub layers: Vec<LayerDescriptor>,
    /// 参数总数
    pub total_params: usize,
}

/// 层描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub index: usize,
    pub layer_type: LayerTypeDescriptor,
    pub input_tensor: TensorShape,
    pub output_tensor: TensorShape,
    /// 参数数量（无参数的层省略）
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub param_count: Option<usize>,
}

/// 层类型描述（包含类型特定参数）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LayerTypeDescriptor {
    Dense {
        outputs: usize,
        #[serde(default)]
        activation: Activation,
    },
    Convolution {
        num_filters: usize,
        filter_size: usize,
        stride: usize,
        zero_padding: usize,
        #[serde(default)]
        activation: Activation,
        #[serde(default)]
        source: InputSource,
    },
    Pooling {
        pool_size: usize,
        stride: usize,
    },
    Flatten,
}

impl NetworkDescriptor {
    /// 序列化为带缩进的JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
