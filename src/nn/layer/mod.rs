/*
 * @Author       : 老董
 * @Date         : 2026-03-08
 * @Description  : Layer 模块 - 网络中的各类层
 *
 * 层的种类是固定的：Dense、Convolution、Pooling、Flatten，统一通过`TraitLayer`调用。
 * 所有层的输入、输出均为(depth, width * height)布局的矩阵；卷积层的输入来源
 * （矩阵或图像）作为策略参数`InputSource`传入，而非派生出不同的层。
 */

mod convolution;
mod dense;
mod flatten;
mod pooling;

pub use convolution::Convolution;
pub use dense::Dense;
pub use flatten::Flatten;
pub use pooling::Pooling;

use std::path::PathBuf;

use enum_dispatch::enum_dispatch;
use image::DynamicImage;

use super::{LayerTypeDescriptor, NetworkError, TensorShape, WeightBiasDeltas};
use crate::kernel::{KernelError, KernelId, KernelProgram, ThreadGroups};
use crate::matrix::Matrix;

/// 层的原始输入
#[derive(Debug, Clone)]
pub enum LayerInput {
    /// 形如(depth, width * height)的矩阵，或元素数相同的任意形状
    Matrix(Matrix),
    /// 图像（仅图像来源的卷积层接受）
    Image(DynamicImage),
    /// 图像文件路径（仅图像来源的卷积层接受）
    Path(PathBuf),
}

impl From<Matrix> for LayerInput {
    fn from(matrix: Matrix) -> Self {
        LayerInput::Matrix(matrix)
    }
}

impl From<DynamicImage> for LayerInput {
    fn from(image: DynamicImage) -> Self {
        LayerInput::Image(image)
    }
}

impl From<PathBuf> for LayerInput {
    fn from(path: PathBuf) -> Self {
        LayerInput::Path(path)
    }
}

/// 所有层共有的能力
#[enum_dispatch]
pub trait TraitLayer {
    fn input_tensor(&self) -> TensorShape;
    fn output_tensor(&self) -> TensorShape;

    /// 绑定原始输入，不做任何计算
    fn assign_input(&mut self, input: LayerInput) -> Result<(), NetworkError>;

    /// 计算`output`，并缓存激活前的值（求导时需要）
    fn forward_prop(&mut self) -> Result<(), NetworkError>;

    /// 给定对本层输出的梯度，返回对本层参数的梯度（无参数的层返回None），
    /// 并将对本层输入的梯度存入`layer_deltas`
    fn backprop(
        &mut self,
        layer_deltas: &Matrix,
    ) -> Result<Option<WeightBiasDeltas>, NetworkError>;

    /// 原地更新：`param -= learning_rate * delta`。调用方需事先保证梯度形状正确
    fn apply_weight_bias_deltas(
        &mut self,
        _deltas: Option<&WeightBiasDeltas>,
        _learning_rate: f32,
    ) {
    }

    fn output(&self) -> &Matrix;

    /// 激活前的值；无激活的层返回None
    fn prior_activation_output(&self) -> Option<&Matrix> {
        None
    }

    /// 最近一次反向传播得到的、对本层输入的梯度
    fn layer_deltas(&self) -> Option<&Matrix>;

    /// (权重, 偏置)
    fn parameters(&self) -> Option<(&Matrix, &Matrix)> {
        None
    }

    fn parameters_mut(&mut self) -> Option<(&mut Matrix, &mut Matrix)> {
        None
    }

    /// 释放本层的核函数缓冲区
    fn release(&mut self) {}

    /// 以debug级别打印参数
    fn log_params(&self) {}

    fn describe(&self) -> LayerTypeDescriptor;
}

#[enum_dispatch(TraitLayer)]
#[derive(Debug)]
pub enum Layer {
    Dense,
    Convolution,
    Pooling,
    Flatten,
}

impl Layer {
    /// 参数数量（权重 + 偏置），无参数的层为None
    pub fn param_count(&self) -> Option<usize> {
        self.parameters().map(|(w, b)| w.len() + b.len())
    }

    /// 按描述重建一个层（参数随机初始化）
    pub fn from_descriptor(
        input_tensor: TensorShape,
        descriptor: &LayerTypeDescriptor,
    ) -> Result<Layer, NetworkError> {
        let layer = match *descriptor {
            LayerTypeDescriptor::Dense {
                outputs,
                activation,
            } => Dense::new(input_tensor.volume(), outputs, activation).into(),
            LayerTypeDescriptor::Convolution {
                num_filters,
                filter_size,
                stride,
                zero_padding,
                activation,
                source,
            } => Convolution::new(
                input_tensor,
                num_filters,
                filter_size,
                stride,
                zero_padding,
                activation,
                source,
            )?
            .into(),
            LayerTypeDescriptor::Pooling { pool_size, stride } => {
                Pooling::new(input_tensor, pool_size, stride)?.into()
            }
            LayerTypeDescriptor::Flatten => Flatten::new(input_tensor).into(),
        };
        Ok(layer)
    }
}

/*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓各层共用的辅助函数↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
/// 滑动窗口每个轴上的输出尺寸：`ceil((len + 2·pad - (window - 1)) / stride)`，
/// 非正时返回None
pub(crate) fn window_output_len(
    len: usize,
    window: usize,
    stride: usize,
    padding: usize,
) -> Option<usize> {
    if window == 0 || stride == 0 {
        return None;
    }
    let span = (len + 2 * padding) as i64 - (window as i64 - 1);
    if span <= 0 {
        return None;
    }
    Some((span as usize).div_ceil(stride))
}

/// 将矩阵输入整理为指定形状；元素数不符则报错
pub(crate) fn matrix_input(
    layer_name: &str,
    input: LayerInput,
    rows: usize,
    cols: usize,
) -> Result<Matrix, NetworkError> {
    match input {
        LayerInput::Matrix(matrix) if matrix.len() == rows * cols => {
            if matrix.shape() == [rows, cols] {
                Ok(matrix)
            } else {
                Ok(matrix.reshape(rows, cols))
            }
        }
        LayerInput::Matrix(matrix) => Err(NetworkError::InvalidInput(format!(
            "{layer_name}需要{}个元素的输入，实际得到形状为{:?}的矩阵",
            rows * cols,
            matrix.shape()
        ))),
        _ => Err(NetworkError::InvalidInput(format!(
            "{layer_name}只接受矩阵输入"
        ))),
    }
}

/// 按元素总数选择核函数档位后调度，返回是否真正执行了调度。
/// 超出最大档位时记录错误并跳过本次调度（返回`false`），调用方须保持自身缓存不变
pub(crate) fn dispatch_bucketed(
    program: &mut KernelProgram,
    kernels: &[KernelId; 3],
    total: usize,
    grid: impl FnOnce(usize) -> [usize; 3],
) -> Result<bool, KernelError> {
    match ThreadGroups::for_elements(total) {
        Ok(threads) => {
            let [x, y, z] = grid(threads.groups);
            program.dispatch(kernels[threads.bucket.index()], x, y, z)?;
            Ok(true)
        }
        Err(e @ KernelError::Capacity { .. }) => {
            log::error!("{}: {e}，本次调度已跳过", program.name());
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// 查找小/中/大三个档位的核函数
pub(crate) fn find_bucket_kernels(
    program: &KernelProgram,
    family: &str,
) -> Result<[KernelId; 3], KernelError> {
    use crate::kernel::SizeBucket;
    Ok([
        program.find_kernel(&SizeBucket::Small.kernel_name(family))?,
        program.find_kernel(&SizeBucket::Medium.kernel_name(family))?,
        program.find_kernel(&SizeBucket::Large.kernel_name(family))?,
    ])
}

/// `param -= learning_rate * delta`
pub(crate) fn apply_deltas(
    weights: &mut Matrix,
    bias: &mut Matrix,
    deltas: Option<&WeightBiasDeltas>,
    learning_rate: f32,
) {
    if let Some(deltas) = deltas {
        weights.scaled_sub_assign(&deltas.weight_deltas, learning_rate);
        bias.scaled_sub_assign(&deltas.bias_deltas, learning_rate);
    }
}
/*↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑各层共用的辅助函数↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑*/
