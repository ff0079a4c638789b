/*
 * @Author       : 老董
 * @Date         : 2026-03-10
 * @Description  : 最大池化层
 *
 * 前向时缓存完整输入，反向时据此重新求出每个窗口最大值的位置，
 * 只把梯度送往该位置（argmax路由），其余位置为零。无参数。
 */

use super::{LayerInput, TraitLayer, dispatch_bucketed, find_bucket_kernels, matrix_input};
use crate::kernel::{ComputeBuffer, KernelId, KernelProgram, WindowGeometry};
use crate::matrix::Matrix;
use crate::nn::{LayerTypeDescriptor, NetworkError, TensorShape, WeightBiasDeltas};

/// 最大池化层
#[derive(Debug)]
pub struct Pooling {
    input_tensor: TensorShape,
    output_tensor: TensorShape,
    pool_size: usize,
    stride: usize,
    input: Option<Matrix>,
    output: Matrix,
    layer_deltas: Option<Matrix>,
    pooling_operation: KernelProgram,
    forward_kernels: [KernelId; 3],
    backward_kernels: [KernelId; 3],
}

/// 池化每个轴上的输出尺寸：`ceil((len - (pool - 1)) / stride)`
fn pool_output_len(len: usize, pool_size: usize, stride: usize) -> Option<usize> {
    if pool_size == 0 || stride == 0 || pool_size > len {
        return None;
    }
    Some((len - (pool_size - 1)).div_ceil(stride))
}

impl Pooling {
    pub fn new(
        input_tensor: TensorShape,
        pool_size: usize,
        stride: usize,
    ) -> Result<Self, NetworkError> {
        let (Some(output_width), Some(output_height)) = (
            pool_output_len(input_tensor.width, pool_size, stride),
            pool_output_len(input_tensor.height, pool_size, stride),
        ) else {
            return Err(NetworkError::InvalidConfiguration(format!(
                "池化输出尺寸无效：输入{input_tensor}，窗口{pool_size}，步长{stride}"
            )));
        };
        let output_tensor = TensorShape::new(output_width, output_height, input_tensor.depth);

        let geometry = WindowGeometry {
            input_width: input_tensor.width,
            input_height: input_tensor.height,
            depth: input_tensor.depth,
            window_width: pool_size,
            window_height: pool_size,
            padding: 0,
            stride,
            output_width,
            output_height,
        };
        let mut pooling_operation = KernelProgram::new("PoolingOperation");
        pooling_operation.set_window_geometry(&geometry);
        pooling_operation.set_buffer("PoolInput", ComputeBuffer::new(input_tensor.volume()));
        pooling_operation.set_buffer("PoolOutput", ComputeBuffer::new(output_tensor.volume()));
        pooling_operation.set_buffer("PoolDeltas", ComputeBuffer::new(output_tensor.volume()));
        pooling_operation.set_buffer("LayerDeltas", ComputeBuffer::new(input_tensor.volume()));
        let forward_kernels = find_bucket_kernels(&pooling_operation, "PoolingOperation")?;
        let backward_kernels =
            find_bucket_kernels(&pooling_operation, "BackPropPoolingOperation")?;

        Ok(Self {
            input_tensor,
            output_tensor,
            pool_size,
            stride,
            input: None,
            output: Matrix::zeros(output_tensor.depth, output_tensor.area()),
            layer_deltas: None,
            pooling_operation,
            forward_kernels,
            backward_kernels,
        })
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl TraitLayer for Pooling {
    fn input_tensor(&self) -> TensorShape {
        self.input_tensor
    }

    fn output_tensor(&self) -> TensorShape {
        self.output_tensor
    }

    fn assign_input(&mut self, input: LayerInput) -> Result<(), NetworkError> {
        let [rows, cols] = self.input_tensor.matrix_shape();
        self.input = Some(matrix_input("池化层", input, rows, cols)?);
        Ok(())
    }

    fn forward_prop(&mut self) -> Result<(), NetworkError> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| NetworkError::NotPropagated("池化层的输入".to_string()))?;
        let depth = self.input_tensor.depth;

        self.pooling_operation
            .write_buffer("PoolInput", input.as_slice())?;
        let dispatched = dispatch_bucketed(
            &mut self.pooling_operation,
            &self.forward_kernels,
            self.output_tensor.area(),
            |groups| [groups, 1, depth],
        )?;
        if dispatched {
            self.pooling_operation
                .read_buffer("PoolOutput", self.output.as_slice_mut())?;
        }
        Ok(())
    }

    fn backprop(
        &mut self,
        layer_deltas: &Matrix,
    ) -> Result<Option<WeightBiasDeltas>, NetworkError> {
        if self.input.is_none() {
            return Err(NetworkError::NotPropagated("池化层".to_string()));
        }
        let [rows, cols] = self.output_tensor.matrix_shape();
        let layer_deltas = matrix_input("池化层的梯度", layer_deltas.clone().into(), rows, cols)?;
        let depth = self.input_tensor.depth;

        // 输入已在前向时写入PoolInput
        self.pooling_operation
            .write_buffer("PoolDeltas", layer_deltas.as_slice())?;
        let dispatched = dispatch_bucketed(
            &mut self.pooling_operation,
            &self.backward_kernels,
            self.output_tensor.area(),
            |groups| [groups, 1, depth],
        )?;
        if !dispatched {
            return Ok(None);
        }
        let mut deltas = Matrix::zeros(depth, self.input_tensor.area());
        self.pooling_operation
            .read_buffer("LayerDeltas", deltas.as_slice_mut())?;
        self.layer_deltas = Some(deltas);

        Ok(None)
    }

    fn output(&self) -> &Matrix {
        &self.output
    }

    fn layer_deltas(&self) -> Option<&Matrix> {
        self.layer_deltas.as_ref()
    }

    fn release(&mut self) {
        self.pooling_operation.release();
    }

    fn describe(&self) -> LayerTypeDescriptor {
        LayerTypeDescriptor::Pooling {
            pool_size: self.pool_size,
            stride: self.stride,
        }
    }
}
