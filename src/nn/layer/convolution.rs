/*
 * @Author       : 老董
 * @Date         : 2026-03-09
 * @Description  : 卷积层（输入来源为矩阵或图像）
 *
 * 前向：经窗口展开（im2col）核函数把输入变为展开矩阵U（K·K·Din, Wo·Ho），
 *       z = F · U + b，y = f(z)。其中F形如(Dout, K·K·Din)，b形如(Dout, Wo·Ho)。
 *
 * 反向（两次相互独立的卷积）：
 * 1. 权重梯度：gamma = f'(z) ⊙ δ，先在相邻元素间插入(S-1)个零（膨胀），
 *    再与原始输入做窗口展开得到WU（Wd·Hd, Din·K·K），dF = gamma_d · WU，db = gamma；
 * 2. 上游梯度：卷积核交换输入/输出通道并旋转180°得到FL（Din, Dout·K·K），
 *    对膨胀后的gamma以填充(K-1-P)、步长1做窗口展开得到LU（Dout·K·K, W·H），δ_in = FL · LU。
 *
 * 每个卷积层独占三个核函数程序：前向、权重梯度、上游梯度。
 */

use image::DynamicImage;
use image::imageops::FilterType;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{
    LayerInput, TraitLayer, apply_deltas, dispatch_bucketed, find_bucket_kernels, matrix_input,
    window_output_len,
};
use crate::kernel::{ComputeBuffer, InputSource, KernelId, KernelProgram, WindowGeometry};
use crate::matrix::{Activation, Matrix};
use crate::nn::{LayerTypeDescriptor, NetworkError, TensorShape, WeightBiasDeltas};

/// 卷积层
#[derive(Debug)]
pub struct Convolution {
    input_tensor: TensorShape,
    output_tensor: TensorShape,
    filter_size: usize,
    stride: usize,
    zero_padding: usize,
    activation: Activation,
    source: InputSource,

    /// (Dout, K·K·Din)
    filter: Matrix,
    /// (Dout, Wo·Ho)
    bias: Matrix,

    input: Option<Matrix>,
    prior_activation_output: Option<Matrix>,
    output: Matrix,
    layer_deltas: Option<Matrix>,

    // 核函数程序
    filter_operation: KernelProgram,
    backprop_weight_operation: KernelProgram,
    backprop_layer_deltas_operation: KernelProgram,
    forward_kernels: [KernelId; 3],
    weight_kernels: [KernelId; 3],
    layer_delta_kernels: [KernelId; 3],
    dilate_kernel: KernelId,
    flip_kernel: KernelId,
}

impl Convolution {
    /// 创建卷积层，卷积核与偏置在[-1, 1]内均匀随机初始化。
    ///
    /// # 参数
    /// - `input_tensor`: 输入尺寸 (W, H, Din)
    /// - `num_filters`: 卷积核个数，即输出深度Dout
    /// - `filter_size`: 卷积核边长K
    /// - `stride`: 步长S
    /// - `zero_padding`: 四周的零填充P
    /// - `activation`: 激活函数；使用Sigmoid时会记录一条警告
    /// - `source`: 输入来源（矩阵或图像）
    pub fn new(
        input_tensor: TensorShape,
        num_filters: usize,
        filter_size: usize,
        stride: usize,
        zero_padding: usize,
        activation: Activation,
        source: InputSource,
    ) -> Result<Self, NetworkError> {
        let output_width =
            window_output_len(input_tensor.width, filter_size, stride, zero_padding);
        let output_height =
            window_output_len(input_tensor.height, filter_size, stride, zero_padding);
        let (Some(output_width), Some(output_height)) = (output_width, output_height) else {
            return Err(NetworkError::InvalidConfiguration(format!(
                "卷积输出尺寸无效：输入{input_tensor}，核{filter_size}，步长{stride}，填充{zero_padding}"
            )));
        };
        if num_filters == 0 || input_tensor.depth == 0 {
            return Err(NetworkError::InvalidConfiguration(
                "卷积层的输入深度与卷积核个数都须大于0".to_string(),
            ));
        }
        if source == InputSource::Texture && input_tensor.depth > 4 {
            return Err(NetworkError::InvalidConfiguration(format!(
                "图像输入的深度至多为4（RGBA），得到{}",
                input_tensor.depth
            )));
        }
        if activation == Activation::Sigmoid {
            log::warn!("Sigmoid用于卷积层时训练效果较差（用于全连接层则无妨）");
        }

        let output_tensor = TensorShape::new(output_width, output_height, num_filters);
        let k = filter_size;
        let din = input_tensor.depth;
        let dout = num_filters;
        let dilated_width = output_width + (output_width - 1) * (stride - 1);
        let dilated_height = output_height + (output_height - 1) * (stride - 1);

        // 前向：输入 -> 展开矩阵
        let forward_geometry = WindowGeometry {
            input_width: input_tensor.width,
            input_height: input_tensor.height,
            depth: din,
            window_width: k,
            window_height: k,
            padding: zero_padding as i64,
            stride,
            output_width,
            output_height,
        };
        let mut filter_operation = KernelProgram::new("FilterOperation");
        filter_operation.set_window_geometry(&forward_geometry);
        filter_operation.set_buffer(
            source.buffer_name(),
            ComputeBuffer::new(input_tensor.volume()),
        );
        filter_operation.set_buffer(
            "ConvolutionTensor",
            ComputeBuffer::new(forward_geometry.unrolled_len()),
        );
        let forward_kernels = find_bucket_kernels(
            &filter_operation,
            &format!("FilterOperation{}", source.kernel_suffix()),
        )?;

        // 权重梯度：膨胀后的gamma作为“窗口”，输出即卷积核尺寸
        let weight_geometry = WindowGeometry {
            input_width: input_tensor.width,
            input_height: input_tensor.height,
            depth: din,
            window_width: dilated_width,
            window_height: dilated_height,
            padding: zero_padding as i64,
            stride: 1,
            output_width: k,
            output_height: k,
        };
        let mut backprop_weight_operation = KernelProgram::new("BackpropWeightOperation");
        backprop_weight_operation.set_window_geometry(&weight_geometry);
        backprop_weight_operation.set_int("NonDialatedWidth", output_width as i32);
        backprop_weight_operation.set_int("NonDialatedHeight", output_height as i32);
        backprop_weight_operation.set_int("DStride", (stride - 1) as i32);
        backprop_weight_operation.set_int("OutputDepth", dout as i32);
        backprop_weight_operation.set_buffer(
            source.buffer_name(),
            ComputeBuffer::new(input_tensor.volume()),
        );
        backprop_weight_operation.set_buffer(
            "NonDialatedOutput",
            ComputeBuffer::new(output_tensor.volume()),
        );
        backprop_weight_operation.set_buffer(
            "DialatedOutput",
            ComputeBuffer::new(dout * dilated_width * dilated_height),
        );
        backprop_weight_operation.set_buffer(
            "ConvolutionTensor",
            ComputeBuffer::new(weight_geometry.unrolled_len()),
        );
        let weight_kernels = find_bucket_kernels(
            &backprop_weight_operation,
            &format!("BackPropFilterOperation{}", source.kernel_suffix()),
        )?;
        let dilate_kernel = backprop_weight_operation.find_kernel("DialateMatrix")?;

        // 上游梯度：填充取前向填充的补(K-1-P)，可能为负
        let layer_delta_geometry = WindowGeometry {
            input_width: dilated_width,
            input_height: dilated_height,
            depth: dout,
            window_width: k,
            window_height: k,
            padding: (k as i64 - 1) - zero_padding as i64,
            stride: 1,
            output_width: input_tensor.width,
            output_height: input_tensor.height,
        };
        let mut backprop_layer_deltas_operation =
            KernelProgram::new("BackpropLayerDeltasOperation");
        backprop_layer_deltas_operation.set_window_geometry(&layer_delta_geometry);
        backprop_layer_deltas_operation.set_int("FilterInputDepth", din as i32);
        backprop_layer_deltas_operation.set_int("FilterOutputDepth", dout as i32);
        backprop_layer_deltas_operation.set_buffer(
            InputSource::Matrix.buffer_name(),
            ComputeBuffer::new(dout * dilated_width * dilated_height),
        );
        backprop_layer_deltas_operation.set_buffer(
            "ConvolutionTensor",
            ComputeBuffer::new(layer_delta_geometry.unrolled_len()),
        );
        backprop_layer_deltas_operation
            .set_buffer("FilterInput", ComputeBuffer::new(dout * k * k * din));
        backprop_layer_deltas_operation
            .set_buffer("FlippedFilter", ComputeBuffer::new(dout * k * k * din));
        let layer_delta_kernels =
            find_bucket_kernels(&backprop_layer_deltas_operation, "FilterOperationMatrix")?;
        let flip_kernel = backprop_layer_deltas_operation.find_kernel("FlipFilter")?;

        Ok(Self {
            input_tensor,
            output_tensor,
            filter_size,
            stride,
            zero_padding,
            activation,
            source,
            filter: Matrix::new_random(-1.0, 1.0, dout, k * k * din),
            bias: Matrix::new_random(-1.0, 1.0, dout, output_tensor.area()),
            input: None,
            prior_activation_output: None,
            output: Matrix::zeros(dout, output_tensor.area()),
            layer_deltas: None,
            filter_operation,
            backprop_weight_operation,
            backprop_layer_deltas_operation,
            forward_kernels,
            weight_kernels,
            layer_delta_kernels,
            dilate_kernel,
            flip_kernel,
        })
    }

    /// 用固定种子重新初始化参数
    pub fn seeded(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let [rows, cols] = self.filter.shape();
        self.filter = Matrix::new_random_with_rng(-1.0, 1.0, rows, cols, &mut rng);
        let [rows, cols] = self.bias.shape();
        self.bias = Matrix::new_random_with_rng(-1.0, 1.0, rows, cols, &mut rng);
        self
    }

    pub fn filter(&self) -> &Matrix {
        &self.filter
    }

    pub fn bias(&self) -> &Matrix {
        &self.bias
    }

    pub fn filter_size(&self) -> usize {
        self.filter_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn zero_padding(&self) -> usize {
        self.zero_padding
    }

    pub fn source(&self) -> InputSource {
        self.source
    }

    fn dilated_size(&self) -> (usize, usize) {
        let (w, h) = (self.output_tensor.width, self.output_tensor.height);
        (w + (w - 1) * (self.stride - 1), h + (h - 1) * (self.stride - 1))
    }

    /// 把图像解码为(depth, W·H)的矩阵：尺寸不符时按最近邻缩放，像素值归一化到[0, 1]
    fn decode_image(&self, image: &DynamicImage) -> Matrix {
        let (width, height) = (self.input_tensor.width as u32, self.input_tensor.height as u32);
        let mut rgba = image.to_rgba8();
        if rgba.dimensions() != (width, height) {
            rgba = image::imageops::resize(&rgba, width, height, FilterType::Nearest);
        }
        let area = self.input_tensor.area();
        let mut data = vec![0.0; self.input_tensor.volume()];
        for (i, pixel) in rgba.pixels().enumerate() {
            for c in 0..self.input_tensor.depth {
                data[c * area + i] = pixel.0[c] as f32 / 255.0;
            }
        }
        Matrix::new(&data, self.input_tensor.depth, area)
    }
}

impl TraitLayer for Convolution {
    fn input_tensor(&self) -> TensorShape {
        self.input_tensor
    }

    fn output_tensor(&self) -> TensorShape {
        self.output_tensor
    }

    fn assign_input(&mut self, input: LayerInput) -> Result<(), NetworkError> {
        let [rows, cols] = self.input_tensor.matrix_shape();
        let matrix = match (self.source, input) {
            (InputSource::Texture, LayerInput::Image(image)) => self.decode_image(&image),
            (InputSource::Texture, LayerInput::Path(path)) => {
                let image = image::open(&path)?;
                self.decode_image(&image)
            }
            (_, input) => matrix_input("卷积层", input, rows, cols)?,
        };
        self.input = Some(matrix);
        Ok(())
    }

    fn forward_prop(&mut self) -> Result<(), NetworkError> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| NetworkError::NotPropagated("卷积层的输入".to_string()))?;
        let k = self.filter_size;
        let din = self.input_tensor.depth;

        self.filter_operation
            .write_buffer(self.source.buffer_name(), input.as_slice())?;
        let dispatched = dispatch_bucketed(
            &mut self.filter_operation,
            &self.forward_kernels,
            self.output_tensor.area(),
            |groups| [groups, k * k, din],
        )?;
        if !dispatched {
            // 输出与激活前的缓存均保持上一次的结果
            return Ok(());
        }
        let mut unrolled = Matrix::zeros(k * k * din, self.output_tensor.area());
        self.filter_operation
            .read_buffer("ConvolutionTensor", unrolled.as_slice_mut())?;

        let prior = &self.filter.mat_mul(&unrolled) + &self.bias;
        self.output = prior.activate(self.activation);
        self.prior_activation_output = Some(prior);
        Ok(())
    }

    fn backprop(
        &mut self,
        layer_deltas: &Matrix,
    ) -> Result<Option<WeightBiasDeltas>, NetworkError> {
        let (Some(input), Some(prior)) = (&self.input, &self.prior_activation_output) else {
            return Err(NetworkError::NotPropagated("卷积层".to_string()));
        };
        let k = self.filter_size;
        let din = self.input_tensor.depth;
        let dout = self.output_tensor.depth;
        let (out_w, out_h) = (self.output_tensor.width, self.output_tensor.height);
        let (dilated_w, dilated_h) = self.dilated_size();
        let [rows, cols] = self.output_tensor.matrix_shape();
        let layer_deltas = matrix_input("卷积层的梯度", layer_deltas.clone().into(), rows, cols)?;

        let gamma = prior
            .activate_derivative(self.activation)
            .hadamard(&layer_deltas);

        // 1. 膨胀gamma
        let weight_op = &mut self.backprop_weight_operation;
        weight_op.write_buffer("NonDialatedOutput", gamma.as_slice())?;
        weight_op.dispatch(self.dilate_kernel, out_w / 8 + 1, out_h / 8 + 1, dout)?;
        let mut dilated = Matrix::zeros(dout, dilated_w * dilated_h);
        weight_op.read_buffer("DialatedOutput", dilated.as_slice_mut())?;

        // 2. 权重梯度；调度被跳过时本次不更新任何参数
        weight_op.write_buffer(self.source.buffer_name(), input.as_slice())?;
        let weight_dispatched = dispatch_bucketed(
            weight_op,
            &self.weight_kernels,
            dilated_w * dilated_h,
            |groups| [k * k, groups, din],
        )?;
        let deltas = if weight_dispatched {
            let mut unrolled = Matrix::zeros(dilated_w * dilated_h, din * k * k);
            weight_op.read_buffer("ConvolutionTensor", unrolled.as_slice_mut())?;
            WeightBiasDeltas::new(dilated.mat_mul(&unrolled), gamma)
        } else {
            let [filter_rows, filter_cols] = self.filter.shape();
            let [bias_rows, bias_cols] = self.bias.shape();
            WeightBiasDeltas::new(
                Matrix::zeros(filter_rows, filter_cols),
                Matrix::zeros(bias_rows, bias_cols),
            )
        };

        // 3. 上游梯度
        let layer_op = &mut self.backprop_layer_deltas_operation;
        layer_op.write_buffer("FilterInput", self.filter.as_slice())?;
        layer_op.dispatch(self.flip_kernel, din, dout, 1)?;
        let mut flipped = Matrix::zeros(din, dout * k * k);
        layer_op.read_buffer("FlippedFilter", flipped.as_slice_mut())?;

        layer_op.write_buffer(InputSource::Matrix.buffer_name(), dilated.as_slice())?;
        let layer_dispatched = dispatch_bucketed(
            layer_op,
            &self.layer_delta_kernels,
            self.input_tensor.area(),
            |groups| [groups, k * k, dout],
        )?;
        if layer_dispatched {
            let mut unrolled = Matrix::zeros(dout * k * k, self.input_tensor.area());
            layer_op.read_buffer("ConvolutionTensor", unrolled.as_slice_mut())?;
            self.layer_deltas = Some(flipped.mat_mul(&unrolled));
        }

        Ok(Some(deltas))
    }

    fn apply_weight_bias_deltas(&mut self, deltas: Option<&WeightBiasDeltas>, learning_rate: f32) {
        apply_deltas(&mut self.filter, &mut self.bias, deltas, learning_rate);
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
        Some((&self.filter, &self.bias))
    }

    fn parameters_mut(&mut self) -> Option<(&mut Matrix, &mut Matrix)> {
        Some((&mut self.filter, &mut self.bias))
    }

    fn release(&mut self) {
        self.filter_operation.release();
        self.backprop_weight_operation.release();
        self.backprop_layer_deltas_operation.release();
    }

    fn log_params(&self) {
        log::debug!("Conv: [W]{:?}", self.filter.as_slice());
        log::debug!("Conv: [B]{:?}", self.bias.as_slice());
    }

    fn describe(&self) -> LayerTypeDescriptor {
        LayerTypeDescriptor::Convolution {
            num_filters: self.output_tensor.depth,
            filter_size: self.filter_size,
            stride: self.stride,
            zero_padding: self.zero_padding,
            activation: self.activation,
            source: self.source,
        }
    }
}
