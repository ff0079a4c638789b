/*
 * @Author       : 老董
 * @Date         : 2026-03-09
 * @Description  : Convolution layer 单元测试
 *
 * 包括手算的3x3输入、2x2卷积核的前向/反向结果，以及步长2、填充1时
 * 对卷积核、偏置、输入的有限差分梯度检验（覆盖膨胀与前后向填充不对称）
 */

use approx::assert_abs_diff_eq;
use image::{DynamicImage, Rgba, RgbaImage};

use super::weighted_loss;
use crate::assert_err;
use crate::kernel::{InputSource, MAX_ELEMENTS_PER_DISPATCH};
use crate::matrix::{Activation, Matrix};
use crate::nn::{Convolution, LayerInput, NetworkError, TensorShape, TraitLayer};

const EPSILON: f32 = 1e-2;
const TOLERANCE: f64 = 1e-3;

/// 3x3单通道输入，2x2卷积核[1, 2; 3, 4]，偏置为0，恒等激活
fn literal_layer() -> Result<Convolution, NetworkError> {
    let mut layer = Convolution::new(
        TensorShape::new(3, 3, 1),
        1,
        2,
        1,
        0,
        Activation::Identity,
        InputSource::Matrix,
    )?;
    let (filter, bias) = layer.parameters_mut().unwrap();
    *filter = Matrix::new(&[1., 2., 3., 4.], 1, 4);
    *bias = Matrix::zeros(1, 4);
    Ok(layer)
}

#[rustfmt::skip]
fn literal_input() -> Matrix {
    Matrix::new(&[
        1., 2., 3.,
        4., 5., 6.,
        7., 8., 9.,
    ], 1, 9)
}

#[test]
fn test_convolution_output_tensor() -> Result<(), NetworkError> {
    // ceil((W + 2P - (K - 1)) / S)
    let layer = Convolution::new(
        TensorShape::new(5, 4, 2),
        3,
        3,
        2,
        1,
        Activation::Tanh,
        InputSource::Matrix,
    )?;
    assert_eq!(layer.output_tensor(), TensorShape::new(3, 2, 3));
    assert_eq!(layer.filter().shape(), [3, 18]);
    assert_eq!(layer.bias().shape(), [3, 6]);

    assert_err!(
        Convolution::new(
            TensorShape::new(2, 2, 1),
            1,
            4,
            1,
            0,
            Activation::ReLU,
            InputSource::Matrix
        ),
        NetworkError::InvalidConfiguration(_)
    );
    assert_err!(
        Convolution::new(
            TensorShape::new(4, 4, 5),
            1,
            2,
            1,
            0,
            Activation::ReLU,
            InputSource::Texture
        ),
        NetworkError::InvalidConfiguration(_)
    );
    Ok(())
}

#[test]
fn test_convolution_forward_literal() -> Result<(), NetworkError> {
    let mut layer = literal_layer()?;
    layer.assign_input(LayerInput::Matrix(literal_input()))?;
    layer.forward_prop()?;

    #[rustfmt::skip]
    let expected = Matrix::new(&[
        37., 47.,
        67., 77.,
    ], 1, 4);
    assert_eq!(layer.output(), &expected);
    Ok(())
}

#[test]
fn test_convolution_backprop_literal() -> Result<(), NetworkError> {
    let mut layer = literal_layer()?;
    layer.assign_input(LayerInput::Matrix(literal_input()))?;
    layer.forward_prop()?;
    let deltas = layer.backprop(&Matrix::new(&[1.; 4], 1, 4))?.unwrap();

    // 每个卷积核元素的梯度是它扫过的输入元素之和
    assert_eq!(deltas.weight_deltas, Matrix::new(&[12., 16., 24., 28.], 1, 4));
    assert_eq!(deltas.bias_deltas, Matrix::new(&[1.; 4], 1, 4));

    // 对输入的梯度为全卷积（翻转卷积核、填充K-1）
    #[rustfmt::skip]
    let expected = Matrix::new(&[
        1.,  3., 2.,
        4., 10., 6.,
        3.,  7., 4.,
    ], 1, 9);
    assert_eq!(layer.layer_deltas(), Some(&expected));
    Ok(())
}

fn loss_of(
    layer: &mut Convolution,
    input: &Matrix,
    upstream: &Matrix,
) -> Result<f64, NetworkError> {
    layer.assign_input(LayerInput::Matrix(input.clone()))?;
    layer.forward_prop()?;
    Ok(weighted_loss(layer.output(), upstream))
}

/// 把参数矩阵中的一个元素加上`delta`
fn nudge(layer: &mut Convolution, use_bias: bool, index: usize, delta: f32) {
    let (filter, bias) = layer.parameters_mut().unwrap();
    let target = if use_bias { bias } else { filter };
    target.as_slice_mut()[index] += delta;
}

fn gradient_check(
    input_tensor: TensorShape,
    num_filters: usize,
    filter_size: usize,
    stride: usize,
    zero_padding: usize,
    activation: Activation,
) -> Result<(), NetworkError> {
    let mut layer = Convolution::new(
        input_tensor,
        num_filters,
        filter_size,
        stride,
        zero_padding,
        activation,
        InputSource::Matrix,
    )?
    .seeded(21);
    {
        let (filter, bias) = layer.parameters_mut().unwrap();
        *filter = filter.scale(0.3);
        *bias = bias.scale(0.3);
    }
    let output_tensor = layer.output_tensor();
    let [rows, cols] = input_tensor.matrix_shape();
    let input = Matrix::new_random_seeded(-1.0, 1.0, rows, cols, 22);
    let [rows, cols] = output_tensor.matrix_shape();
    let upstream = Matrix::new_random_seeded(-1.0, 1.0, rows, cols, 23);

    loss_of(&mut layer, &input, &upstream)?;
    let deltas = layer.backprop(&upstream)?.unwrap();
    let input_deltas = layer.layer_deltas().unwrap().clone();
    assert_eq!(input_deltas.shape(), input_tensor.matrix_shape());

    // 卷积核与偏置
    for (use_bias, analytic) in [(false, &deltas.weight_deltas), (true, &deltas.bias_deltas)] {
        for index in 0..analytic.len() {
            nudge(&mut layer, use_bias, index, EPSILON);
            let plus = loss_of(&mut layer, &input, &upstream)?;
            nudge(&mut layer, use_bias, index, -2.0 * EPSILON);
            let minus = loss_of(&mut layer, &input, &upstream)?;
            nudge(&mut layer, use_bias, index, EPSILON);
            let numeric = (plus - minus) / (2.0 * EPSILON as f64);
            assert_abs_diff_eq!(analytic.as_slice()[index] as f64, numeric, epsilon = TOLERANCE);
        }
    }

    // 输入
    for index in 0..input.len() {
        let mut plus = input.clone();
        plus.as_slice_mut()[index] += EPSILON;
        let mut minus = input.clone();
        minus.as_slice_mut()[index] -= EPSILON;
        let numeric = (loss_of(&mut layer, &plus, &upstream)? - loss_of(&mut layer, &minus, &upstream)?)
            / (2.0 * EPSILON as f64);
        assert_abs_diff_eq!(input_deltas.as_slice()[index] as f64, numeric, epsilon = TOLERANCE);
    }
    Ok(())
}

#[test]
fn test_convolution_gradient_check_stride_one() -> Result<(), NetworkError> {
    gradient_check(TensorShape::new(4, 4, 2), 2, 3, 1, 0, Activation::Identity)
}

#[test]
fn test_convolution_gradient_check_stride_two_padding_one() -> Result<(), NetworkError> {
    gradient_check(TensorShape::new(5, 5, 2), 2, 3, 2, 1, Activation::Identity)
}

/// 输出尺寸向上取整、且填充大于K-1时，反向的填充为负
#[test]
fn test_convolution_gradient_check_uneven() -> Result<(), NetworkError> {
    gradient_check(TensorShape::new(6, 5, 1), 3, 2, 3, 2, Activation::Identity)
}

#[test]
fn test_convolution_gradient_check_tanh() -> Result<(), NetworkError> {
    gradient_check(TensorShape::new(5, 4, 3), 2, 2, 2, 1, Activation::Tanh)
}

#[test]
fn test_convolution_texture_input() -> Result<(), NetworkError> {
    let mut layer = Convolution::new(
        TensorShape::new(2, 2, 3),
        1,
        1,
        1,
        0,
        Activation::Identity,
        InputSource::Texture,
    )?;
    {
        let (filter, bias) = layer.parameters_mut().unwrap();
        // 1x1卷积核：只取红色通道
        *filter = Matrix::new(&[1., 0., 0.], 1, 3);
        *bias = Matrix::zeros(1, 4);
    }

    let image = RgbaImage::from_fn(2, 2, |x, y| Rgba([(x + 2 * y) as u8 * 85, 7, 9, 255]));
    layer.assign_input(LayerInput::Image(DynamicImage::ImageRgba8(image)))?;
    layer.forward_prop()?;
    let output = layer.output().as_slice();
    for (i, &value) in output.iter().enumerate() {
        assert_abs_diff_eq!(value, i as f32 * 85.0 / 255.0, epsilon = 1e-6);
    }

    // 矩阵来源的卷积层不接受图像
    let mut matrix_layer = Convolution::new(
        TensorShape::new(2, 2, 3),
        1,
        1,
        1,
        0,
        Activation::Identity,
        InputSource::Matrix,
    )?;
    assert_err!(
        matrix_layer.assign_input(LayerInput::Image(DynamicImage::new_rgba8(2, 2))),
        NetworkError::InvalidInput(_)
    );
    Ok(())
}

#[test]
fn test_convolution_released_layer_fails() -> Result<(), NetworkError> {
    let mut layer = literal_layer()?;
    layer.release();
    layer.assign_input(LayerInput::Matrix(literal_input()))?;
    assert_err!(layer.forward_prop(), NetworkError::Kernel(_));
    Ok(())
}

/*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓超出调度容量↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
/// 1500x1500单通道输入、1x1卷积核：面积2250000超出单次调度的最大容量
const OVERSIZED: usize = 1500;

fn oversized_input() -> Matrix {
    Matrix::new(&vec![1.0; OVERSIZED * OVERSIZED], 1, OVERSIZED * OVERSIZED)
}

#[test]
fn test_convolution_forward_skipped_keeps_output() -> Result<(), NetworkError> {
    let mut layer = Convolution::new(
        TensorShape::new(OVERSIZED, OVERSIZED, 1),
        1,
        1,
        1,
        0,
        Activation::Identity,
        InputSource::Matrix,
    )?
    .seeded(3);
    assert!(layer.output_tensor().area() > MAX_ELEMENTS_PER_DISPATCH);

    layer.assign_input(LayerInput::Matrix(oversized_input()))?;
    layer.forward_prop()?;
    // 调度被跳过：输出仍为初始的零，而非偏置
    assert!(layer.output().as_slice().iter().all(|&v| v == 0.0));
    assert!(layer.bias().as_slice().iter().any(|&v| v != 0.0));
    assert!(layer.prior_activation_output().is_none());
    assert_err!(
        layer.backprop(&Matrix::zeros(1, OVERSIZED * OVERSIZED)),
        NetworkError::NotPropagated(_)
    );
    Ok(())
}

#[test]
fn test_convolution_backprop_skipped_yields_zero_deltas() -> Result<(), NetworkError> {
    // 步长2时输出为750x750可正常前向，但膨胀后的gamma与输入面积都超出容量
    let mut layer = Convolution::new(
        TensorShape::new(OVERSIZED, OVERSIZED, 1),
        1,
        1,
        2,
        0,
        Activation::Identity,
        InputSource::Matrix,
    )?
    .seeded(5);
    assert_eq!(layer.output_tensor(), TensorShape::new(750, 750, 1));

    layer.assign_input(LayerInput::Matrix(oversized_input()))?;
    layer.forward_prop()?;
    let output = layer.output().clone();
    assert_abs_diff_eq!(
        output.get(0, 0),
        layer.filter().get(0, 0) + layer.bias().get(0, 0),
        epsilon = 1e-6
    );

    let deltas = layer
        .backprop(&Matrix::new(&vec![1.0; 750 * 750], 1, 750 * 750))?
        .unwrap();
    assert_eq!(deltas.shapes(), [[1, 1], [1, 750 * 750]]);
    assert!(deltas.weight_deltas.as_slice().iter().all(|&v| v == 0.0));
    assert!(deltas.bias_deltas.as_slice().iter().all(|&v| v == 0.0));
    assert!(layer.layer_deltas().is_none());
    assert_eq!(layer.output(), &output);

    // 零梯度不改变参数
    let filter = layer.filter().clone();
    let bias = layer.bias().clone();
    layer.apply_weight_bias_deltas(Some(&deltas), 0.5);
    assert_eq!(layer.filter(), &filter);
    assert_eq!(layer.bias(), &bias);
    Ok(())
}
/*↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑超出调度容量↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑*/
