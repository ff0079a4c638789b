/*
 * @Author       : 老董
 * @Date         : 2026-03-11
 * @Description  : Network 单元测试（形状衔接、传播、原子更新、参数导入导出、描述符）
 */

use std::fs;

use approx::assert_abs_diff_eq;

use crate::assert_err;
use crate::kernel::InputSource;
use crate::matrix::{Activation, Matrix};
use crate::nn::{
    BackPropagationEvaluation, Convolution, CostFunction, Dense, Flatten, LayerTypeDescriptor,
    Network, NetworkDescriptor, NetworkError, PARAMETER_FILE_EXTENSION, Pooling, TensorShape,
    TraitLayer, WeightBiasDeltas,
};

/// 卷积(5x5x2 -> 3x3x2，步长2，填充1) -> 展平 -> 全连接(18 -> 2)
fn small_cnn(seed: u64) -> Result<Network, NetworkError> {
    let mut network = Network::new(CostFunction::MeanSquaredError);
    network
        .push(
            Convolution::new(
                TensorShape::new(5, 5, 2),
                2,
                3,
                2,
                1,
                Activation::Tanh,
                InputSource::Matrix,
            )?
            .seeded(seed),
        )?
        .push(Flatten::new(TensorShape::new(3, 3, 2)))?
        .push(Dense::new(18, 2, Activation::Identity).seeded(seed + 1))?;
    Ok(network)
}

fn sample_input() -> Matrix {
    Matrix::new_random_seeded(-1.0, 1.0, 2, 25, 99)
}

#[test]
fn test_push_validates_shape_chain() -> Result<(), NetworkError> {
    let mut network = Network::new(CostFunction::SoftMaxCrossEntropy);
    network
        .push(Convolution::new(
            TensorShape::new(6, 6, 1),
            2,
            3,
            1,
            1,
            Activation::ReLU,
            InputSource::Matrix,
        )?)?
        .push(Pooling::new(TensorShape::new(6, 6, 2), 2, 2)?)?;

    assert_err!(
        network.push(Flatten::new(TensorShape::new(3, 3, 1))),
        NetworkError::ShapeMismatch { layer_index: 2, expected, got }
            if *expected == TensorShape::new(3, 3, 2) && *got == TensorShape::new(3, 3, 1)
    );
    // 被拒绝的层不会加入网络
    assert_eq!(network.len(), 2);

    network
        .push(Flatten::new(TensorShape::new(3, 3, 2)))?
        .push(Dense::new(18, 4, Activation::Identity))?;
    assert_eq!(network.len(), 4);

    let output = network.forward_propagate(Matrix::new_random_seeded(0.0, 1.0, 1, 36, 1))?;
    assert_eq!(output.shape(), [1, 4]);
    Ok(())
}

#[test]
fn test_empty_network() {
    let mut network = Network::default();
    assert!(network.is_empty());
    assert!(network.output().is_none());
    assert_err!(
        network.forward_propagate(Matrix::zeros(1, 1)),
        NetworkError::EmptyNetwork
    );
    assert_err!(
        network.backpropagation(Matrix::zeros(1, 1), &Matrix::zeros(1, 1)),
        NetworkError::EmptyNetwork
    );
}

#[test]
fn test_forward_propagate_chains_layers() -> Result<(), NetworkError> {
    let mut first = Dense::new(2, 2, Activation::Identity);
    {
        let (weights, bias) = first.parameters_mut().unwrap();
        *weights = Matrix::new(&[1., 1., 0., 1.], 2, 2);
        *bias = Matrix::new(&[0., -1.], 1, 2);
    }
    let mut second = Dense::new(2, 1, Activation::ReLU);
    {
        let (weights, bias) = second.parameters_mut().unwrap();
        *weights = Matrix::new(&[2., -1.], 2, 1);
        *bias = Matrix::new(&[0.5], 1, 1);
    }
    let mut network = Network::new(CostFunction::SquaredError);
    network.push(first)?.push(second)?;

    // [1, 2] -> [1, 2] -> 2*1 - 1*2 + 0.5 = 0.5
    let output = network.forward_propagate(Matrix::new(&[1., 2.], 1, 2))?.clone();
    assert_eq!(output, Matrix::new(&[0.5], 1, 1));
    assert_eq!(network.output(), Some(&output));
    assert_eq!(network.layer(0).unwrap().output(), &Matrix::new(&[1., 2.], 1, 2));

    let evaluation = network.backpropagation(Matrix::new(&[1., 2.], 1, 2), &Matrix::new(&[1.5], 1, 1))?;
    assert_eq!(evaluation.error_cost, 1.0);
    assert_eq!(evaluation.deltas.len(), 2);
    // dC/dy = 2(0.5 - 1.5) = -2
    assert_eq!(
        evaluation.deltas[1].as_ref().unwrap().weight_deltas,
        Matrix::new(&[-2., -4.], 2, 1)
    );
    assert_err!(
        network.backpropagation(Matrix::new(&[1., 2.], 1, 2), &Matrix::zeros(1, 3)),
        NetworkError::InvalidInput(_)
    );
    Ok(())
}

/// 整个网络的有限差分梯度检验：卷积核的梯度经过全连接层、展平层传回
#[test]
fn test_network_gradient_check() -> Result<(), NetworkError> {
    const EPSILON: f32 = 1e-2;
    let mut network = small_cnn(4)?;
    let input = sample_input();
    let expected = Matrix::new(&[0.5, -0.5], 1, 2);

    let evaluation = network.backpropagation(input.clone(), &expected)?;
    assert!(evaluation.deltas[1].is_none());

    for layer_index in [0, 2] {
        let analytic = evaluation.deltas[layer_index].as_ref().unwrap().weight_deltas.clone();
        for index in (0..analytic.len()).step_by(3) {
            let mut cost_with = |delta: f32| -> Result<f32, NetworkError> {
                let layer = network.layer_mut(layer_index).unwrap();
                layer.parameters_mut().unwrap().0.as_slice_mut()[index] += delta;
                let output = network.forward_propagate(input.clone())?.clone();
                let layer = network.layer_mut(layer_index).unwrap();
                layer.parameters_mut().unwrap().0.as_slice_mut()[index] -= delta;
                Ok(network.cost().error_cost(&output, &expected))
            };
            let numeric = (cost_with(EPSILON)? - cost_with(-EPSILON)?) / (2.0 * EPSILON);
            assert_abs_diff_eq!(analytic.as_slice()[index], numeric, epsilon = 2e-3);
        }
    }
    Ok(())
}

#[test]
fn test_apply_zero_learning_rate() -> Result<(), NetworkError> {
    let mut network = small_cnn(7)?;
    let before: Vec<f32> = {
        let mut bytes = Vec::new();
        network.export_parameters(&mut bytes)?;
        bytes.chunks_exact(4).map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]])).collect()
    };

    let evaluation = network.backpropagation(sample_input(), &Matrix::new(&[1., 0.], 1, 2))?;
    network.apply_weight_bias_deltas(&evaluation, 0.0)?;

    let mut bytes = Vec::new();
    network.export_parameters(&mut bytes)?;
    let after: Vec<f32> =
        bytes.chunks_exact(4).map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]])).collect();
    assert_eq!(before, after);
    Ok(())
}

/// 某一层梯度形状不符时，任何一层都不会被更新
#[test]
fn test_apply_is_atomic() -> Result<(), NetworkError> {
    let mut network = small_cnn(8)?;
    let filter_before = network.layer(0).unwrap().parameters().unwrap().0.clone();

    let mut evaluation = network.backpropagation(sample_input(), &Matrix::new(&[1., 0.], 1, 2))?;
    evaluation.deltas[2] = Some(WeightBiasDeltas::new(Matrix::zeros(2, 18), Matrix::zeros(1, 2)));
    assert_err!(
        network.apply_weight_bias_deltas(&evaluation, 1.0),
        NetworkError::DeltaShape { layer_index: 2, .. }
    );
    assert_eq!(network.layer(0).unwrap().parameters().unwrap().0, &filter_before);

    // 无参数的层收到梯度同样视为不符
    let mut evaluation = network.backpropagation(sample_input(), &Matrix::new(&[1., 0.], 1, 2))?;
    evaluation.deltas[1] = evaluation.deltas[2].clone();
    assert_err!(
        network.apply_weight_bias_deltas(&evaluation, 1.0),
        NetworkError::DeltaShape { layer_index: 1, expected: None, .. }
    );

    let evaluation = BackPropagationEvaluation {
        error_cost: 0.0,
        deltas: vec![None],
        output: Matrix::zeros(1, 2),
        expected: Matrix::zeros(1, 2),
    };
    assert_err!(
        network.apply_weight_bias_deltas(&evaluation, 1.0),
        NetworkError::DeltaCount { expected: 3, got: 1 }
    );
    assert_eq!(network.layer(0).unwrap().parameters().unwrap().0, &filter_before);
    Ok(())
}

#[test]
fn test_training_step_changes_output() -> Result<(), NetworkError> {
    let mut network = small_cnn(9)?;
    let expected = Matrix::new(&[0.5, -0.5], 1, 2);
    let first = network.backpropagation(sample_input(), &expected)?;
    for _ in 0..20 {
        let evaluation = network.backpropagation(sample_input(), &expected)?;
        network.apply_weight_bias_deltas(&evaluation, 0.05)?;
    }
    let last = network.backpropagation(sample_input(), &expected)?;
    assert!(last.error_cost < first.error_cost);
    Ok(())
}

/// 导出后导入到同拓扑的网络，前向输出逐位相同
#[test]
fn test_export_import_bit_identical() -> Result<(), NetworkError> {
    let mut source = small_cnn(1)?;
    let mut target = small_cnn(2)?;
    let expected_output = source.forward_propagate(sample_input())?.clone();
    assert_ne!(target.forward_propagate(sample_input())?, &expected_output);

    let mut bytes = Vec::new();
    source.export_parameters(&mut bytes)?;
    assert_eq!(bytes.len(), source.param_count() * 4);
    assert_eq!(source.param_count(), (2 * 18 + 2 * 9) + (18 * 2 + 2));

    target.import_parameters(&mut bytes.as_slice())?;
    assert_eq!(target.forward_propagate(sample_input())?, &expected_output);
    Ok(())
}

#[test]
fn test_import_wrong_length() -> Result<(), NetworkError> {
    let source = small_cnn(1)?;
    let mut target = small_cnn(2)?;
    let before = target.forward_propagate(sample_input())?.clone();

    let mut bytes = Vec::new();
    source.export_parameters(&mut bytes)?;
    let expected = bytes.len();

    assert_err!(
        target.import_parameters(&mut &bytes[..expected - 4]),
        NetworkError::ParameterLength { got, .. } if *got == expected - 4
    );
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    assert_err!(
        target.import_parameters(&mut bytes.as_slice()),
        NetworkError::ParameterLength { got, .. } if *got == expected + 4
    );
    // 失败的导入不修改参数
    assert_eq!(target.forward_propagate(sample_input())?, &before);
    Ok(())
}

#[test]
fn test_save_load_file() -> Result<(), NetworkError> {
    let path = std::env::temp_dir().join(format!(
        "only_cnn_test_save_load.{}",
        PARAMETER_FILE_EXTENSION
    ));
    let mut source = small_cnn(3)?;
    source.save(&path)?;

    let mut target = small_cnn(4)?;
    target.load(&path)?;
    assert_eq!(
        target.forward_propagate(sample_input())?.clone(),
        source.forward_propagate(sample_input())?.clone()
    );

    fs::remove_file(&path).ok();
    assert_err!(target.load(&path), NetworkError::Io(_));
    Ok(())
}

#[test]
fn test_descriptor_round_trip() -> Result<(), NetworkError> {
    let network = small_cnn(5)?;
    let descriptor = network.describe();
    assert_eq!(descriptor.input_tensor, TensorShape::new(5, 5, 2));
    assert_eq!(descriptor.cost, CostFunction::MeanSquaredError);
    assert_eq!(descriptor.total_params, network.param_count());
    assert_eq!(descriptor.layers.len(), 3);
    assert_eq!(descriptor.layers[1].layer_type, LayerTypeDescriptor::Flatten);
    assert_eq!(descriptor.layers[1].param_count, None);
    assert_eq!(
        descriptor.layers[0].layer_type,
        LayerTypeDescriptor::Convolution {
            num_filters: 2,
            filter_size: 3,
            stride: 2,
            zero_padding: 1,
            activation: Activation::Tanh,
            source: InputSource::Matrix,
        }
    );

    let json = descriptor.to_json()?;
    let parsed = NetworkDescriptor::from_json(&json)?;
    assert_eq!(parsed, descriptor);

    // 由描述重建的网络拓扑相同，可直接导入参数
    let mut rebuilt = Network::from_descriptor(&parsed)?;
    assert_eq!(rebuilt.describe(), descriptor);
    let mut bytes = Vec::new();
    network.export_parameters(&mut bytes)?;
    rebuilt.import_parameters(&mut bytes.as_slice())?;
    Ok(())
}

#[test]
fn test_release_cascades() -> Result<(), NetworkError> {
    let mut network = small_cnn(6)?;
    network.forward_propagate(sample_input())?;
    network.release();
    assert_err!(network.forward_propagate(sample_input()), NetworkError::Kernel(_));
    Ok(())
}
