use approx::assert_abs_diff_eq;

use crate::matrix::Matrix;
use crate::nn::{CostFunction, softmax};

#[test]
fn test_softmax() {
    let probabilities = softmax(&Matrix::new(&[1., 2., 3.], 1, 3));
    assert_abs_diff_eq!(probabilities.sum(), 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(probabilities.get(0, 0), 0.09003057, epsilon = 1e-6);
    assert_abs_diff_eq!(probabilities.get(0, 2), 0.66524096, epsilon = 1e-6);
}

/// 对应logit占优时代价接近0，其它logit占优时代价很大
#[test]
fn test_softmax_cross_entropy_cost() {
    let cost = CostFunction::SoftMaxCrossEntropy;
    let expected = Matrix::new(&[1., 0., 0.], 1, 3);

    let near_zero = cost.error_cost(&Matrix::new(&[10., 0., 0.], 1, 3), &expected);
    assert!(near_zero >= 0.0 && near_zero < 1e-3, "代价应接近0，实际为{}", near_zero);

    let large = cost.error_cost(&Matrix::new(&[0., 10., 0.], 1, 3), &expected);
    assert!(large > 5.0, "代价应很大，实际为{}", large);

    // 期望为0的位置代价恰为0
    let per_element = cost.cost(&Matrix::new(&[0., 10., 0.], 1, 3), &expected);
    assert_eq!(per_element.get(0, 1), 0.0);
    assert_eq!(per_element.get(0, 2), 0.0);
}

#[test]
fn test_softmax_cross_entropy_derivative() {
    let cost = CostFunction::SoftMaxCrossEntropy;
    let output = Matrix::new(&[1., 2., 3.], 1, 3);
    let expected = Matrix::new(&[0., 1., 0.], 1, 3);

    // 独热期望时等于softmax(o) - e
    let derivative = cost.derivative(&output, &expected);
    let probabilities = softmax(&output);
    assert_abs_diff_eq!(derivative.get(0, 0), probabilities.get(0, 0), epsilon = 1e-6);
    assert_abs_diff_eq!(derivative.get(0, 1), probabilities.get(0, 1) - 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(derivative.sum(), 0.0, epsilon = 1e-6);
}

#[test]
fn test_squared_errors() {
    let output = Matrix::new(&[1., 0.5, -1.], 1, 3);
    let expected = Matrix::new(&[0., 0.5, 1.], 1, 3);

    let squared = CostFunction::SquaredError;
    assert_eq!(squared.cost(&output, &expected), Matrix::new(&[1., 0., 4.], 1, 3));
    assert_eq!(squared.derivative(&output, &expected), Matrix::new(&[2., 0., -4.], 1, 3));
    assert_eq!(squared.error_cost(&output, &expected), 5.0);

    let mean = CostFunction::MeanSquaredError;
    assert_eq!(mean.cost(&output, &expected), Matrix::new(&[0.5, 0., 2.], 1, 3));
    assert_eq!(mean.derivative(&output, &expected), Matrix::new(&[1., 0., -2.], 1, 3));
    assert_eq!(mean.error_cost(&output, &expected), 2.5);
}

#[test]
fn test_cost_function_serde() {
    assert_eq!(CostFunction::default(), CostFunction::SoftMaxCrossEntropy);
    let json = serde_json::to_string(&CostFunction::MeanSquaredError).unwrap();
    assert_eq!(json, "\"MeanSquaredError\"");
    let parsed: CostFunction = serde_json::from_str("\"SquaredError\"").unwrap();
    assert_eq!(parsed, CostFunction::SquaredError);
}
