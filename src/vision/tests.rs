use image::Luma;

use crate::assert_err;
use crate::matrix::Matrix;
use crate::nn::{Layer, LayerInput, NetworkError, Pooling, TensorShape, TraitLayer};
use crate::vision::Vision;

#[test]
fn test_render_pooling_output() -> Result<(), NetworkError> {
    #[rustfmt::skip]
    let input = Matrix::new(&[
        -1., -1.,  0., -2.,
        -1., -1., -2., -2.,
         1.,  0.,  3., -5.,
        -3., -3.,  0.,  0.,
    ], 1, 16);
    let mut layer: Layer = Pooling::new(TensorShape::new(4, 4, 1), 2, 2)?.into();
    layer.assign_input(LayerInput::Matrix(input))?;
    layer.forward_prop()?;

    let image = Vision::render_feature_map(&layer, 0)?;
    assert_eq!(image.dimensions(), (2, 2));
    assert_eq!(image.get_pixel(0, 0), &Luma([0]));
    assert_eq!(image.get_pixel(1, 0), &Luma([128]));
    // 大于1的值截断为255
    assert_eq!(image.get_pixel(0, 1), &Luma([255]));
    assert_eq!(image.get_pixel(1, 1), &Luma([255]));

    assert_err!(
        Vision::render_feature_map(&layer, 1),
        NetworkError::InvalidInput(_)
    );
    Ok(())
}

#[test]
fn test_render_selects_feature_map() -> Result<(), NetworkError> {
    // 宽度超过8，需要多个线程组
    let tensor = TensorShape::new(10, 3, 2);
    let mut data = vec![-1.0; 30];
    data.extend((0..30).map(|i| if i == 12 { 1.0 } else { -1.0 }));
    let output = Matrix::new(&data, 2, 30);

    let first = Vision::render_matrix(&output, tensor, 0)?;
    assert!(first.pixels().all(|p| p == &Luma([0])));

    let second = Vision::render_matrix(&output, tensor, 1)?;
    assert_eq!(second.dimensions(), (10, 3));
    // 第12个元素位于(x = 2, y = 1)
    assert_eq!(second.get_pixel(2, 1), &Luma([255]));
    assert_eq!(second.pixels().filter(|p| p == &&Luma([255])).count(), 1);
    Ok(())
}

#[test]
fn test_render_rejects_mismatched_tensor() {
    let output = Matrix::zeros(1, 6);
    assert_err!(
        Vision::render_matrix(&output, TensorShape::new(2, 2, 1), 0),
        NetworkError::InvalidInput(_)
    );
}

#[test]
fn test_render_all_feature_maps() -> Result<(), NetworkError> {
    let mut layer: Layer = Pooling::new(TensorShape::new(2, 2, 3), 2, 2)?.into();
    layer.assign_input(LayerInput::Matrix(Matrix::new(
        &[-1., -1., -1., -1., 0., 0., 0., 0., 1., 1., 1., 1.],
        3,
        4,
    )))?;
    layer.forward_prop()?;

    let maps = Vision::render_feature_maps(&layer)?;
    let values: Vec<u8> = maps.iter().map(|m| m.get_pixel(0, 0)[0]).collect();
    assert_eq!(values, vec![0, 128, 255]);
    Ok(())
}
