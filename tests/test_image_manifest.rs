/*
 * @Author       : 老董
 * @Date         : 2026-03-15
 * @Description  : 从CSV清单加载图像数据集，用图像来源的卷积层区分红色与蓝色图片，
 *                 并验证训练后的参数可经文件导出、导入
 */
use std::fs;
use std::path::PathBuf;

use image::{Rgba, RgbaImage};
use only_cnn::data::DataSet;
use only_cnn::matrix::Activation;
use only_cnn::nn::{
    Convolution, CostFunction, Dense, Flatten, InputSource, Network, PARAMETER_FILE_EXTENSION,
    TensorShape,
};
use only_cnn::train::{TrainError, Trainer, TrainingConfig};

fn prepare_images() -> PathBuf {
    let dir = std::env::temp_dir().join("only_cnn_test_image_manifest");
    fs::remove_dir_all(&dir).ok();
    fs::create_dir_all(&dir).unwrap();

    let mut manifest = String::new();
    for i in 0..6u8 {
        let shade = 150 + i * 20;
        for (class, color) in [(1, Rgba([shade, 20, 30, 255])), (2, Rgba([20, 30, shade, 255]))] {
            let name = format!("{}_{}.png", class, i);
            // 8x8的图会被最近邻缩放到4x4
            RgbaImage::from_pixel(8, 8, color).save(dir.join(&name)).unwrap();
            let is_test = if i >= 4 { "TRUE" } else { "FALSE" };
            manifest.push_str(&format!("{},{},{}\n", name, class, is_test));
        }
    }
    fs::write(dir.join("manifest.csv"), manifest).unwrap();
    dir
}

fn build_network(seed: u64) -> Result<Network, TrainError> {
    let mut network = Network::new(CostFunction::SoftMaxCrossEntropy);
    network
        .push(
            Convolution::new(
                TensorShape::new(4, 4, 3),
                2,
                2,
                2,
                0,
                Activation::Tanh,
                InputSource::Texture,
            )?
            .seeded(seed),
        )?
        .push(Flatten::new(TensorShape::new(2, 2, 2)))?
        .push(Dense::new(8, 2, Activation::Identity).seeded(seed + 1))?;
    Ok(network)
}

#[test]
fn test_image_manifest_training() -> Result<(), TrainError> {
    let dir = prepare_images();
    let data = DataSet::from_manifest(&dir, dir.join("manifest.csv"))?;
    assert_eq!(data.class_count(), 2);
    assert_eq!(data.training().len(), 8);
    assert_eq!(data.test().len(), 4);

    let config = TrainingConfig::from_json_str(
        r#"{ "batch_size": 2, "learning_rate": 0.1, "seed": 3, "display_each_batch": true }"#,
    )?;
    let mut trainer = Trainer::new(config, vec![build_network(3)?], data);
    trainer.init()?;

    let mut accuracy = 0.0;
    for _ in 0..100 {
        for _ in 0..8 {
            trainer.step_train()?;
        }
        for _ in 0..4 {
            if let Some(accuracies) = trainer.step_test()?.accuracies {
                accuracy = accuracies[0];
            }
        }
        if accuracy >= 1.0 {
            break;
        }
    }
    assert_eq!(accuracy, 1.0);

    // 训练后的参数经文件导入到新网络，在测试图上的输出逐位相同
    let mut networks = trainer.into_networks();
    let mut trained = networks.remove(0);
    let path = dir.join(format!("params.{}", PARAMETER_FILE_EXTENSION));
    trained.save(&path)?;
    let mut restored = build_network(99)?;
    restored.load(&path)?;

    let image = dir.join("1_5.png");
    let expected = trained.forward_propagate(image.clone())?.clone();
    assert_eq!(restored.forward_propagate(image)?, &expected);

    fs::remove_dir_all(&dir).ok();
    Ok(())
}
