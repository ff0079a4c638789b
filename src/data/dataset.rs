/*
 * @Author       : 老董
 * @Date         : 2026-03-10
 * @Description  : 样本集合：训练集/测试集、one-hot期望值、CSV清单加载
 */

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::seq::SliceRandom;

use super::DataError;
use crate::matrix::Matrix;
use crate::nn::LayerInput;

/// 单个样本
#[derive(Debug, Clone)]
pub struct Sample {
    pub input: LayerInput,
    /// 从0开始的类别序号
    pub label: usize,
}

impl Sample {
    pub fn new(input: impl Into<LayerInput>, label: usize) -> Self {
        Self {
            input: input.into(),
            label,
        }
    }
}

/// 训练集 + 测试集
#[derive(Debug, Clone)]
pub struct DataSet {
    training: Vec<Sample>,
    test: Vec<Sample>,
    class_count: usize,
}

impl DataSet {
    /// 所有标签都必须小于`class_count`
    pub fn new(
        training: Vec<Sample>,
        test: Vec<Sample>,
        class_count: usize,
    ) -> Result<Self, DataError> {
        if class_count == 0 {
            return Err(DataError::EmptySet("类别集合"));
        }
        if let Some(sample) = training
            .iter()
            .chain(&test)
            .find(|s| s.label >= class_count)
        {
            return Err(DataError::LabelOutOfRange {
                label: sample.label,
                class_count,
            });
        }
        Ok(Self {
            training,
            test,
            class_count,
        })
    }

    /// 读取CSV清单，每行形如`文件名,类别(从1开始),是否测试样本(TRUE|FALSE)`，
    /// 文件名相对于`root`。类别数取清单中最大的类别序号
    pub fn from_manifest(
        root: impl AsRef<Path>,
        manifest: impl AsRef<Path>,
    ) -> Result<Self, DataError> {
        let root = root.as_ref();
        let manifest = manifest.as_ref();
        if !manifest.exists() {
            return Err(DataError::FileNotFound(manifest.to_path_buf()));
        }
        let content = fs::read_to_string(manifest)?;

        let mut training = Vec::new();
        let mut test = Vec::new();
        let mut class_count = 0;
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (path, class, is_test) = parse_manifest_line(root, line)
                .map_err(|msg| DataError::FormatError(format!("第{}行: {}", line_no + 1, msg)))?;
            if !path.exists() {
                return Err(DataError::FileNotFound(path));
            }
            class_count = class_count.max(class);

            let sample = Sample::new(path, class - 1);
            if is_test {
                test.push(sample);
            } else {
                training.push(sample);
            }
        }

        Self::new(training, test, class_count)
    }

    pub fn training(&self) -> &[Sample] {
        &self.training
    }

    pub fn test(&self) -> &[Sample] {
        &self.test
    }

    pub fn class_count(&self) -> usize {
        self.class_count
    }

    /// 标签对应的one-hot期望输出，形状为(1, class_count)
    pub fn expected(&self, label: usize) -> Result<Matrix, DataError> {
        if label >= self.class_count {
            return Err(DataError::LabelOutOfRange {
                label,
                class_count: self.class_count,
            });
        }
        let mut expected = Matrix::zeros(1, self.class_count);
        expected.set(0, label, 1.0);
        Ok(expected)
    }

    /// 同时打乱训练集与测试集
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.training.shuffle(rng);
        self.test.shuffle(rng);
    }

    /// 只打乱训练集（每轮结束时使用，不影响进行中的测试）
    pub fn shuffle_training<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.training.shuffle(rng);
    }
}

fn parse_manifest_line(root: &Path, line: &str) -> Result<(PathBuf, usize, bool), String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [file, class, is_test] = fields.as_slice() else {
        return Err(format!("应有3个字段，实际为{}个", fields.len()));
    };
    if file.is_empty() {
        return Err("文件名为空".to_string());
    }
    let class: usize = class
        .parse()
        .map_err(|_| format!("无法解析类别`{}`", class))?;
    if class == 0 {
        return Err("类别序号从1开始".to_string());
    }
    let is_test = match is_test.to_ascii_uppercase().as_str() {
        "TRUE" => true,
        "FALSE" => false,
        other => return Err(format!("无法解析测试标记`{}`", other)),
    };
    Ok((root.join(file), class, is_test))
}
