/*
 * @Author       : 老董
 * @Date         : 2026-03-12
 * @Description  : 训练超参数，可从JSON读取
 */

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::TrainError;
use crate::nn::CostFunction;

/// 训练配置。JSON中缺省的字段取默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// 每多少个样本更新一次参数
    pub batch_size: usize,
    pub learning_rate: f32,
    pub cost: CostFunction,
    /// 打乱数据所用的随机种子，None则每次不同
    pub seed: Option<u64>,
    /// 是否在每个批次结束时输出一条日志
    pub display_each_batch: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            learning_rate: 0.01,
            cost: CostFunction::SoftMaxCrossEntropy,
            seed: None,
            display_each_batch: false,
        }
    }
}

impl TrainingConfig {
    pub fn from_json_str(json: &str) -> Result<Self, TrainError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TrainError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String, TrainError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 检查超参数是否可用于训练
    pub fn validate(&self) -> Result<(), TrainError> {
        if self.batch_size == 0 {
            return Err(TrainError::InvalidConfiguration(
                "batch_size必须大于0".to_string(),
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return Err(TrainError::InvalidConfiguration(format!(
                "learning_rate必须是非负有限数，实际为{}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}
