/*
 * @Author       : 老董
 * @Date         : 2026-03-12
 * @Description  : 按批次/轮次推进的训练器。调用方逐步驱动：
 *                 `init()`之后反复调用`step_train()`，需要评估时反复调用`step_test()`
 */

mod config;
mod error;

pub use config::TrainingConfig;
pub use error::TrainError;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::data::{DataError, DataSet};
use crate::nn::{BackPropagationEvaluation, Network};


/// 单个网络的训练状态
#[derive(Debug)]
struct TrainingState {
    network: Network,
    batch: Vec<BackPropagationEvaluation>,
    batch_error: f32,
    epoch_error: f32,
    test_correct: usize,
    test_total: usize,
    last_accuracy: Option<f32>,
}

impl TrainingState {
    fn new(network: Network) -> Self {
        Self {
            network,
            batch: Vec::new(),
            batch_error: 0.0,
            epoch_error: 0.0,
            test_correct: 0,
            test_total: 0,
            last_accuracy: None,
        }
    }

    fn reset_epoch(&mut self) {
        self.batch.clear();
        self.batch_error = 0.0;
        self.epoch_error = 0.0;
    }

    fn reset_test(&mut self) {
        self.test_correct = 0;
        self.test_total = 0;
    }
}

/// `step_train()`一步的结果
#[derive(Debug, Clone, PartialEq)]
pub struct TrainStep {
    /// 本步处理的样本所在的轮次
    pub epoch: usize,
    /// 本步处理的样本在（打乱后的）训练集中的序号
    pub sample_index: usize,
    /// 每个网络在本样本上的代价
    pub error_costs: Vec<f32>,
    /// 本步是否凑满一个批次并更新了参数
    pub batch_applied: bool,
    /// 本步是否结束了一轮
    pub epoch_completed: bool,
}

/// `step_test()`一步的结果
#[derive(Debug, Clone, PartialEq)]
pub struct TestStep {
    pub sample_index: usize,
    /// 每个网络是否预测正确
    pub correct: Vec<bool>,
    /// 测试集走完一遍时，每个网络的准确率
    pub accuracies: Option<Vec<f32>>,
}

#[derive(Debug)]
pub struct Trainer {
    config: TrainingConfig,
    states: Vec<TrainingState>,
    data: DataSet,
    rng: StdRng,
    training_index: usize,
    test_index: usize,
    epoch: usize,
    batch: usize,
    initialized: bool,
}

impl Trainer {
    /// 各网络相互独立，按顺序在同一个样本上训练
    pub fn new(config: TrainingConfig, networks: Vec<Network>, data: DataSet) -> Self {
        let rng = Self::make_rng(config.seed);
        Self {
            config,
            states: networks.into_iter().map(TrainingState::new).collect(),
            data,
            rng,
            training_index: 0,
            test_index: 0,
            epoch: 0,
            batch: 0,
            initialized: false,
        }
    }

    fn make_rng(seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// 校验配置、清零所有计数并打乱数据。训练或测试前必须调用
    pub fn init(&mut self) -> Result<(), TrainError> {
        self.config.validate()?;
        if self.states.is_empty() {
            return Err(TrainError::InvalidConfiguration(
                "至少需要一个网络".to_string(),
            ));
        }
        if self.data.training().is_empty() {
            return Err(DataError::EmptySet("训练集").into());
        }

        self.rng = Self::make_rng(self.config.seed);
        self.data.shuffle(&mut self.rng);
        for state in &mut self.states {
            state.network.set_cost(self.config.cost);
            state.reset_epoch();
            state.reset_test();
            state.last_accuracy = None;
        }
        self.training_index = 0;
        self.test_index = 0;
        self.epoch = 0;
        self.batch = 0;
        self.initialized = true;
        Ok(())
    }

    /// 用一个训练样本对每个网络做反向传播；凑满一批时求平均并更新参数，
    /// 走完训练集时结束本轮（不足一批的剩余样本被丢弃）并重新打乱训练集
    pub fn step_train(&mut self) -> Result<TrainStep, TrainError> {
        if !self.initialized {
            return Err(TrainError::NotInitialized);
        }

        let sample_index = self.training_index;
        let sample = &self.data.training()[sample_index];
        let input = sample.input.clone();
        let expected = self.data.expected(sample.label)?;

        // 所有网络都成功后才计入批次，失败时各网络的累积状态保持不变
        let evaluations = self
            .states
            .iter_mut()
            .map(|state| state.network.backpropagation(input.clone(), &expected))
            .collect::<Result<Vec<_>, _>>()?;
        let mut error_costs = Vec::with_capacity(evaluations.len());
        for (state, evaluation) in self.states.iter_mut().zip(evaluations) {
            state.batch_error += evaluation.error_cost;
            state.epoch_error += evaluation.error_cost;
            error_costs.push(evaluation.error_cost);
            state.batch.push(evaluation);
        }
        self.training_index += 1;

        let batch_size = self.config.batch_size;
        let batch_applied = self.states[0].batch.len() >= batch_size;
        if batch_applied {
            for (i, state) in self.states.iter_mut().enumerate() {
                if let Some(average) = BackPropagationEvaluation::average(&state.batch) {
                    state
                        .network
                        .apply_weight_bias_deltas(&average, self.config.learning_rate)?;
                }
                if self.config.display_each_batch {
                    log::info!(
                        "网络{} 轮次{} 批次{}: 平均代价 {:.6}",
                        i,
                        self.epoch,
                        self.batch,
                        state.batch_error / batch_size as f32
                    );
                }
                state.batch.clear();
                state.batch_error = 0.0;
            }
            self.batch += 1;
        }

        let epoch = self.epoch;
        let sample_count = self.data.training().len();
        let epoch_completed = self.training_index >= sample_count;
        if epoch_completed {
            for (i, state) in self.states.iter_mut().enumerate() {
                log::info!(
                    "网络{} 轮次{}结束: 平均代价 {:.6}，丢弃不足一批的样本{}个",
                    i,
                    self.epoch,
                    state.epoch_error / sample_count as f32,
                    state.batch.len()
                );
                state.reset_epoch();
            }
            self.training_index = 0;
            self.epoch += 1;
            self.data.shuffle_training(&mut self.rng);
        }

        Ok(TrainStep {
            epoch,
            sample_index,
            error_costs,
            batch_applied,
            epoch_completed,
        })
    }

    /// 用一个测试样本对每个网络做前向传播并统计是否预测正确；
    /// 测试集走完一遍时输出准确率并调用`reset_test()`
    pub fn step_test(&mut self) -> Result<TestStep, TrainError> {
        if !self.initialized {
            return Err(TrainError::NotInitialized);
        }
        if self.data.test().is_empty() {
            return Err(DataError::EmptySet("测试集").into());
        }

        let sample_index = self.test_index;
        let sample = &self.data.test()[sample_index];
        let input = sample.input.clone();
        let label = sample.label;

        let mut correct = Vec::with_capacity(self.states.len());
        for state in &mut self.states {
            let output = state.network.forward_propagate(input.clone())?;
            let is_correct = output.argmax() == Some(label);
            state.test_total += 1;
            if is_correct {
                state.test_correct += 1;
            }
            correct.push(is_correct);
        }
        self.test_index += 1;

        let mut accuracies = None;
        if self.test_index >= self.data.test().len() {
            let mut values = Vec::with_capacity(self.states.len());
            for (i, state) in self.states.iter_mut().enumerate() {
                let accuracy = state.test_correct as f32 / state.test_total as f32;
                log::info!(
                    "网络{} 测试准确率: {:.2}% ({}/{})",
                    i,
                    accuracy * 100.0,
                    state.test_correct,
                    state.test_total
                );
                state.last_accuracy = Some(accuracy);
                values.push(accuracy);
            }
            accuracies = Some(values);
            self.reset_test();
        }

        Ok(TestStep {
            sample_index,
            correct,
            accuracies,
        })
    }

    /// 清零测试计数，下一次`step_test()`从第一个测试样本开始
    pub fn reset_test(&mut self) {
        self.test_index = 0;
        for state in &mut self.states {
            state.reset_test();
        }
    }

    /// 当前这一遍测试的准确率；还没测过任何样本时为None
    pub fn accuracy(&self, network_index: usize) -> Option<f32> {
        let state = self.states.get(network_index)?;
        (state.test_total > 0).then(|| state.test_correct as f32 / state.test_total as f32)
    }

    /// 最近一次走完测试集时的准确率
    pub fn last_accuracy(&self, network_index: usize) -> Option<f32> {
        self.states.get(network_index)?.last_accuracy
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        self.config.learning_rate = learning_rate;
    }

    pub fn data(&self) -> &DataSet {
        &self.data
    }

    /// 已完成的轮数
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// 已更新参数的批次数（跨轮次累计）
    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn network(&self, index: usize) -> Option<&Network> {
        self.states.get(index).map(|state| &state.network)
    }

    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.states.iter().map(|state| &state.network)
    }

    /// 取回所有网络，训练器随之销毁
    pub fn into_networks(self) -> Vec<Network> {
        self.states.into_iter().map(|state| state.network).collect()
    }
}
