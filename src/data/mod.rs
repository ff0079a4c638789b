//! 数据加载模块
//!
//! 提供样本集合、one-hot 期望值以及基于 CSV 清单的图像数据集加载。
//!
//! # 主要组件
//!
//! - [`Sample`]: 单个样本（输入 + 从0开始的类别标签）
//! - [`DataSet`]: 训练集 + 测试集，负责打乱与生成期望输出
//! - [`DataError`]: 数据加载错误类型
//!
//! # 使用示例
//!
//! ```ignore
//! use only_cnn::data::DataSet;
//!
//! // 清单每行：`文件名,类别(从1开始),是否测试样本(TRUE|FALSE)`
//! let data = DataSet::from_manifest("images/", "images/manifest.csv")?;
//! let expected = data.expected(data.training()[0].label);
//! ```

mod dataset;
pub mod error;


// Re-exports
pub use dataset::{DataSet, Sample};
pub use error::DataError;
