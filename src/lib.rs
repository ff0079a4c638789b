//! # Only CNN
//!
//! `only_cnn`项目用纯rust手写一个卷积神经网络（CNN）训练引擎：
//! 网络由全连接、卷积、最大池化、展平四种层按顺序堆叠而成，
//! 前向传播与手动推导的反向传播都落在一组具名的并行核函数上，
//! 再由训练器按批次、轮次逐步驱动参数更新。
//!
//! 本库只通过[`log`]门面输出日志，具体的日志实现由调用方选择。
//!

pub mod data;
pub mod errors;
pub mod kernel;
pub mod matrix;
pub mod nn;
pub mod train;
pub mod utils;
pub mod vision;
