/*
 * @Author       : 老董
 * @Date         : 2026-03-02
 * @Description  : 稠密矩阵服务。网络中各层的输入、输出、参数及梯度均以本结构存储，
 *                 布局统一为行优先：特征图矩阵形如(depth, width*height)，向量形如(1, n)。
 */

use ndarray::Array2;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::errors::MatrixError;

mod activation;
mod ops;
mod property;

pub use activation::Activation;


/// 2阶的`f32`矩阵。内部存储始终保持标准（行优先）布局。
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Array2<f32>,
}

impl Matrix {
    /// 用给定数据创建一个`rows`行`cols`列的矩阵。
    /// `data`的长度必须等于`rows * cols`，否则会panic。
    pub fn new(data: &[f32], rows: usize, cols: usize) -> Matrix {
        assert!(
            data.len() == rows * cols,
            "{}",
            MatrixError::DataLengthMismatch {
                len: data.len(),
                shape: [rows, cols],
            }
        );
        Matrix {
            data: Array2::from_shape_fn((rows, cols), |(r, c)| data[r * cols + c]),
        }
    }

    /// 创建全零矩阵
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            data: Array2::zeros((rows, cols)),
        }
    }

    /// 创建一个随机矩阵，其值在[min, max]的闭区间内均匀分布
    pub fn new_random(min: f32, max: f32, rows: usize, cols: usize) -> Matrix {
        let mut rng = rand::thread_rng();
        Self::new_random_with_rng(min, max, rows, cols, &mut rng)
    }

    /// 同`new_random`，但使用固定种子，便于复现
    pub fn new_random_seeded(min: f32, max: f32, rows: usize, cols: usize, seed: u64) -> Matrix {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::new_random_with_rng(min, max, rows, cols, &mut rng)
    }

    pub fn new_random_with_rng<R: Rng + ?Sized>(
        min: f32,
        max: f32,
        rows: usize,
        cols: usize,
        rng: &mut R,
    ) -> Matrix {
        let uniform = Uniform::from(min..=max);
        let data = (0..rows * cols)
            .map(|_| uniform.sample(rng))
            .collect::<Vec<_>>();
        Matrix::new(&data, rows, cols)
    }

    /// 由`ndarray`的2阶数组直接构造（调用方需保证其为标准布局）
    pub(crate) fn from_array(data: Array2<f32>) -> Matrix {
        if data.is_standard_layout() {
            Matrix { data }
        } else {
            Matrix {
                data: data.as_standard_layout().into_owned(),
            }
        }
    }
}
