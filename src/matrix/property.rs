/*
 * @Author       : 老董
 * @Date         : 2026-03-02
 * @Description  : 本文件仅包含矩阵的属性、读写方法，不包含任何运算方法
 */

use super::Matrix;
use ndarray::{ArrayView2, ArrayViewMut2};

impl Matrix {
    /*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓快照/view(_mut)↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }
    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, f32> {
        self.data.view_mut()
    }
    /*↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑快照/view(_mut)↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑*/

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// [行数, 列数]
    pub fn shape(&self) -> [usize; 2] {
        [self.rows(), self.cols()]
    }

    /// 元素总数
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_same_shape(&self, other: &Matrix) -> bool {
        self.shape() == other.shape()
    }

    /// 按行优先顺序的底层缓冲区
    pub fn as_slice(&self) -> &[f32] {
        self.data
            .as_slice()
            .expect("矩阵内部存储始终为标准（行优先）布局")
    }

    pub fn as_slice_mut(&mut self) -> &mut [f32] {
        self.data
            .as_slice_mut()
            .expect("矩阵内部存储始终为标准（行优先）布局")
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.as_slice().to_vec()
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[[row, col]]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[[row, col]] = value;
    }

    /// 所有元素之和
    pub fn sum(&self) -> f32 {
        self.data.sum()
    }

    /// 按行优先顺序返回最大元素的下标；若有多个最大值则取第一个。空矩阵返回None
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (i, &value) in self.as_slice().iter().enumerate() {
            match best {
                Some((_, max)) if value <= max => {}
                _ => best = Some((i, value)),
            }
        }
        best.map(|(i, _)| i)
    }
}
