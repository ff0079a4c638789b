/*
 * TensorShape: 层的输入/输出张量尺寸（宽、高、深度）
 *
 * 每个层在构造时确定其输入、输出尺寸，此后不再改变。
 * 对应的矩阵布局为 (depth, width * height)。
 *
 * # 示例
 * ```
 * use only_cnn::nn::TensorShape;
 *
 * let shape = TensorShape::new(28, 28, 3);
 * assert_eq!(shape.area(), 784);
 * assert_eq!(shape.volume(), 2352);
 * assert_eq!(shape.to_string(), "(28, 28, 3)");
 * ```
 */

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorShape {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

impl TensorShape {
    pub const fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// 长度为`len`的向量，即 (len, 1, 1)
    pub const fn vector(len: usize) -> Self {
        Self::new(len, 1, 1)
    }

    /// 单个特征图的元素数
    pub const fn area(&self) -> usize {
        self.width * self.height
    }

    /// 全部元素数
    pub const fn volume(&self) -> usize {
        self.width * self.height * self.depth
    }

    /// 对应矩阵的形状 [depth, width * height]
    pub const fn matrix_shape(&self) -> [usize; 2] {
        [self.depth, self.area()]
    }
}

impl Default for TensorShape {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.width, self.height, self.depth)
    }
}
