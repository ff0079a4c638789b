/*
 * @Author       : 老董
 * @Date         : 2026-03-04
 * @Description  : 并行核函数服务。按名称查找核函数，按名称绑定缓冲区与整型参数，
 *                 再以三维线程组数量调度。调度是同步的：返回时结果已写入输出缓冲区。
 */

mod bucket;
mod buffer;
mod error;
mod functions;
mod program;

pub use bucket::{MAX_ELEMENTS_PER_DISPATCH, MAX_THREAD_GROUPS, SizeBucket, ThreadGroups};
pub use buffer::ComputeBuffer;
pub use error::KernelError;
pub use program::{KernelId, KernelProgram};

use serde::{Deserialize, Serialize};


/// 卷积层输入的来源：矩阵（上一层的特征图）或纹理（图像）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputSource {
    #[default]
    Matrix,
    Texture,
}

impl InputSource {
    /// 对应核函数读取的输入缓冲区名称
    pub const fn buffer_name(&self) -> &'static str {
        match self {
            InputSource::Matrix => "MatrixInput",
            InputSource::Texture => "TextureInput",
        }
    }

    /// 核函数名称中的来源部分
    pub(crate) const fn kernel_suffix(&self) -> &'static str {
        match self {
            InputSource::Matrix => "Matrix",
            InputSource::Texture => "Texture",
        }
    }
}

/// 滑动窗口的几何参数（卷积、权重梯度卷积与池化共用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowGeometry {
    pub input_width: usize,
    pub input_height: usize,
    pub depth: usize,
    pub window_width: usize,
    pub window_height: usize,
    /// 有符号：反向求上游梯度时填充为`K - 1 - P`，可能为负
    pub padding: i64,
    pub stride: usize,
    pub output_width: usize,
    pub output_height: usize,
}

impl WindowGeometry {
    pub fn input_area(&self) -> usize {
        self.input_width * self.input_height
    }

    pub fn window_area(&self) -> usize {
        self.window_width * self.window_height
    }

    pub fn output_area(&self) -> usize {
        self.output_width * self.output_height
    }

    /// 窗口展开后矩阵的元素数：(depth*窗口面积) x 输出面积
    pub fn unrolled_len(&self) -> usize {
        self.depth * self.window_area() * self.output_area()
    }
}
