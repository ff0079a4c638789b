/*
 * @Author       : 老董
 * @Date         : 2026-03-14
 * @Description  : 本模块把层的输出（特征图）渲染成灰度图，供外部可视化使用。
 *                 这里只读取层的输出，层本身不持有任何可视化对象。
 *                 “灰度”（图）等同于英文中luma、luminance、grey、gray的概念。
 */

use image::{GrayImage, Luma};

use crate::kernel::{ComputeBuffer, KernelProgram};
use crate::matrix::Matrix;
use crate::nn::{Layer, NetworkError, TensorShape, TraitLayer};

#[cfg(test)]
mod tests;

pub struct Vision;

impl Vision {
    /// 把层输出中第`map_index`张特征图渲染为宽×高的灰度图：
    /// 值域[-1, 1]线性映射到0..255，超出部分截断
    pub fn render_feature_map(layer: &Layer, map_index: usize) -> Result<GrayImage, NetworkError> {
        Self::render_matrix(layer.output(), layer.output_tensor(), map_index)
    }

    /// 渲染层输出的全部特征图
    pub fn render_feature_maps(layer: &Layer) -> Result<Vec<GrayImage>, NetworkError> {
        let tensor = layer.output_tensor();
        (0..tensor.depth)
            .map(|i| Self::render_matrix(layer.output(), tensor, i))
            .collect()
    }

    /// 同`render_feature_map`，直接作用于(depth, width * height)布局的矩阵
    pub fn render_matrix(
        output: &Matrix,
        tensor: TensorShape,
        map_index: usize,
    ) -> Result<GrayImage, NetworkError> {
        if output.len() != tensor.volume() {
            return Err(NetworkError::InvalidInput(format!(
                "输出有{}个元素，与张量{}不符",
                output.len(),
                tensor
            )));
        }
        if map_index >= tensor.depth {
            return Err(NetworkError::InvalidInput(format!(
                "特征图序号{}超出范围，共{}张",
                map_index, tensor.depth
            )));
        }

        let area = tensor.area();
        let mut program = KernelProgram::new("GenerateTexture");
        program.set_int("TextureWidth", tensor.width as i32);
        program.set_int("TextureHeight", tensor.height as i32);
        program.set_int("FilterIndex", map_index as i32);
        program.set_int("NumFeatureMaps", tensor.depth as i32);
        program.set_int("RenderBufferLength", tensor.volume() as i32);
        program.set_buffer("RenderInput", ComputeBuffer::from_slice(output.as_slice()));
        program.set_buffer("RenderOutput", ComputeBuffer::new(area));

        let kernel = program.find_kernel("GenerateTexture")?;
        program.dispatch(kernel, tensor.width / 8 + 1, tensor.height / 8 + 1, 1)?;

        let mut plane = vec![0.0; area];
        program.read_buffer("RenderOutput", &mut plane)?;
        program.release();

        let width = tensor.width as u32;
        Ok(GrayImage::from_fn(width, tensor.height as u32, |x, y| {
            let value = plane[(y * width + x) as usize];
            Luma([(value * 255.0).round() as u8])
        }))
    }
}
