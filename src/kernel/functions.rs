/*
 * @Author       : 老董
 * @Date         : 2026-03-04
 * @Description  : 各核函数的计算本体。均为纯函数：只读输入切片、只写输出切片，
 *                 按输出的行（或通道平面）切块后用Rayon并行执行。
 *
 * 约定：特征图以(通道, 行*宽 + 列)的行优先顺序存放。
 */

use rayon::prelude::*;

use super::WindowGeometry;

/// 在第`c`个通道平面上按有符号坐标取值，越界处视为零填充
#[inline]
fn sample(plane: &[f32], width: usize, height: usize, y: i64, x: i64) -> f32 {
    if y < 0 || x < 0 || y >= height as i64 || x >= width as i64 {
        0.0
    } else {
        plane[y as usize * width + x as usize]
    }
}

/// 窗口展开（im2col）：输出形如(depth*窗口面积, 输出面积)，
/// `out[c*Kh*Kw + ky*Kw + kx, oy*Wo + ox] = X[c, oy*S + ky - P, ox*S + kx - P]`
pub(crate) fn extract_windows(input: &[f32], geometry: &WindowGeometry, out: &mut [f32]) {
    let g = *geometry;
    let input_area = g.input_area();
    let window_area = g.window_area();
    let output_area = g.output_area();
    if output_area == 0 {
        return;
    }

    out.par_chunks_mut(output_area)
        .enumerate()
        .for_each(|(row, out_row)| {
            let c = row / window_area;
            let ky = (row % window_area) / g.window_width;
            let kx = (row % window_area) % g.window_width;
            let plane = &input[c * input_area..(c + 1) * input_area];
            for oy in 0..g.output_height {
                let y = (oy * g.stride + ky) as i64 - g.padding;
                for ox in 0..g.output_width {
                    let x = (ox * g.stride + kx) as i64 - g.padding;
                    out_row[oy * g.output_width + ox] =
                        sample(plane, g.input_width, g.input_height, y, x);
                }
            }
        });
}

/// 求权重梯度用的窗口展开：此时“窗口”为膨胀后的gamma，输出尺寸即卷积核尺寸。
/// 输出形如(窗口面积, depth*输出面积)，
/// `out[dy*Wd + dx, c*K*K + ky*K + kx] = X[c, ky*S + dy - P, kx*S + dx - P]`
pub(crate) fn extract_weight_windows(input: &[f32], geometry: &WindowGeometry, out: &mut [f32]) {
    let g = *geometry;
    let input_area = g.input_area();
    let output_area = g.output_area();
    let cols = g.depth * output_area;
    if cols == 0 {
        return;
    }

    out.par_chunks_mut(cols).enumerate().for_each(|(row, out_row)| {
        let dy = row / g.window_width;
        let dx = row % g.window_width;
        for c in 0..g.depth {
            let plane = &input[c * input_area..(c + 1) * input_area];
            for ky in 0..g.output_height {
                let y = (ky * g.stride + dy) as i64 - g.padding;
                for kx in 0..g.output_width {
                    let x = (kx * g.stride + dx) as i64 - g.padding;
                    out_row[c * output_area + ky * g.output_width + kx] =
                        sample(plane, g.input_width, g.input_height, y, x);
                }
            }
        }
    });
}

/// 零膨胀：在相邻元素间沿两个空间轴各插入`dilation`个零
pub(crate) fn dilate(
    input: &[f32],
    width: usize,
    height: usize,
    dilation: usize,
    out: &mut [f32],
) {
    let step = dilation + 1;
    let dilated_width = width + (width.saturating_sub(1)) * dilation;
    let dilated_height = height + (height.saturating_sub(1)) * dilation;
    let dilated_area = dilated_width * dilated_height;
    if dilated_area == 0 {
        return;
    }

    out.par_chunks_mut(dilated_area)
        .zip(input.par_chunks(width * height))
        .for_each(|(out_plane, plane)| {
            out_plane.fill(0.0);
            for y in 0..height {
                for x in 0..width {
                    out_plane[y * step * dilated_width + x * step] = plane[y * width + x];
                }
            }
        });
}

/// 卷积核翻转：交换输入/输出通道，并将窗口内的下标倒序（即空间上旋转180°）。
/// `out[c, o*KK + r] = filter[o, c*KK + (KK - 1 - r)]`
pub(crate) fn flip_filter(
    filter: &[f32],
    window_area: usize,
    in_depth: usize,
    out_depth: usize,
    out: &mut [f32],
) {
    let cols = out_depth * window_area;
    if cols == 0 {
        return;
    }

    out.par_chunks_mut(cols).enumerate().for_each(|(c, out_row)| {
        for o in 0..out_depth {
            let filter_row = &filter[o * in_depth * window_area..(o + 1) * in_depth * window_area];
            for r in 0..window_area {
                out_row[o * window_area + r] =
                    filter_row[c * window_area + (window_area - 1 - r)];
            }
        }
    });
}

/// 返回窗口内最大值及其在通道平面内的下标；并列时取扫描顺序上的第一个
fn window_argmax(plane: &[f32], g: &WindowGeometry, oy: usize, ox: usize) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for ky in 0..g.window_height {
        let y = oy * g.stride + ky;
        if y >= g.input_height {
            break;
        }
        for kx in 0..g.window_width {
            let x = ox * g.stride + kx;
            if x >= g.input_width {
                break;
            }
            let index = y * g.input_width + x;
            let value = plane[index];
            match best {
                Some((_, max)) if value <= max => {}
                _ => best = Some((index, value)),
            }
        }
    }
    best
}

/// 最大池化前向：每个输出位置取其窗口内的最大值
pub(crate) fn max_pool(input: &[f32], geometry: &WindowGeometry, out: &mut [f32]) {
    let g = *geometry;
    let input_area = g.input_area();
    let output_area = g.output_area();
    if output_area == 0 {
        return;
    }

    out.par_chunks_mut(output_area)
        .zip(input.par_chunks(input_area))
        .for_each(|(out_plane, plane)| {
            for oy in 0..g.output_height {
                for ox in 0..g.output_width {
                    out_plane[oy * g.output_width + ox] =
                        window_argmax(plane, &g, oy, ox).map_or(0.0, |(_, max)| max);
                }
            }
        });
}

/// 最大池化反向：把每个输出位置的梯度送往缓存输入中该窗口最大值所在的位置，其余为零。
/// 窗口重叠时梯度累加
pub(crate) fn max_pool_backward(
    input: &[f32],
    deltas: &[f32],
    geometry: &WindowGeometry,
    out: &mut [f32],
) {
    let g = *geometry;
    let input_area = g.input_area();
    let output_area = g.output_area();
    if input_area == 0 {
        return;
    }

    out.par_chunks_mut(input_area)
        .zip(input.par_chunks(input_area))
        .zip(deltas.par_chunks(output_area.max(1)))
        .for_each(|((out_plane, plane), delta_plane)| {
            out_plane.fill(0.0);
            for oy in 0..g.output_height {
                for ox in 0..g.output_width {
                    if let Some((index, _)) = window_argmax(plane, &g, oy, ox) {
                        out_plane[index] += delta_plane[oy * g.output_width + ox];
                    }
                }
            }
        });
}

/// 取第`index`个特征图，将[-1, 1]映射到[0, 1]（超出部分截断），供可视化使用
pub(crate) fn render_plane(input: &[f32], index: usize, area: usize, out: &mut [f32]) {
    let plane = &input[index * area..(index + 1) * area];
    out.par_iter_mut()
        .zip(plane.par_iter())
        .for_each(|(o, &v)| *o = ((v + 1.0) * 0.5).clamp(0.0, 1.0));
}
