/*
 * @Author       : 老董
 * @Date         : 2026-03-04
 * @Description  : 核函数程序：持有按名称绑定的缓冲区与整型参数，按名称查找核函数并调度。
 *                 每个层独占自己的程序实例，`release`（或析构）时释放全部缓冲区。
 */

use std::collections::HashMap;

use super::{
    ComputeBuffer, InputSource, KernelError, SizeBucket, WindowGeometry, functions,
};

/// `find_kernel`返回的核函数句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KernelKind {
    /// 窗口展开（前向卷积、上游梯度卷积）
    FilterOperation(InputSource, SizeBucket),
    /// 权重梯度的窗口展开
    BackPropFilterOperation(InputSource, SizeBucket),
    /// 零膨胀
    DialateMatrix,
    /// 卷积核翻转
    FlipFilter,
    PoolingOperation(SizeBucket),
    BackPropPoolingOperation(SizeBucket),
    /// 特征图 -> 可视化缓冲区
    GenerateTexture,
}

const BUCKETS: [SizeBucket; 3] = [SizeBucket::Small, SizeBucket::Medium, SizeBucket::Large];
const SOURCES: [InputSource; 2] = [InputSource::Matrix, InputSource::Texture];

impl KernelKind {
    fn all() -> Vec<KernelKind> {
        let mut kinds = Vec::new();
        for source in SOURCES {
            for bucket in BUCKETS {
                kinds.push(KernelKind::FilterOperation(source, bucket));
                kinds.push(KernelKind::BackPropFilterOperation(source, bucket));
            }
        }
        for bucket in BUCKETS {
            kinds.push(KernelKind::PoolingOperation(bucket));
            kinds.push(KernelKind::BackPropPoolingOperation(bucket));
        }
        kinds.push(KernelKind::DialateMatrix);
        kinds.push(KernelKind::FlipFilter);
        kinds.push(KernelKind::GenerateTexture);
        kinds
    }

    fn name(&self) -> String {
        match self {
            KernelKind::FilterOperation(source, bucket) => {
                bucket.kernel_name(&format!("FilterOperation{}", source.kernel_suffix()))
            }
            KernelKind::BackPropFilterOperation(source, bucket) => {
                bucket.kernel_name(&format!("BackPropFilterOperation{}", source.kernel_suffix()))
            }
            KernelKind::DialateMatrix => "DialateMatrix".to_string(),
            KernelKind::FlipFilter => "FlipFilter".to_string(),
            KernelKind::PoolingOperation(bucket) => bucket.kernel_name("PoolingOperation"),
            KernelKind::BackPropPoolingOperation(bucket) => {
                bucket.kernel_name("BackPropPoolingOperation")
            }
            KernelKind::GenerateTexture => "GenerateTexture".to_string(),
        }
    }
}

/// 核函数程序。缓冲区与整型参数在程序内按名称共享，所有核函数都可读取
pub struct KernelProgram {
    name: String,
    kernels: Vec<KernelKind>,
    buffers: HashMap<String, ComputeBuffer>,
    ints: HashMap<String, i32>,
    released: bool,
}

impl std::fmt::Debug for KernelProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut buffers = self.buffers.keys().collect::<Vec<_>>();
        buffers.sort();
        f.debug_struct("KernelProgram")
            .field("name", &self.name)
            .field("buffers", &buffers)
            .field("released", &self.released)
            .finish()
    }
}

impl KernelProgram {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kernels: KernelKind::all(),
            buffers: HashMap::new(),
            ints: HashMap::new(),
            released: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// 按名称查找核函数，如`FilterOperationMatrix_16`、`DialateMatrix`
    pub fn find_kernel(&self, name: &str) -> Result<KernelId, KernelError> {
        self.kernels
            .iter()
            .position(|kind| kind.name() == name)
            .map(KernelId)
            .ok_or_else(|| KernelError::KernelNotFound(name.to_string()))
    }

    pub fn kernel_name(&self, kernel: KernelId) -> Option<String> {
        self.kernels.get(kernel.0).map(KernelKind::name)
    }

    /*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓参数与缓冲区绑定↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
    pub fn set_int(&mut self, name: &str, value: i32) {
        self.ints.insert(name.to_string(), value);
    }

    pub fn get_int(&self, name: &str) -> Option<i32> {
        self.ints.get(name).copied()
    }

    /// 写入窗口几何参数（`TextureWidth`、`FilterWidth`、`ZeroPadding`、`Stride`、`OutputWidth`等）
    pub fn set_window_geometry(&mut self, geometry: &WindowGeometry) {
        self.set_int("TextureWidth", geometry.input_width as i32);
        self.set_int("TextureHeight", geometry.input_height as i32);
        self.set_int("Depth", geometry.depth as i32);
        self.set_int("FilterWidth", geometry.window_width as i32);
        self.set_int("FilterHeight", geometry.window_height as i32);
        self.set_int("ZeroPadding", geometry.padding as i32);
        self.set_int("Stride", geometry.stride as i32);
        self.set_int("OutputWidth", geometry.output_width as i32);
        self.set_int("OutputHeight", geometry.output_height as i32);
    }

    /// 绑定（或替换）名为`name`的缓冲区
    pub fn set_buffer(&mut self, name: &str, buffer: ComputeBuffer) {
        self.buffers.insert(name.to_string(), buffer);
    }

    pub fn buffer(&self, name: &str) -> Option<&ComputeBuffer> {
        self.buffers.get(name)
    }

    pub fn buffer_mut(&mut self, name: &str) -> Option<&mut ComputeBuffer> {
        self.buffers.get_mut(name)
    }

    /// 主机数据写入已绑定的缓冲区
    pub fn write_buffer(&mut self, name: &str, data: &[f32]) -> Result<(), KernelError> {
        let program = self.name.clone();
        self.buffers
            .get_mut(name)
            .ok_or_else(|| KernelError::BufferNotBound {
                kernel: program,
                buffer: name.to_string(),
            })?
            .set_data(name, data)
    }

    /// 已绑定的缓冲区读回主机
    pub fn read_buffer(&self, name: &str, target: &mut [f32]) -> Result<(), KernelError> {
        self.bound(&self.name, name)?.get_data(name, target)
    }
    /*↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑参数与缓冲区绑定↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑*/

    /// 释放全部缓冲区。可重复调用；释放后再调度会返回`KernelError::Released`
    pub fn release(&mut self) {
        self.buffers.clear();
        self.ints.clear();
        self.released = true;
    }

    /// 以`(groups_x, groups_y, groups_z)`个线程组同步执行核函数
    pub fn dispatch(
        &mut self,
        kernel: KernelId,
        groups_x: usize,
        groups_y: usize,
        groups_z: usize,
    ) -> Result<(), KernelError> {
        if self.released {
            return Err(KernelError::Released(self.name.clone()));
        }
        let kind = *self
            .kernels
            .get(kernel.0)
            .ok_or_else(|| KernelError::KernelNotFound(format!("#{}", kernel.0)))?;
        let kernel_name = kind.name();
        let groups = [groups_x, groups_y, groups_z];

        match kind {
            KernelKind::FilterOperation(source, bucket) => {
                let g = self.window_geometry(&kernel_name)?;
                check_grid(
                    &kernel_name,
                    groups,
                    [bucket.threads(), 1, 1],
                    [g.output_area(), g.window_area(), g.depth],
                )?;
                self.with_output(&kernel_name, "ConvolutionTensor", |program, out| {
                    out.check_len("ConvolutionTensor", g.unrolled_len())?;
                    let input = program.bound(&kernel_name, source.buffer_name())?;
                    input.check_len(source.buffer_name(), g.depth * g.input_area())?;
                    functions::extract_windows(input.as_slice(), &g, out.as_slice_mut());
                    Ok(())
                })
            }
            KernelKind::BackPropFilterOperation(source, bucket) => {
                let g = self.window_geometry(&kernel_name)?;
                check_grid(
                    &kernel_name,
                    groups,
                    [1, bucket.threads(), 1],
                    [g.output_area(), g.window_area(), g.depth],
                )?;
                self.with_output(&kernel_name, "ConvolutionTensor", |program, out| {
                    out.check_len("ConvolutionTensor", g.unrolled_len())?;
                    let input = program.bound(&kernel_name, source.buffer_name())?;
                    input.check_len(source.buffer_name(), g.depth * g.input_area())?;
                    functions::extract_weight_windows(input.as_slice(), &g, out.as_slice_mut());
                    Ok(())
                })
            }
            KernelKind::DialateMatrix => {
                let width = self.uint(&kernel_name, "NonDialatedWidth")?;
                let height = self.uint(&kernel_name, "NonDialatedHeight")?;
                let dilation = self.uint(&kernel_name, "DStride")?;
                let depth = self.uint(&kernel_name, "OutputDepth")?;
                check_grid(&kernel_name, groups, [8, 8, 1], [width, height, depth])?;
                let dilated_width = width + width.saturating_sub(1) * dilation;
                let dilated_height = height + height.saturating_sub(1) * dilation;
                self.with_output(&kernel_name, "DialatedOutput", |program, out| {
                    out.check_len("DialatedOutput", depth * dilated_width * dilated_height)?;
                    let input = program.bound(&kernel_name, "NonDialatedOutput")?;
                    input.check_len("NonDialatedOutput", depth * width * height)?;
                    functions::dilate(input.as_slice(), width, height, dilation, out.as_slice_mut());
                    Ok(())
                })
            }
            KernelKind::FlipFilter => {
                let window_area = self.uint(&kernel_name, "FilterWidth")?
                    * self.uint(&kernel_name, "FilterHeight")?;
                let in_depth = self.uint(&kernel_name, "FilterInputDepth")?;
                let out_depth = self.uint(&kernel_name, "FilterOutputDepth")?;
                check_grid(&kernel_name, groups, [1, 1, 1], [in_depth, out_depth, 1])?;
                self.with_output(&kernel_name, "FlippedFilter", |program, out| {
                    let len = in_depth * out_depth * window_area;
                    out.check_len("FlippedFilter", len)?;
                    let filter = program.bound(&kernel_name, "FilterInput")?;
                    filter.check_len("FilterInput", len)?;
                    functions::flip_filter(
                        filter.as_slice(),
                        window_area,
                        in_depth,
                        out_depth,
                        out.as_slice_mut(),
                    );
                    Ok(())
                })
            }
            KernelKind::PoolingOperation(bucket) => {
                let g = self.window_geometry(&kernel_name)?;
                check_grid(
                    &kernel_name,
                    groups,
                    [bucket.threads(), 1, 1],
                    [g.output_area(), 1, g.depth],
                )?;
                self.with_output(&kernel_name, "PoolOutput", |program, out| {
                    out.check_len("PoolOutput", g.depth * g.output_area())?;
                    let input = program.bound(&kernel_name, "PoolInput")?;
                    input.check_len("PoolInput", g.depth * g.input_area())?;
                    functions::max_pool(input.as_slice(), &g, out.as_slice_mut());
                    Ok(())
                })
            }
            KernelKind::BackPropPoolingOperation(bucket) => {
                let g = self.window_geometry(&kernel_name)?;
                check_grid(
                    &kernel_name,
                    groups,
                    [bucket.threads(), 1, 1],
                    [g.output_area(), 1, g.depth],
                )?;
                self.with_output(&kernel_name, "LayerDeltas", |program, out| {
                    out.check_len("LayerDeltas", g.depth * g.input_area())?;
                    let input = program.bound(&kernel_name, "PoolInput")?;
                    input.check_len("PoolInput", g.depth * g.input_area())?;
                    let deltas = program.bound(&kernel_name, "PoolDeltas")?;
                    deltas.check_len("PoolDeltas", g.depth * g.output_area())?;
                    functions::max_pool_backward(
                        input.as_slice(),
                        deltas.as_slice(),
                        &g,
                        out.as_slice_mut(),
                    );
                    Ok(())
                })
            }
            KernelKind::GenerateTexture => {
                let width = self.uint(&kernel_name, "TextureWidth")?;
                let height = self.uint(&kernel_name, "TextureHeight")?;
                let index = self.uint(&kernel_name, "FilterIndex")?;
                let maps = self.uint(&kernel_name, "NumFeatureMaps")?;
                let len = self.uint(&kernel_name, "RenderBufferLength")?;
                check_grid(&kernel_name, groups, [8, 8, 1], [width, height, 1])?;
                if index >= maps || len != maps * width * height {
                    return Err(KernelError::InvalidUniform {
                        kernel: kernel_name,
                        name: "FilterIndex".to_string(),
                        value: index as i32,
                    });
                }
                self.with_output(&kernel_name, "RenderOutput", |program, out| {
                    out.check_len("RenderOutput", width * height)?;
                    let input = program.bound(&kernel_name, "RenderInput")?;
                    input.check_len("RenderInput", len)?;
                    functions::render_plane(input.as_slice(), index, width * height, out.as_slice_mut());
                    Ok(())
                })
            }
        }
    }

    /*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓私有方法↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
    fn bound(&self, kernel: &str, buffer: &str) -> Result<&ComputeBuffer, KernelError> {
        self.buffers
            .get(buffer)
            .ok_or_else(|| KernelError::BufferNotBound {
                kernel: kernel.to_string(),
                buffer: buffer.to_string(),
            })
    }

    fn int(&self, kernel: &str, name: &str) -> Result<i32, KernelError> {
        self.get_int(name).ok_or_else(|| KernelError::UniformNotSet {
            kernel: kernel.to_string(),
            name: name.to_string(),
        })
    }

    fn uint(&self, kernel: &str, name: &str) -> Result<usize, KernelError> {
        let value = self.int(kernel, name)?;
        usize::try_from(value).map_err(|_| KernelError::InvalidUniform {
            kernel: kernel.to_string(),
            name: name.to_string(),
            value,
        })
    }

    fn window_geometry(&self, kernel: &str) -> Result<WindowGeometry, KernelError> {
        Ok(WindowGeometry {
            input_width: self.uint(kernel, "TextureWidth")?,
            input_height: self.uint(kernel, "TextureHeight")?,
            depth: self.uint(kernel, "Depth")?,
            window_width: self.uint(kernel, "FilterWidth")?,
            window_height: self.uint(kernel, "FilterHeight")?,
            padding: self.int(kernel, "ZeroPadding")? as i64,
            stride: self.uint(kernel, "Stride")?,
            output_width: self.uint(kernel, "OutputWidth")?,
            output_height: self.uint(kernel, "OutputHeight")?,
        })
    }

    /// 暂时取出输出缓冲区，使核函数能同时读取其它缓冲区，执行后放回
    fn with_output<F>(&mut self, kernel: &str, output: &str, f: F) -> Result<(), KernelError>
    where
        F: FnOnce(&Self, &mut ComputeBuffer) -> Result<(), KernelError>,
    {
        let mut buffer =
            self.buffers
                .remove(output)
                .ok_or_else(|| KernelError::BufferNotBound {
                    kernel: kernel.to_string(),
                    buffer: output.to_string(),
                })?;
        let result = f(self, &mut buffer);
        self.buffers.insert(output.to_string(), buffer);
        result
    }
    /*↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑私有方法↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑*/
}

impl Drop for KernelProgram {
    fn drop(&mut self) {
        self.release();
    }
}

fn check_grid(
    kernel: &str,
    groups: [usize; 3],
    threads: [usize; 3],
    required: [usize; 3],
) -> Result<(), KernelError> {
    let covered = (0..3).all(|axis| groups[axis] * threads[axis] >= required[axis]);
    if covered {
        Ok(())
    } else {
        Err(KernelError::GridTooSmall {
            kernel: kernel.to_string(),
            groups,
            required,
        })
    }
}
