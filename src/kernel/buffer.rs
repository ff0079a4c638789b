use super::KernelError;

/// 核函数读写的一维`f32`缓冲区，由创建它的程序（即所属的层）独占
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputeBuffer {
    data: Vec<f32>,
}

impl ComputeBuffer {
    /// 创建长度为`len`的全零缓冲区
    pub fn new(len: usize) -> Self {
        Self {
            data: vec![0.0; len],
        }
    }

    pub fn from_slice(data: &[f32]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_slice_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// 主机 -> 缓冲区。长度须一致
    pub fn set_data(&mut self, name: &str, source: &[f32]) -> Result<(), KernelError> {
        self.check_len(name, source.len())?;
        self.data.copy_from_slice(source);
        Ok(())
    }

    /// 缓冲区 -> 主机。长度须一致
    pub fn get_data(&self, name: &str, target: &mut [f32]) -> Result<(), KernelError> {
        self.check_len(name, target.len())?;
        target.copy_from_slice(&self.data);
        Ok(())
    }

    pub(crate) fn check_len(&self, name: &str, expected: usize) -> Result<(), KernelError> {
        if self.data.len() != expected {
            return Err(KernelError::BufferLength {
                buffer: name.to_string(),
                expected,
                got: self.data.len(),
            });
        }
        Ok(())
    }
}
