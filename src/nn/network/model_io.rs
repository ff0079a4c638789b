/*
 * @Author       : 老董
 * @Date         : 2026-03-12
 * @Description  : 网络参数的导出与导入
 *
 * 格式：扁平字节流，无文件头、无形状信息、无版本号。
 * 按网络顺序，对每个带参数的层依次写入权重、偏置，每个值为本机字节序的4字节浮点数。
 * 只能导入到拓扑（各层形状及顺序）完全相同的网络中。
 */

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::Network;
use crate::nn::{NetworkError, TraitLayer};

/// 参数文件的默认扩展名
pub const PARAMETER_FILE_EXTENSION: &str = "arby";

const FLOAT_BYTES: usize = std::mem::size_of::<f32>();

impl Network {
    /// 将参数写入`writer`
    pub fn export_parameters<W: Write>(&self, writer: &mut W) -> Result<(), NetworkError> {
        for layer in &self.layers {
            if let Some((weights, bias)) = layer.parameters() {
                for value in weights.as_slice().iter().chain(bias.as_slice()) {
                    writer.write_all(&value.to_ne_bytes())?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// 从`reader`读取参数并覆盖当前参数。字节数须与网络拓扑完全吻合，否则不做任何修改
    pub fn import_parameters<R: Read>(&mut self, reader: &mut R) -> Result<(), NetworkError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let expected = self.param_count() * FLOAT_BYTES;
        if bytes.len() != expected {
            return Err(NetworkError::ParameterLength {
                expected,
                got: bytes.len(),
            });
        }

        let mut values = bytes
            .chunks_exact(FLOAT_BYTES)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        for layer in &mut self.layers {
            if let Some((weights, bias)) = layer.parameters_mut() {
                for (target, value) in weights.as_slice_mut().iter_mut().zip(values.by_ref()) {
                    *target = value;
                }
                for (target, value) in bias.as_slice_mut().iter_mut().zip(values.by_ref()) {
                    *target = value;
                }
            }
        }
        Ok(())
    }

    /// 导出参数到文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), NetworkError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.export_parameters(&mut writer)
    }

    /// 从文件导入参数
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), NetworkError> {
        let mut reader = BufReader::new(File::open(path)?);
        self.import_parameters(&mut reader)
    }
}
