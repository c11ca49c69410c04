// SPDX-License-Identifier: CEPL-1.0
use crate::error::{OpContext, VkError, VkResult};
use ash::util::read_spv;
use ash::vk;
use std::io::Cursor;
use std::path::Path;

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// SPIR-V compiled from `shaders/` by the build script.
pub mod builtin {
    pub const CUBE_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/cube.vert.spv"));
    pub const CUBE_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/cube.frag.spv"));
    pub const TRIANGLE_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.vert.spv"));
    pub const TRIANGLE_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.frag.spv"));
}

/// Validates length and magic, fixing endianness if needed.
pub fn spirv_words(bytes: &[u8]) -> VkResult<Vec<u32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(VkError::MisalignedSpirv(bytes.len()));
    }
    let words = read_spv(&mut Cursor::new(bytes)).map_err(|_| VkError::MisalignedSpirv(bytes.len()))?;
    if words.first() != Some(&SPIRV_MAGIC) {
        return Err(VkError::InvalidArgument("missing SPIR-V magic number"));
    }
    Ok(words)
}

pub struct ShaderModule {
    device: ash::Device,
    handle: vk::ShaderModule,
}

impl ShaderModule {
    pub fn from_bytes(device: &ash::Device, bytes: &[u8]) -> VkResult<Self> {
        let code = spirv_words(bytes)?;
        let info = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            code_size: code.len() * 4,
            p_code: code.as_ptr(),
            ..Default::default()
        };
        let handle =
            unsafe { device.create_shader_module(&info, None) }.op("vkCreateShaderModule")?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    pub fn from_file(device: &ash::Device, path: &Path) -> VkResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| VkError::ShaderIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(device, &bytes)
    }

    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.handle, None) };
    }
}
