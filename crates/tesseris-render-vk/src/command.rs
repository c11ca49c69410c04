// SPDX-License-Identifier: CEPL-1.0
use crate::error::{OpContext, VkResult};
use ash::vk;

/// Resettable pool on one queue family plus the primary buffers allocated
/// from it, one per framebuffer.
pub struct CommandPool {
    device: ash::Device,
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl CommandPool {
    pub fn create(device: &ash::Device, queue_family: u32) -> VkResult<Self> {
        let info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: queue_family,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            ..Default::default()
        };
        let pool = unsafe { device.create_command_pool(&info, None) }.op("vkCreateCommandPool")?;
        Ok(Self {
            device: device.clone(),
            pool,
            buffers: Vec::new(),
        })
    }

    /// Replaces the current buffers with `count` fresh ones in one call.
    pub fn allocate(&mut self, count: usize) -> VkResult<()> {
        self.free_buffers();
        if count == 0 {
            return Ok(());
        }
        let info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count as u32,
            ..Default::default()
        };
        self.buffers =
            unsafe { self.device.allocate_command_buffers(&info) }.op("vkAllocateCommandBuffers")?;
        Ok(())
    }

    pub fn free_buffers(&mut self) {
        if !self.buffers.is_empty() && self.pool != vk::CommandPool::null() {
            unsafe { self.device.free_command_buffers(self.pool, &self.buffers) };
        }
        self.buffers.clear();
    }

    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    pub fn buffer(&self, index: usize) -> Option<vk::CommandBuffer> {
        self.buffers.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn is_destroyed(&self) -> bool {
        self.pool == vk::CommandPool::null()
    }

    pub fn destroy(&mut self) {
        self.free_buffers();
        if self.pool != vk::CommandPool::null() {
            unsafe { self.device.destroy_command_pool(self.pool, None) };
            self.pool = vk::CommandPool::null();
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        self.destroy();
    }
}
