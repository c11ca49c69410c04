// SPDX-License-Identifier: CEPL-1.0
use crate::buffer::GpuBuffer;
use crate::error::{OpContext, VkResult};
use ash::vk;

/// Pool sized for the single set-0 uniform set.
pub struct DescriptorPool {
    device: ash::Device,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    pub fn create(device: &ash::Device) -> VkResult<Self> {
        let sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
        }];
        let info = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            max_sets: 1,
            pool_size_count: sizes.len() as u32,
            p_pool_sizes: sizes.as_ptr(),
            ..Default::default()
        };
        let pool =
            unsafe { device.create_descriptor_pool(&info, None) }.op("vkCreateDescriptorPool")?;
        Ok(Self {
            device: device.clone(),
            pool,
        })
    }

    /// Allocates a set from `layout` and points binding 0 at `uniforms`.
    pub fn allocate_uniform_set(
        &self,
        layout: vk::DescriptorSetLayout,
        uniforms: &GpuBuffer,
    ) -> VkResult<vk::DescriptorSet> {
        let info = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: self.pool,
            descriptor_set_count: 1,
            p_set_layouts: &layout,
            ..Default::default()
        };
        let set = unsafe { self.device.allocate_descriptor_sets(&info) }
            .op("vkAllocateDescriptorSets")?[0];

        let buffer_info = vk::DescriptorBufferInfo {
            buffer: uniforms.handle(),
            offset: 0,
            range: uniforms.size(),
        };
        let write = vk::WriteDescriptorSet {
            s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
            dst_set: set,
            dst_binding: 0,
            dst_array_element: 0,
            descriptor_count: 1,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            p_buffer_info: &buffer_info,
            ..Default::default()
        };
        unsafe { self.device.update_descriptor_sets(&[write], &[]) };
        Ok(set)
    }

    pub fn destroy(&mut self) {
        if self.pool != vk::DescriptorPool::null() {
            unsafe { self.device.destroy_descriptor_pool(self.pool, None) };
            self.pool = vk::DescriptorPool::null();
        }
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        self.destroy();
    }
}
