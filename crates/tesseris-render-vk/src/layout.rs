// SPDX-License-Identifier: CEPL-1.0
//! Descriptor-set layouts and the pipeline layout shared by every pipeline.
//!
//! set 0, binding 0: [`GlobalUniforms`] (vertex + fragment)
//! set 1, bindings 0..4: albedo, metalness, roughness, normal samplers (fragment)
//! push constants: [`PushConstants`] (vertex + fragment)
use crate::error::{OpContext, VkError, VkResult};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use tesseris_math::{Mat4, Vec3};

pub const MATERIAL_SAMPLERS: u32 = 4;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PushConstants {
    pub model: [[f32; 4]; 4],
    pub object_id: u32,
}

impl PushConstants {
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn new(model: Mat4, object_id: u32) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            object_id,
        }
    }
}

/// std140 layout; vec3 quantities are padded to vec4.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GlobalUniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub light_dir: [f32; 4],
    pub light_color: [f32; 4],
    pub camera_pos: [f32; 4],
}

impl GlobalUniforms {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(
        model: Mat4,
        view: Mat4,
        proj: Mat4,
        light_dir: Vec3,
        light_color: Vec3,
        camera_pos: Vec3,
    ) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            light_dir: light_dir.extend(0.0).to_array(),
            light_color: light_color.extend(1.0).to_array(),
            camera_pos: camera_pos.extend(1.0).to_array(),
        }
    }
}

/// Startup precondition: the push block must fit the device limit.
pub fn check_push_constant_limit(limit: u32) -> VkResult<()> {
    if PushConstants::SIZE > limit {
        return Err(VkError::PushConstantLimit {
            required: PushConstants::SIZE,
            limit,
        });
    }
    Ok(())
}

pub struct PipelineLayouts {
    device: ash::Device,
    globals: vk::DescriptorSetLayout,
    materials: vk::DescriptorSetLayout,
    layout: vk::PipelineLayout,
}

impl PipelineLayouts {
    /// Builds set 0, set 1, then the pipeline layout. A failure part way
    /// releases what was already created.
    pub fn create(device: &ash::Device) -> VkResult<Self> {
        let mut layouts = Self {
            device: device.clone(),
            globals: vk::DescriptorSetLayout::null(),
            materials: vk::DescriptorSetLayout::null(),
            layout: vk::PipelineLayout::null(),
        };

        let ubo = vk::DescriptorSetLayoutBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            ..Default::default()
        };
        layouts.globals = create_set_layout(device, std::slice::from_ref(&ubo))?;

        let samplers: Vec<vk::DescriptorSetLayoutBinding> = (0..MATERIAL_SAMPLERS)
            .map(|binding| vk::DescriptorSetLayoutBinding {
                binding,
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: 1,
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
                ..Default::default()
            })
            .collect();
        layouts.materials = create_set_layout(device, &samplers)?;

        let set_layouts = [layouts.globals, layouts.materials];
        let push = vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: PushConstants::SIZE,
        };
        let info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            set_layout_count: set_layouts.len() as u32,
            p_set_layouts: set_layouts.as_ptr(),
            push_constant_range_count: 1,
            p_push_constant_ranges: &push,
            ..Default::default()
        };
        layouts.layout =
            unsafe { device.create_pipeline_layout(&info, None) }.op("vkCreatePipelineLayout")?;
        Ok(layouts)
    }

    pub fn globals(&self) -> vk::DescriptorSetLayout {
        self.globals
    }

    pub fn materials(&self) -> vk::DescriptorSetLayout {
        self.materials
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    pub fn destroy(&mut self) {
        unsafe {
            if self.layout != vk::PipelineLayout::null() {
                self.device.destroy_pipeline_layout(self.layout, None);
                self.layout = vk::PipelineLayout::null();
            }
            for set in [&mut self.materials, &mut self.globals] {
                if *set != vk::DescriptorSetLayout::null() {
                    self.device.destroy_descriptor_set_layout(*set, None);
                    *set = vk::DescriptorSetLayout::null();
                }
            }
        }
    }
}

impl Drop for PipelineLayouts {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn create_set_layout(
    device: &ash::Device,
    bindings: &[vk::DescriptorSetLayoutBinding],
) -> VkResult<vk::DescriptorSetLayout> {
    let info = vk::DescriptorSetLayoutCreateInfo {
        s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
        binding_count: bindings.len() as u32,
        p_bindings: bindings.as_ptr(),
        ..Default::default()
    };
    unsafe { device.create_descriptor_set_layout(&info, None) }
        .op("vkCreateDescriptorSetLayout")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_block_is_matrix_plus_id() {
        assert_eq!(PushConstants::SIZE, 68);
        assert_eq!(PushConstants::SIZE % 4, 0);
    }

    #[test]
    fn uniform_block_matches_std140() {
        assert_eq!(GlobalUniforms::SIZE, 3 * 64 + 3 * 16);
        assert_eq!(std::mem::offset_of!(GlobalUniforms, light_dir), 192);
        assert_eq!(std::mem::offset_of!(GlobalUniforms, camera_pos), 224);
    }

    #[test]
    fn push_limit_is_a_hard_precondition() {
        assert!(check_push_constant_limit(128).is_ok());
        assert!(check_push_constant_limit(68).is_ok());
        match check_push_constant_limit(64) {
            Err(VkError::PushConstantLimit { required, limit }) => {
                assert_eq!((required, limit), (68, 64));
            }
            other => panic!("expected limit error, got {other:?}"),
        }
    }

    #[test]
    fn uniforms_pad_vectors() {
        let u = GlobalUniforms::new(
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::ONE,
            Vec3::new(1.0, 2.0, 3.0),
        );
        assert_eq!(u.light_dir, [0.0, -1.0, 0.0, 0.0]);
        assert_eq!(u.camera_pos, [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(bytemuck::bytes_of(&u).len() as u64, GlobalUniforms::SIZE);
    }
}
