// SPDX-License-Identifier: CEPL-1.0
use crate::error::{VkError, VkResult};
use crate::shader::ShaderModule;
use ash::vk;
use std::mem::{offset_of, size_of};
use tesseris_render::Vertex;
use tracing::debug;

/// Fixed-function state for one pipeline. Viewport and scissor are always
/// dynamic.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub topology: vk::PrimitiveTopology,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub line_width: f32,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: vk::CompareOp,
    pub blend: bool,
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            line_width: 1.0,
            depth_test: true,
            depth_write: true,
            depth_compare: vk::CompareOp::LESS,
            blend: false,
            bindings: Vec::new(),
            attributes: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Interleaved [`Vertex`] input on binding 0.
    pub fn mesh() -> Self {
        let (binding, attributes) = vertex_layout();
        Self {
            bindings: vec![binding],
            attributes: attributes.to_vec(),
            ..Default::default()
        }
    }

    /// Vertices come from `gl_VertexIndex`; both windings are drawn.
    pub fn triangle() -> Self {
        Self {
            cull_mode: vk::CullModeFlags::NONE,
            ..Default::default()
        }
    }
}

pub fn vertex_layout() -> (
    vk::VertexInputBindingDescription,
    [vk::VertexInputAttributeDescription; 3],
) {
    let binding = vk::VertexInputBindingDescription {
        binding: 0,
        stride: size_of::<Vertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    };
    let attr = |location, offset: usize| vk::VertexInputAttributeDescription {
        location,
        binding: 0,
        format: vk::Format::R32G32B32_SFLOAT,
        offset: offset as u32,
    };
    (
        binding,
        [
            attr(0, offset_of!(Vertex, pos)),
            attr(1, offset_of!(Vertex, color)),
            attr(2, offset_of!(Vertex, normal)),
        ],
    )
}

/// Straight alpha blending when enabled, plain writes otherwise.
pub fn blend_attachment(blend: bool) -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState {
        blend_enable: if blend { vk::TRUE } else { vk::FALSE },
        src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
        dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        color_blend_op: vk::BlendOp::ADD,
        src_alpha_blend_factor: vk::BlendFactor::ONE,
        dst_alpha_blend_factor: vk::BlendFactor::ZERO,
        alpha_blend_op: vk::BlendOp::ADD,
        color_write_mask: vk::ColorComponentFlags::RGBA,
    }
}

fn bool32(b: bool) -> vk::Bool32 {
    if b {
        vk::TRUE
    } else {
        vk::FALSE
    }
}

pub struct GraphicsPipeline {
    device: ash::Device,
    handle: vk::Pipeline,
}

impl GraphicsPipeline {
    /// Shader modules live only for the duration of this call, on success
    /// and failure alike.
    pub fn create(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        layout: vk::PipelineLayout,
        vert: &[u8],
        frag: Option<&[u8]>,
        cfg: &PipelineConfig,
    ) -> VkResult<Self> {
        let vs = ShaderModule::from_bytes(device, vert)?;
        let fs = frag.map(|code| ShaderModule::from_bytes(device, code)).transpose()?;

        let entry = c"main";
        let mut stages = vec![vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::VERTEX,
            module: vs.handle(),
            p_name: entry.as_ptr(),
            ..Default::default()
        }];
        if let Some(fs) = &fs {
            stages.push(vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fs.handle(),
                p_name: entry.as_ptr(),
                ..Default::default()
            });
        }

        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: cfg.bindings.len() as u32,
            p_vertex_binding_descriptions: cfg.bindings.as_ptr(),
            vertex_attribute_description_count: cfg.attributes.len() as u32,
            p_vertex_attribute_descriptions: cfg.attributes.as_ptr(),
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: cfg.topology,
            primitive_restart_enable: vk::FALSE,
            ..Default::default()
        };
        // counts only; both are set at record time
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };
        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: cfg.polygon_mode,
            cull_mode: cfg.cull_mode,
            front_face: cfg.front_face,
            line_width: cfg.line_width,
            ..Default::default()
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            min_sample_shading: 1.0,
            ..Default::default()
        };
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
            depth_test_enable: bool32(cfg.depth_test),
            depth_write_enable: bool32(cfg.depth_write),
            depth_compare_op: cfg.depth_compare,
            min_depth_bounds: 0.0,
            max_depth_bounds: 1.0,
            ..Default::default()
        };
        let blend_att = blend_attachment(cfg.blend);
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &blend_att,
            ..Default::default()
        };
        let dyn_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
            dynamic_state_count: dyn_states.len() as u32,
            p_dynamic_states: dyn_states.as_ptr(),
            ..Default::default()
        };

        let info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_depth_stencil_state: &depth_stencil,
            p_color_blend_state: &color_blend,
            p_dynamic_state: &dynamic_state,
            layout,
            render_pass,
            subpass: 0,
            ..Default::default()
        };

        let handle = match unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&info), None)
        } {
            Ok(pipelines) => pipelines[0],
            Err((partial, result)) => {
                for p in partial.into_iter().filter(|p| *p != vk::Pipeline::null()) {
                    unsafe { device.destroy_pipeline(p, None) };
                }
                return Err(VkError::Api {
                    op: "vkCreateGraphicsPipelines",
                    result,
                });
            }
        };
        debug!(
            "graphics pipeline: {} stages, {} bindings, {} attributes",
            stages.len(),
            cfg.bindings.len(),
            cfg.attributes.len()
        );

        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }

    pub fn destroy(&mut self) {
        if self.handle != vk::Pipeline::null() {
            unsafe { self.device.destroy_pipeline(self.handle, None) };
            self.handle = vk::Pipeline::null();
        }
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        self.destroy();
    }
}
