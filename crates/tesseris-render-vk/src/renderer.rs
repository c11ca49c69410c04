// SPDX-License-Identifier: CEPL-1.0
//! The Vulkan renderer: owns every layer and drives frames through
//! [`draw_frame`] and resizes through [`rebuild_swapchain`].
use crate::buffer::GpuBuffer;
use crate::command::CommandPool;
use crate::depth::{find_depth_format, DepthResources};
use crate::descriptors::DescriptorPool;
use crate::device::GpuContext;
use crate::error::{OpContext, VkError, VkResult};
use crate::framebuffer::Framebuffers;
use crate::layout::{check_push_constant_limit, GlobalUniforms, PipelineLayouts, PushConstants};
use crate::pipeline::{GraphicsPipeline, PipelineConfig};
use crate::render_pass::RenderPass;
use crate::shader::builtin;
use crate::swapchain::Swapchain;
use crate::sync::{FenceStatus, FrameSync};
use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tesseris_math::Mat4;
use tesseris_render::{
    draw_frame, rebuild_swapchain, Acquired, FrameBackend, Presented, Rebuild, RebuildOutcome,
    RenderSettings, RenderSize, Renderer, Scene, ViewState,
};
use tracing::{info, trace, warn};

/// Slice of the otherwise unbounded fence wait; each expiry is logged.
const FENCE_WAIT_SLICE_NS: u64 = 1_000_000_000;

fn size_of_extent(extent: vk::Extent2D) -> RenderSize {
    RenderSize {
        width: extent.width,
        height: extent.height,
    }
}

// Fields drop top to bottom: per-frame objects first, the context last.
pub struct VkRenderer {
    sync: FrameSync,
    commands: CommandPool,
    descriptor_pool: DescriptorPool,
    global_set: vk::DescriptorSet,
    uniforms: GpuBuffer,
    vertices: Option<GpuBuffer>,
    draw_count: u32,
    pipeline: GraphicsPipeline,
    layouts: PipelineLayouts,
    framebuffers: Framebuffers,
    depth: DepthResources,
    render_pass: RenderPass,
    swapchain: Swapchain,
    ctx: GpuContext,

    color_format: vk::Format,
    depth_format: vk::Format,
    size: RenderSize,
    vsync: bool,
    paused: bool,
    clear_color: [f32; 4],
    view: ViewState,
}

impl VkRenderer {
    /// Builds every layer in dependency order. An early return drops what
    /// was already built in reverse order.
    pub fn create(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &RenderSettings,
    ) -> VkResult<Self> {
        let ctx = GpuContext::new(window, display, settings.validation)?;
        check_push_constant_limit(ctx.properties().limits.max_push_constants_size)?;

        let swapchain = Swapchain::create(&ctx, size, settings.vsync)?;
        let depth_format = find_depth_format(&ctx).ok_or(VkError::NoDepthFormat)?;
        let depth = DepthResources::create(&ctx, swapchain.extent(), depth_format)?;
        let render_pass = RenderPass::create(ctx.device(), swapchain.format(), depth_format)?;
        let framebuffers = Framebuffers::create(
            ctx.device(),
            render_pass.handle(),
            swapchain.views(),
            depth.view(),
            swapchain.extent(),
        )?;

        let layouts = PipelineLayouts::create(ctx.device())?;
        let (pipeline, vertices, draw_count) = match &settings.scene {
            Scene::Triangle => {
                let pipeline = GraphicsPipeline::create(
                    ctx.device(),
                    render_pass.handle(),
                    layouts.layout(),
                    builtin::TRIANGLE_VERT,
                    Some(builtin::TRIANGLE_FRAG),
                    &PipelineConfig::triangle(),
                )?;
                (pipeline, None, 3)
            }
            Scene::Mesh(mesh) => {
                let pipeline = GraphicsPipeline::create(
                    ctx.device(),
                    render_pass.handle(),
                    layouts.layout(),
                    builtin::CUBE_VERT,
                    Some(builtin::CUBE_FRAG),
                    &PipelineConfig::mesh(),
                )?;
                let vertices =
                    GpuBuffer::with_data(&ctx, vk::BufferUsageFlags::VERTEX_BUFFER, mesh.as_bytes())?;
                (pipeline, Some(vertices), mesh.vertex_count())
            }
        };

        let mut uniforms = GpuBuffer::create(
            &ctx,
            GlobalUniforms::SIZE,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        uniforms.map()?;
        let descriptor_pool = DescriptorPool::create(ctx.device())?;
        let global_set = descriptor_pool.allocate_uniform_set(layouts.globals(), &uniforms)?;

        let mut commands = CommandPool::create(ctx.device(), ctx.families().graphics)?;
        commands.allocate(framebuffers.len())?;
        let sync = FrameSync::create(ctx.device())?;

        info!(
            "renderer ready on {}: {:?} {:?}, {} images, {}x{}, depth {:?}, {} vertices",
            ctx.device_name(),
            swapchain.format(),
            swapchain.present_mode(),
            swapchain.image_count(),
            swapchain.extent().width,
            swapchain.extent().height,
            depth_format,
            draw_count
        );

        Ok(Self {
            color_format: swapchain.format(),
            depth_format,
            size,
            vsync: settings.vsync,
            paused: false,
            clear_color: settings.clear_color,
            view: ViewState::default(),
            sync,
            commands,
            descriptor_pool,
            global_set,
            uniforms,
            vertices,
            draw_count,
            pipeline,
            layouts,
            framebuffers,
            depth,
            render_pass,
            swapchain,
            ctx,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// True when a failed rebuild left no swapchain or framebuffers behind.
    pub fn targets_lost(&self) -> bool {
        self.swapchain.is_destroyed() || self.framebuffers.is_empty()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn write_uniforms(&mut self) -> VkResult<()> {
        let v = &self.view;
        let globals = GlobalUniforms::new(
            v.model,
            v.view,
            v.projection(size_of_extent(self.swapchain.extent())),
            v.light_dir,
            v.light_color,
            v.camera_pos,
        );
        self.uniforms.update(0, bytemuck::bytes_of(&globals))
    }
}

impl FrameBackend for VkRenderer {
    type Error = VkError;

    fn wait_for_previous_frame(&mut self) -> VkResult<()> {
        loop {
            match self.sync.wait(FENCE_WAIT_SLICE_NS)? {
                FenceStatus::Signaled => return Ok(()),
                FenceStatus::TimedOut => {
                    warn!("in-flight fence still pending after 1s, waiting again")
                }
            }
        }
    }

    fn acquire_image(&mut self) -> VkResult<Acquired> {
        match self.swapchain.acquire(self.sync.image_available()) {
            Ok((index, false)) => Ok(Acquired::Image(index)),
            Ok((index, true)) => Ok(Acquired::Suboptimal(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquired::Stale),
            Err(e) => Err(e).op("vkAcquireNextImageKHR"),
        }
    }

    fn reset_frame_fence(&mut self) -> VkResult<()> {
        self.sync.reset()
    }

    fn record(&mut self, image: u32) -> VkResult<()> {
        let cmd = self
            .commands
            .buffer(image as usize)
            .ok_or(VkError::InvalidArgument("no command buffer for acquired image"))?;
        let framebuffer = self
            .framebuffers
            .get(image as usize)
            .ok_or(VkError::InvalidArgument("no framebuffer for acquired image"))?;
        self.write_uniforms()?;

        let d = self.ctx.device();
        let extent = self.swapchain.extent();
        let layout = self.layouts.layout();
        let clears = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let push = PushConstants::new(Mat4::IDENTITY, 0);

        unsafe {
            d.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .op("vkResetCommandBuffer")?;
            let begin = vk::CommandBufferBeginInfo {
                s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
                ..Default::default()
            };
            d.begin_command_buffer(cmd, &begin)
                .op("vkBeginCommandBuffer")?;

            let rp_begin = vk::RenderPassBeginInfo {
                s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
                render_pass: self.render_pass.handle(),
                framebuffer,
                render_area: scissor,
                clear_value_count: clears.len() as u32,
                p_clear_values: clears.as_ptr(),
                ..Default::default()
            };
            d.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);
            d.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle());
            d.cmd_set_viewport(cmd, 0, &[viewport]);
            d.cmd_set_scissor(cmd, 0, &[scissor]);
            d.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[self.global_set],
                &[],
            );
            d.cmd_push_constants(
                cmd,
                layout,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(&push),
            );
            if let Some(vb) = &self.vertices {
                d.cmd_bind_vertex_buffers(cmd, 0, &[vb.handle()], &[0]);
            }
            d.cmd_draw(cmd, self.draw_count, 1, 0, 0);
            d.cmd_end_render_pass(cmd);
            d.end_command_buffer(cmd).op("vkEndCommandBuffer")?;
        }
        Ok(())
    }

    fn submit(&mut self, image: u32) -> VkResult<()> {
        let cmd = self
            .commands
            .buffer(image as usize)
            .ok_or(VkError::InvalidArgument("no command buffer for acquired image"))?;
        let wait = [self.sync.image_available()];
        let stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal = [self.sync.render_finished()];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: wait.len() as u32,
            p_wait_semaphores: wait.as_ptr(),
            p_wait_dst_stage_mask: stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: signal.len() as u32,
            p_signal_semaphores: signal.as_ptr(),
            ..Default::default()
        };
        unsafe {
            self.ctx.device().queue_submit(
                self.ctx.graphics_queue(),
                std::slice::from_ref(&submit),
                self.sync.in_flight(),
            )
        }
        .op("vkQueueSubmit")
    }

    fn present(&mut self, image: u32) -> VkResult<Presented> {
        match self
            .swapchain
            .present(self.ctx.present_queue(), self.sync.render_finished(), image)
        {
            Ok(false) => Ok(Presented::Done),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Presented::Stale),
            Err(e) => Err(e).op("vkQueuePresentKHR"),
        }
    }

    fn recreate(&mut self) -> VkResult<()> {
        let size = self.size;
        if rebuild_swapchain(self, size)? == RebuildOutcome::Deferred {
            self.paused = true;
        }
        Ok(())
    }
}

impl Rebuild for VkRenderer {
    type Error = VkError;

    fn wait_idle(&mut self) -> VkResult<()> {
        self.ctx.wait_idle()
    }

    fn free_command_buffers(&mut self) {
        self.commands.free_buffers();
    }

    fn destroy_framebuffers(&mut self) {
        self.framebuffers.destroy();
    }

    fn destroy_depth(&mut self) {
        self.depth.destroy();
    }

    fn destroy_swapchain(&mut self) {
        self.swapchain.destroy();
    }

    fn create_swapchain(&mut self, size: RenderSize) -> VkResult<()> {
        let swapchain = Swapchain::create(&self.ctx, size, self.vsync)?;
        // the render pass only matches the format it was created with
        if swapchain.format() != self.color_format {
            return Err(VkError::InvalidArgument("surface format changed"));
        }
        self.swapchain = swapchain;
        Ok(())
    }

    fn create_depth(&mut self) -> VkResult<()> {
        self.depth = DepthResources::create(&self.ctx, self.swapchain.extent(), self.depth_format)?;
        Ok(())
    }

    fn create_framebuffers(&mut self) -> VkResult<()> {
        self.framebuffers = Framebuffers::create(
            self.ctx.device(),
            self.render_pass.handle(),
            self.swapchain.views(),
            self.depth.view(),
            self.swapchain.extent(),
        )?;
        Ok(())
    }

    fn allocate_command_buffers(&mut self) -> VkResult<()> {
        self.commands.allocate(self.framebuffers.len())
    }
}

impl Drop for VkRenderer {
    fn drop(&mut self) {
        self.ctx.wait_idle().ok();
    }
}

impl Renderer for VkRenderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &RenderSettings,
    ) -> Result<Self> {
        Self::create(window, display, size, settings).context("vulkan renderer init")
    }

    fn resize(&mut self, size: RenderSize) -> Result<()> {
        self.size = size;
        if size.is_zero_area() {
            if !self.paused {
                info!("vk: resize to {}x{} → paused", size.width, size.height);
            }
            self.paused = true;
            return Ok(());
        }
        if self.paused {
            info!("vk: resize to {}x{} → resumed", size.width, size.height);
        }
        self.paused = false;
        rebuild_swapchain(self, size)?;
        Ok(())
    }

    fn render(&mut self, view: &ViewState) -> Result<()> {
        if self.paused {
            return Ok(());
        }
        if self.targets_lost() {
            return Err(VkError::TargetsLost.into());
        }
        self.view = *view;
        let outcome = draw_frame(self)?;
        trace!("frame: {outcome:?}");
        Ok(())
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    fn set_vsync(&mut self, on: bool) -> Result<()> {
        if self.vsync == on {
            return Ok(());
        }
        self.vsync = on;
        info!("vsync={on}");
        if self.paused {
            return Ok(());
        }
        let size = self.size;
        rebuild_swapchain(self, size)?;
        Ok(())
    }
}
