// SPDX-License-Identifier: CEPL-1.0
//! GPU-backed checks on a surface-less context. Each test returns early
//! when the machine has no Vulkan loader or adapter.
use ash::vk;
use tesseris_render_vk::buffer::{copy_buffer, GpuBuffer};
use tesseris_render_vk::command::CommandPool;
use tesseris_render_vk::depth::{find_depth_format, DepthResources};
use tesseris_render_vk::framebuffer::Framebuffers;
use tesseris_render_vk::layout::PipelineLayouts;
use tesseris_render_vk::memory::find_memory_type;
use tesseris_render_vk::pipeline::{GraphicsPipeline, PipelineConfig};
use tesseris_render_vk::render_pass::RenderPass;
use tesseris_render_vk::shader::{builtin, ShaderModule};
use tesseris_render_vk::sync::{FenceStatus, FrameSync};
use tesseris_render_vk::{GpuContext, VkError};

fn context() -> Option<GpuContext> {
    match GpuContext::headless(false) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("skipping, no usable Vulkan device: {e}");
            None
        }
    }
}

const HOST: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

#[test]
fn fence_starts_signaled() {
    let Some(ctx) = context() else { return };
    let sync = FrameSync::create(ctx.device()).unwrap();
    assert_eq!(sync.wait(0).unwrap(), FenceStatus::Signaled);
    sync.reset().unwrap();
    assert_eq!(sync.wait(0).unwrap(), FenceStatus::TimedOut);
}

#[test]
fn teardown_is_idempotent() {
    let Some(ctx) = context() else { return };
    let mut sync = FrameSync::create(ctx.device()).unwrap();
    sync.destroy();
    sync.destroy();
    assert!(sync.is_destroyed());

    let mut buf =
        GpuBuffer::create(&ctx, 64, vk::BufferUsageFlags::UNIFORM_BUFFER, HOST).unwrap();
    buf.map().unwrap();
    buf.destroy();
    buf.destroy();
    assert!(buf.is_destroyed());
    assert!(!buf.is_mapped());

    let mut pool = CommandPool::create(ctx.device(), ctx.families().graphics).unwrap();
    pool.allocate(2).unwrap();
    pool.destroy();
    pool.destroy();
    assert!(pool.is_destroyed());
    assert!(pool.is_empty());
}

#[test]
fn out_of_bounds_update_writes_nothing() {
    let Some(ctx) = context() else { return };
    let mut buf = GpuBuffer::with_data(&ctx, vk::BufferUsageFlags::VERTEX_BUFFER, &[1u8; 16]).unwrap();
    let err = buf.update(8, &[9u8; 16]).unwrap_err();
    assert!(matches!(
        err,
        VkError::OutOfBounds {
            offset: 8,
            len: 16,
            capacity: 16
        }
    ));
    assert_eq!(buf.read(0, 16).unwrap(), vec![1u8; 16]);
}

#[test]
fn persistent_mapping_sees_updates() {
    let Some(ctx) = context() else { return };
    let mut buf = GpuBuffer::create(&ctx, 32, vk::BufferUsageFlags::UNIFORM_BUFFER, HOST).unwrap();
    buf.map().unwrap();
    buf.map().unwrap();
    buf.update(4, &[7u8; 8]).unwrap();
    buf.unmap();
    let bytes = buf.read(0, 16).unwrap();
    assert_eq!(&bytes[4..12], &[7u8; 8]);
}

#[test]
fn copy_moves_bytes_between_buffers() {
    let Some(ctx) = context() else { return };
    let data: Vec<u8> = (0..64u8).collect();
    let src = GpuBuffer::with_data(&ctx, vk::BufferUsageFlags::TRANSFER_SRC, &data).unwrap();
    let mut dst = GpuBuffer::create(&ctx, 64, vk::BufferUsageFlags::TRANSFER_DST, HOST).unwrap();
    let pool = CommandPool::create(ctx.device(), ctx.families().graphics).unwrap();
    copy_buffer(&ctx, pool.handle(), ctx.graphics_queue(), &src, &dst, 64).unwrap();
    assert_eq!(dst.read(0, 64).unwrap(), data);

    let err = copy_buffer(&ctx, pool.handle(), ctx.graphics_queue(), &src, &dst, 65).unwrap_err();
    assert!(matches!(err, VkError::OutOfBounds { .. }));
}

#[test]
fn command_buffers_reallocate_in_lockstep() {
    let Some(ctx) = context() else { return };
    let mut pool = CommandPool::create(ctx.device(), ctx.families().graphics).unwrap();
    pool.allocate(3).unwrap();
    assert_eq!(pool.len(), 3);
    assert!(pool.buffer(2).is_some());
    assert!(pool.buffer(3).is_none());
    pool.allocate(2).unwrap();
    assert_eq!(pool.len(), 2);
    pool.free_buffers();
    assert!(pool.is_empty());
}

#[test]
fn render_targets_and_pipeline() {
    let Some(ctx) = context() else { return };
    let Some(depth_format) = find_depth_format(&ctx) else {
        eprintln!("skipping, no depth format");
        return;
    };
    let extent = vk::Extent2D {
        width: 64,
        height: 48,
    };
    let mut depth = DepthResources::create(&ctx, extent, depth_format).unwrap();
    assert_eq!(depth.extent().width, 64);
    assert_ne!(depth.view(), vk::ImageView::null());

    let mut render_pass =
        RenderPass::create(ctx.device(), vk::Format::R8G8B8A8_UNORM, depth_format).unwrap();
    let mut layouts = PipelineLayouts::create(ctx.device()).unwrap();

    let mut mesh = GraphicsPipeline::create(
        ctx.device(),
        render_pass.handle(),
        layouts.layout(),
        builtin::CUBE_VERT,
        Some(builtin::CUBE_FRAG),
        &PipelineConfig::mesh(),
    )
    .unwrap();
    let triangle = GraphicsPipeline::create(
        ctx.device(),
        render_pass.handle(),
        layouts.layout(),
        builtin::TRIANGLE_VERT,
        Some(builtin::TRIANGLE_FRAG),
        &PipelineConfig::triangle(),
    )
    .unwrap();
    assert_ne!(mesh.handle(), triangle.handle());

    mesh.destroy();
    mesh.destroy();
    drop(triangle);
    layouts.destroy();
    render_pass.destroy();
    depth.destroy();
    assert!(depth.is_destroyed());
}

/// Device-local color image standing in for a swapchain image.
struct Offscreen {
    device: ash::Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl Offscreen {
    fn create(ctx: &GpuContext, format: vk::Format, extent: vk::Extent2D) -> Self {
        let device = ctx.device();
        let info = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format,
            extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let image = unsafe { device.create_image(&info, None) }.unwrap();
        let req = unsafe { device.get_image_memory_requirements(image) };
        let memory_type_index = find_memory_type(
            ctx.memory_properties(),
            req.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .unwrap();
        let alloc = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: req.size,
            memory_type_index,
            ..Default::default()
        };
        let memory = unsafe { device.allocate_memory(&alloc, None) }.unwrap();
        unsafe { device.bind_image_memory(image, memory, 0) }.unwrap();
        let view_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        let view = unsafe { device.create_image_view(&view_info, None) }.unwrap();
        Self {
            device: device.clone(),
            image,
            memory,
            view,
        }
    }
}

impl Drop for Offscreen {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

#[test]
fn framebuffers_match_views_and_tear_down_once() {
    let Some(ctx) = context() else { return };
    let Some(depth_format) = find_depth_format(&ctx) else {
        eprintln!("skipping, no depth format");
        return;
    };
    let color_format = vk::Format::R8G8B8A8_UNORM;
    let extent = vk::Extent2D {
        width: 32,
        height: 32,
    };
    let targets: Vec<Offscreen> = (0..3)
        .map(|_| Offscreen::create(&ctx, color_format, extent))
        .collect();
    let views: Vec<vk::ImageView> = targets.iter().map(|t| t.view).collect();

    let mut depth = DepthResources::create(&ctx, extent, depth_format).unwrap();
    let mut render_pass = RenderPass::create(ctx.device(), color_format, depth_format).unwrap();
    let mut framebuffers = Framebuffers::create(
        ctx.device(),
        render_pass.handle(),
        &views,
        depth.view(),
        extent,
    )
    .unwrap();
    assert_eq!(framebuffers.len(), views.len());
    assert!(framebuffers.get(2).is_some());
    assert!(framebuffers.get(3).is_none());

    framebuffers.destroy();
    assert!(framebuffers.is_empty());
    framebuffers.destroy();
    assert!(framebuffers.is_empty());

    depth.destroy();
    assert!(depth.is_destroyed());
    depth.destroy();
    assert!(depth.is_destroyed());

    render_pass.destroy();
    assert!(render_pass.is_destroyed());
    render_pass.destroy();
    assert!(render_pass.is_destroyed());

    drop(targets);
}

#[test]
fn shader_loads_from_disk() {
    let Some(ctx) = context() else { return };
    let path = std::env::temp_dir().join(format!("tesseris-{}-triangle.vert.spv", std::process::id()));
    std::fs::write(&path, builtin::TRIANGLE_VERT).unwrap();
    let module = ShaderModule::from_file(ctx.device(), &path);
    std::fs::remove_file(&path).ok();
    assert_ne!(module.unwrap().handle(), vk::ShaderModule::null());

    let missing = path.with_extension("missing");
    let err = ShaderModule::from_file(ctx.device(), &missing).err().unwrap();
    assert!(matches!(err, VkError::ShaderIo { ref path, .. } if *path == missing));
}
