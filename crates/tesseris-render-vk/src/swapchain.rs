// SPDX-License-Identifier: CEPL-1.0
use crate::device::{GpuContext, QueueFamilies};
use crate::error::{OpContext, VkError, VkResult};
use ash::khr::swapchain;
use ash::vk;
use tesseris_render::RenderSize;
use tracing::info;

pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space
        })
        .or_else(|| formats.first().copied())
}

/// FIFO under vsync. Otherwise the lowest-latency mode on offer.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX]
        .into_iter()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// One more than the minimum, capped when the surface has a maximum.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let want = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        want.min(caps.max_image_count)
    } else {
        want
    }
}

pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// Keep whatever transform the compositor already applies; asking for
/// IDENTITY on a rotated surface makes every present suboptimal.
pub fn choose_pre_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    caps.current_transform
}

/// Concurrent sharing across two families, exclusive on a shared one.
pub fn sharing_mode(families: QueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    if families.shared() {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (vk::SharingMode::CONCURRENT, families.unique())
    }
}

pub struct Swapchain {
    device: ash::Device,
    loader: swapchain::Device,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    pub fn create(ctx: &GpuContext, size: RenderSize, vsync: bool) -> VkResult<Self> {
        let surface = ctx.surface()?;
        let loader = ctx.swapchain_loader()?.clone();
        let (pd, sh) = (ctx.physical(), surface.handle());

        let caps = unsafe { surface.loader().get_physical_device_surface_capabilities(pd, sh) }
            .op("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
        let formats = unsafe { surface.loader().get_physical_device_surface_formats(pd, sh) }
            .op("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
        let modes = unsafe { surface.loader().get_physical_device_surface_present_modes(pd, sh) }
            .op("vkGetPhysicalDeviceSurfacePresentModesKHR")?;

        let surface_format = choose_surface_format(&formats)
            .ok_or(VkError::InvalidArgument("surface reports no formats"))?;
        let present_mode = choose_present_mode(&modes, vsync);
        let extent = choose_extent(&caps, size);
        if extent.width == 0 || extent.height == 0 {
            return Err(VkError::InvalidArgument("swapchain extent has zero area"));
        }
        let image_count = choose_image_count(&caps);
        let (sharing, family_indices) = sharing_mode(ctx.families());

        let pre_transform = choose_pre_transform(&caps);

        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: sh,
            min_image_count: image_count,
            image_format: surface_format.format,
            image_color_space: surface_format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing,
            queue_family_index_count: family_indices.len() as u32,
            p_queue_family_indices: family_indices.as_ptr(),
            pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            ..Default::default()
        };
        let handle = unsafe { loader.create_swapchain(&info, None) }.op("vkCreateSwapchainKHR")?;

        let mut sc = Self {
            device: ctx.device().clone(),
            loader,
            handle,
            images: Vec::new(),
            views: Vec::new(),
            format: surface_format.format,
            extent,
            present_mode,
        };
        sc.images = unsafe { sc.loader.get_swapchain_images(handle) }.op("vkGetSwapchainImagesKHR")?;

        for &image in &sc.images {
            let view_info = vk::ImageViewCreateInfo {
                s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
                image,
                view_type: vk::ImageViewType::TYPE_2D,
                format: sc.format,
                components: vk::ComponentMapping::default(),
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                ..Default::default()
            };
            let view = unsafe { sc.device.create_image_view(&view_info, None) }
                .op("vkCreateImageView")?;
            sc.views.push(view);
        }

        info!(
            "swapchain: {:?} / {:?}, {:?}, {} images (min {}), {}x{}, {:?} sharing",
            surface_format.format,
            surface_format.color_space,
            present_mode,
            sc.images.len(),
            caps.min_image_count,
            extent.width,
            extent.height,
            sharing
        );
        Ok(sc)
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    /// `Ok((index, suboptimal))`; out-of-date comes back as an error result.
    pub fn acquire(&self, signal: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.loader
                .acquire_next_image(self.handle, u64::MAX, signal, vk::Fence::null())
        }
    }

    /// `Ok(true)` when the swapchain is suboptimal.
    pub fn present(&self, queue: vk::Queue, wait: vk::Semaphore, index: u32) -> Result<bool, vk::Result> {
        let info = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            swapchain_count: 1,
            p_swapchains: &self.handle,
            p_image_indices: &index,
            ..Default::default()
        };
        unsafe { self.loader.queue_present(queue, &info) }
    }

    pub fn is_destroyed(&self) -> bool {
        self.handle == vk::SwapchainKHR::null()
    }

    /// Views first, then the swapchain that owns the images. Safe to repeat.
    pub fn destroy(&mut self) {
        unsafe {
            for view in self.views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            self.images.clear();
            if self.handle != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.handle, None);
                self.handle = vk::SwapchainKHR::null();
            }
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_MODES: [vk::PresentModeKHR; 4] = [
        vk::PresentModeKHR::FIFO,
        vk::PresentModeKHR::FIFO_RELAXED,
        vk::PresentModeKHR::MAILBOX,
        vk::PresentModeKHR::IMMEDIATE,
    ];

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn vsync_always_means_fifo() {
        assert_eq!(choose_present_mode(&ALL_MODES, true), vk::PresentModeKHR::FIFO);
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE], true),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(choose_present_mode(&[], true), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn without_vsync_prefers_immediate_then_mailbox() {
        assert_eq!(choose_present_mode(&ALL_MODES, false), vk::PresentModeKHR::IMMEDIATE);
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX], false),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::FIFO_RELAXED], false),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn format_prefers_bgra_srgb_then_first() {
        let key = |f: Option<vk::SurfaceFormatKHR>| f.map(|f| (f.format, f.color_space));
        let other = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(
            key(choose_surface_format(&[other, PREFERRED_FORMAT])),
            Some((vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR))
        );
        assert_eq!(
            key(choose_surface_format(&[other])),
            Some((vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR))
        );
        assert!(choose_surface_format(&[]).is_none());

        let srgb_wrong_space = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT,
        };
        assert_eq!(
            key(choose_surface_format(&[other, srgb_wrong_space])).map(|k| k.0),
            Some(vk::Format::R8G8B8A8_UNORM)
        );
    }

    #[test]
    fn image_count_is_min_plus_one_clamped() {
        assert_eq!(choose_image_count(&caps(2, 0)), 3);
        assert_eq!(choose_image_count(&caps(2, 8)), 3);
        assert_eq!(choose_image_count(&caps(3, 3)), 3);
        assert_eq!(choose_image_count(&caps(1, 1)), 1);
    }

    #[test]
    fn fixed_surface_extent_wins() {
        let mut c = caps(2, 0);
        c.current_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let e = choose_extent(&c, RenderSize { width: 1024, height: 768 });
        assert_eq!((e.width, e.height), (800, 600));
    }

    #[test]
    fn free_extent_is_clamped_to_surface_limits() {
        let c = caps(2, 0);
        let e = choose_extent(&c, RenderSize { width: 1280, height: 720 });
        assert_eq!((e.width, e.height), (1280, 720));
        let e = choose_extent(&c, RenderSize { width: 9000, height: 0 });
        assert_eq!((e.width, e.height), (4096, 1));
    }

    #[test]
    fn rotated_surface_keeps_its_transform() {
        let mut c = caps(2, 0);
        c.supported_transforms =
            vk::SurfaceTransformFlagsKHR::IDENTITY | vk::SurfaceTransformFlagsKHR::ROTATE_90;
        c.current_transform = vk::SurfaceTransformFlagsKHR::ROTATE_90;
        assert_eq!(choose_pre_transform(&c), vk::SurfaceTransformFlagsKHR::ROTATE_90);

        c.current_transform = vk::SurfaceTransformFlagsKHR::IDENTITY;
        assert_eq!(choose_pre_transform(&c), vk::SurfaceTransformFlagsKHR::IDENTITY);
    }

    #[test]
    fn sharing_follows_family_split() {
        let shared = QueueFamilies { graphics: 0, present: 0 };
        assert_eq!(sharing_mode(shared), (vk::SharingMode::EXCLUSIVE, vec![]));
        let split = QueueFamilies { graphics: 0, present: 2 };
        assert_eq!(sharing_mode(split), (vk::SharingMode::CONCURRENT, vec![0, 2]));
    }
}
