// SPDX-License-Identifier: CEPL-1.0
use crate::device::GpuContext;
use crate::error::{OpContext, VkResult};
use crate::memory;
use ash::vk;
use tracing::debug;

pub const DEPTH_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// First candidate the probe accepts, in preference order.
pub fn pick_depth_format(mut supports: impl FnMut(vk::Format) -> bool) -> Option<vk::Format> {
    DEPTH_CANDIDATES.into_iter().find(|&f| supports(f))
}

/// Queries the adapter for optimal-tiling depth attachment support.
pub fn find_depth_format(ctx: &GpuContext) -> Option<vk::Format> {
    pick_depth_format(|f| {
        ctx.supports_format_features(f, vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
}

pub fn has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT
    )
}

/// Depth image, its device-local memory and a depth-only view, sized to
/// the swapchain extent.
pub struct DepthResources {
    device: ash::Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl DepthResources {
    pub fn create(ctx: &GpuContext, extent: vk::Extent2D, format: vk::Format) -> VkResult<Self> {
        let device = ctx.device();
        let image_info = vk::ImageCreateInfo {
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
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let image = unsafe { device.create_image(&image_info, None) }.op("vkCreateImage")?;

        let mut depth = Self {
            device: device.clone(),
            image,
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
            format,
            extent,
        };

        let req = unsafe { device.get_image_memory_requirements(image) };
        depth.memory = memory::allocate(ctx, req, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;
        unsafe { device.bind_image_memory(image, depth.memory, 0) }.op("vkBindImageMemory")?;

        let aspect_mask = if has_stencil(format) {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        };
        let view_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        depth.view =
            unsafe { device.create_image_view(&view_info, None) }.op("vkCreateImageView")?;

        debug!(
            "depth buffer {:?} {}x{}",
            format, extent.width, extent.height
        );
        Ok(depth)
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn is_destroyed(&self) -> bool {
        self.image == vk::Image::null()
    }

    pub fn destroy(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.destroy_image_view(self.view, None);
                self.view = vk::ImageView::null();
            }
            if self.image != vk::Image::null() {
                self.device.destroy_image(self.image, None);
                self.image = vk::Image::null();
            }
            if self.memory != vk::DeviceMemory::null() {
                self.device.free_memory(self.memory, None);
                self.memory = vk::DeviceMemory::null();
            }
        }
    }
}

impl Drop for DepthResources {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_are_tried_in_order() {
        let mut probed = Vec::new();
        let got = pick_depth_format(|f| {
            probed.push(f);
            f == vk::Format::D24_UNORM_S8_UINT
        });
        assert_eq!(got, Some(vk::Format::D24_UNORM_S8_UINT));
        assert_eq!(probed, DEPTH_CANDIDATES.to_vec());
    }

    #[test]
    fn first_supported_wins() {
        assert_eq!(pick_depth_format(|_| true), Some(vk::Format::D32_SFLOAT));
        assert_eq!(
            pick_depth_format(|f| f != vk::Format::D32_SFLOAT),
            Some(vk::Format::D32_SFLOAT_S8_UINT)
        );
    }

    #[test]
    fn nothing_supported() {
        assert_eq!(pick_depth_format(|_| false), None);
        assert_eq!(pick_depth_format(|f| f == vk::Format::D16_UNORM), None);
    }

    #[test]
    fn stencil_aspect() {
        assert!(!has_stencil(vk::Format::D32_SFLOAT));
        assert!(has_stencil(vk::Format::D24_UNORM_S8_UINT));
    }
}
