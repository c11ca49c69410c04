// SPDX-License-Identifier: CEPL-1.0
use crate::error::{OpContext, VkResult};
use ash::vk;

/// One framebuffer per swapchain image, all sharing the depth view.
pub struct Framebuffers {
    device: ash::Device,
    handles: Vec<vk::Framebuffer>,
}

impl Framebuffers {
    pub fn create(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        color_views: &[vk::ImageView],
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<Self> {
        let mut fbs = Self {
            device: device.clone(),
            handles: Vec::with_capacity(color_views.len()),
        };
        for &color in color_views {
            let attachments = [color, depth_view];
            let info = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass,
                attachment_count: attachments.len() as u32,
                p_attachments: attachments.as_ptr(),
                width: extent.width,
                height: extent.height,
                layers: 1,
                ..Default::default()
            };
            let fb = unsafe { device.create_framebuffer(&info, None) }.op("vkCreateFramebuffer")?;
            fbs.handles.push(fb);
        }
        Ok(fbs)
    }

    pub fn get(&self, index: usize) -> Option<vk::Framebuffer> {
        self.handles.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn destroy(&mut self) {
        for fb in self.handles.drain(..) {
            unsafe { self.device.destroy_framebuffer(fb, None) };
        }
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        self.destroy();
    }
}
