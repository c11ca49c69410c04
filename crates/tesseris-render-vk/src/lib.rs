// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Vulkan backend over `ash`, layered leaves first: device, swapchain,
//! render targets, pipeline resources, sync and commands, then the
//! renderer that drives frames.

pub mod buffer;
pub mod command;
pub mod depth;
pub mod descriptors;
pub mod device;
pub mod error;
pub mod framebuffer;
pub mod instance;
pub mod layout;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
pub mod renderer;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use device::GpuContext;
pub use error::{VkError, VkResult};
pub use renderer::VkRenderer;
