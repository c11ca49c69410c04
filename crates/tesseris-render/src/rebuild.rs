// SPDX-License-Identifier: CEPL-1.0
//! Swapchain recreation after a resize, a present-mode change or a stale
//! swapchain. The render pass and pipeline layout only depend on formats and
//! are left alone.
use crate::RenderSize;
use std::fmt;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebuildStep {
    WaitIdle,
    CreateSwapchain,
    CreateDepth,
    CreateFramebuffers,
    AllocateCommandBuffers,
}

impl fmt::Display for RebuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RebuildStep::WaitIdle => "device wait idle",
            RebuildStep::CreateSwapchain => "swapchain creation",
            RebuildStep::CreateDepth => "depth resource creation",
            RebuildStep::CreateFramebuffers => "framebuffer creation",
            RebuildStep::AllocateCommandBuffers => "command buffer allocation",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebuildOutcome {
    Rebuilt,
    /// Zero-area surface; nothing was touched.
    Deferred,
}

#[derive(Debug, thiserror::Error)]
#[error("swapchain rebuild failed at {step}")]
pub struct RebuildError<E: std::error::Error + 'static> {
    pub step: RebuildStep,
    #[source]
    pub source: E,
}

/// The size-dependent half of a renderer. Destroy calls must tolerate
/// already-destroyed state.
pub trait Rebuild {
    type Error: std::error::Error + Send + Sync + 'static;

    fn wait_idle(&mut self) -> Result<(), Self::Error>;
    fn free_command_buffers(&mut self);
    fn destroy_framebuffers(&mut self);
    fn destroy_depth(&mut self);
    fn destroy_swapchain(&mut self);
    fn create_swapchain(&mut self, size: RenderSize) -> Result<(), Self::Error>;
    fn create_depth(&mut self) -> Result<(), Self::Error>;
    fn create_framebuffers(&mut self) -> Result<(), Self::Error>;
    fn allocate_command_buffers(&mut self) -> Result<(), Self::Error>;
}

fn at<E: std::error::Error + 'static>(step: RebuildStep) -> impl FnOnce(E) -> RebuildError<E> {
    move |source| RebuildError { step, source }
}

/// Tears down and rebuilds every size-dependent object in a fixed order.
/// Stops at the first failing step; whatever was already destroyed stays
/// destroyed and the owner's normal teardown cleans up the rest.
pub fn rebuild_swapchain<R: Rebuild + ?Sized>(
    r: &mut R,
    size: RenderSize,
) -> Result<RebuildOutcome, RebuildError<R::Error>> {
    if size.is_zero_area() {
        debug!("rebuild deferred, surface is {}x{}", size.width, size.height);
        return Ok(RebuildOutcome::Deferred);
    }

    r.wait_idle().map_err(at(RebuildStep::WaitIdle))?;

    r.free_command_buffers();
    r.destroy_framebuffers();
    r.destroy_depth();
    r.destroy_swapchain();

    r.create_swapchain(size)
        .map_err(at(RebuildStep::CreateSwapchain))?;
    r.create_depth().map_err(at(RebuildStep::CreateDepth))?;
    r.create_framebuffers()
        .map_err(at(RebuildStep::CreateFramebuffers))?;
    r.allocate_command_buffers()
        .map_err(at(RebuildStep::AllocateCommandBuffers))?;

    info!("swapchain rebuilt for {}x{}", size.width, size.height);
    Ok(RebuildOutcome::Rebuilt)
}
