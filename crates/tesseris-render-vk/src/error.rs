// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use std::{io, path::PathBuf};
use tesseris_render::{RebuildError, RebuildStep};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VkError {
    #[error("failed to load the Vulkan library: {0}")]
    Loader(#[from] ash::LoadingError),

    #[error("{op} failed: {result}")]
    Api { op: &'static str, result: vk::Result },

    #[error("no adapter offers both graphics and presentation queues")]
    NoSuitableAdapter,

    #[error("no candidate depth format supports optimal-tiling depth attachments")]
    NoDepthFormat,

    #[error("no memory type in filter {type_bits:#b} has {flags:?}")]
    NoMemoryType {
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    },

    #[error("push constants need {required} bytes, device allows {limit}")]
    PushConstantLimit { required: u32, limit: u32 },

    #[error("{len} bytes at offset {offset} overflow a {capacity}-byte buffer")]
    OutOfBounds { offset: u64, len: u64, capacity: u64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("SPIR-V length {0} is not a multiple of 4")]
    MisalignedSpirv(usize),

    #[error("failed to read shader {}: {source}", .path.display())]
    ShaderIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("render targets were lost in a failed swapchain rebuild")]
    TargetsLost,

    #[error("context has no presentation surface")]
    NoSurface,

    #[error("window handle unavailable: {0}")]
    Handle(#[from] raw_window_handle::HandleError),

    #[error("swapchain rebuild failed at {step}")]
    Rebuild {
        step: RebuildStep,
        #[source]
        source: Box<VkError>,
    },
}

pub type VkResult<T> = Result<T, VkError>;

/// Tags a raw `ash` result with the Vulkan entry point that produced it.
pub(crate) trait OpContext<T> {
    fn op(self, op: &'static str) -> VkResult<T>;
}

impl<T> OpContext<T> for Result<T, vk::Result> {
    fn op(self, op: &'static str) -> VkResult<T> {
        self.map_err(|result| VkError::Api { op, result })
    }
}

impl From<RebuildError<VkError>> for VkError {
    fn from(e: RebuildError<VkError>) -> Self {
        VkError::Rebuild {
            step: e.step,
            source: Box::new(e.source),
        }
    }
}

impl VkError {
    /// The raw Vulkan result, if this error came straight from the API.
    pub fn vk_result(&self) -> Option<vk::Result> {
        match self {
            VkError::Api { result, .. } => Some(*result),
            VkError::Rebuild { source, .. } => source.vk_result(),
            _ => None,
        }
    }
}
