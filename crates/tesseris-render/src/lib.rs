// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tesseris_math::{vulkan_perspective, Mat4, Vec3};

pub mod frame;
pub mod mesh;
pub mod rebuild;

pub use frame::{draw_frame, Acquired, FrameBackend, FrameError, FrameOutcome, FrameStage, Presented};
pub use mesh::{Mesh, MeshError, Vertex};
pub use rebuild::{rebuild_swapchain, Rebuild, RebuildError, RebuildOutcome, RebuildStep};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

/// What the pipeline draws.
#[derive(Clone, Debug)]
pub enum Scene {
    /// Three vertices generated in the vertex shader, no vertex buffer.
    Triangle,
    /// Interleaved position/color/normal vertices.
    Mesh(Mesh),
}

#[derive(Clone, Debug)]
pub struct RenderSettings {
    pub vsync: bool,
    pub clear_color: [f32; 4],
    pub validation: bool,
    pub scene: Scene,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            vsync: true,
            clear_color: [25.0 / 255.0, 25.0 / 255.0, 112.0 / 255.0, 1.0],
            validation: cfg!(debug_assertions),
            scene: Scene::Mesh(Mesh::cube()),
        }
    }
}

/// Per-frame camera and lighting inputs.
#[derive(Clone, Copy, Debug)]
pub struct ViewState {
    pub model: Mat4,
    pub view: Mat4,
    pub camera_pos: Vec3,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub light_dir: Vec3,
    pub light_color: Vec3,
}

impl Default for ViewState {
    fn default() -> Self {
        let camera_pos = Vec3::new(0.0, 0.0, 3.0);
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::look_at_rh(camera_pos, Vec3::ZERO, Vec3::Y),
            camera_pos,
            fov_degrees: 45.0,
            near: 0.1,
            far: 100.0,
            light_dir: Vec3::new(-0.4, -1.0, -0.3).normalize(),
            light_color: Vec3::ONE,
        }
    }
}

impl ViewState {
    pub fn projection(&self, size: RenderSize) -> Mat4 {
        vulkan_perspective(self.fov_degrees, size.aspect(), self.near, self.far)
    }
}

pub trait Renderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &RenderSettings,
    ) -> Result<Self>
    where
        Self: Sized;

    fn resize(&mut self, size: RenderSize) -> Result<()>;
    fn render(&mut self, view: &ViewState) -> Result<()>;
    fn set_clear_color(&mut self, rgba: [f32; 4]);
    fn set_vsync(&mut self, _on: bool) -> Result<()> {
        Ok(())
    }
}
