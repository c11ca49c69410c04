// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
pub mod camera;

pub use camera::{FpsCamera, MoveKeys};
pub use glam;
pub use glam::{Mat4, Vec2, Vec3, Vec4};

/// Right-handed perspective for Vulkan clip space: depth in [0, 1] and +Y
/// pointing down the framebuffer, so world-up still renders upwards.
pub fn vulkan_perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let mut proj = Mat4::perspective_rh(fov_y_degrees.to_radians(), aspect.max(1e-4), near, far);
    proj.y_axis.y *= -1.0;
    proj
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perspective_maps_depth_to_unit_range() {
        let p = vulkan_perspective(45.0, 800.0 / 600.0, 0.1, 100.0);
        let near = p.project_point3(Vec3::new(0.0, 0.0, -0.1));
        let far = p.project_point3(Vec3::new(0.0, 0.0, -100.0));
        assert!(near.z.abs() < 1e-4);
        assert!((far.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn perspective_flips_y_for_vulkan() {
        let p = vulkan_perspective(60.0, 1.0, 0.1, 10.0);
        let up = p.project_point3(Vec3::new(0.0, 1.0, -2.0));
        assert!(up.y < 0.0);
    }

    #[test]
    fn degenerate_aspect_stays_finite() {
        let p = vulkan_perspective(45.0, 0.0, 0.1, 100.0);
        assert!(p.is_finite());
    }
}
