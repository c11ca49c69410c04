// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;
use glam::{Mat4, Vec3};

bitflags! {
    /// Movement keys held during the current frame.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MoveKeys: u8 {
        const FORWARD  = 1 << 0;
        const BACKWARD = 1 << 1;
        const LEFT     = 1 << 2;
        const RIGHT    = 1 << 3;
        const UP       = 1 << 4;
        const DOWN     = 1 << 5;
    }
}

const PITCH_LIMIT: f32 = 89.0;

/// Yaw/pitch first-person camera. Angles are in degrees; yaw -90 looks down -Z.
#[derive(Clone, Debug)]
pub struct FpsCamera {
    pub position: Vec3,
    yaw: f32,
    pitch: f32,
    pub speed: f32,
    pub sensitivity: f32,
}

impl Default for FpsCamera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 3.0), 2.5, 0.1)
    }
}

impl FpsCamera {
    pub fn new(position: Vec3, speed: f32, sensitivity: f32) -> Self {
        Self {
            position,
            yaw: (-90.0f32).rem_euclid(360.0),
            pitch: 0.0,
            speed,
            sensitivity,
        }
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn front(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(Vec3::Y).normalize()
    }

    /// Applies a relative mouse motion in device counts.
    pub fn look(&mut self, dx: f32, dy: f32) {
        self.yaw = (self.yaw + dx * self.sensitivity).rem_euclid(360.0);
        // screen y grows downwards
        self.pitch = (self.pitch - dy * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Moves on the ground plane for WASD and along world Y for up/down.
    pub fn advance(&mut self, keys: MoveKeys, dt: f32) {
        let step = self.speed * dt;
        let front = self.front();
        let planar = Vec3::new(front.x, 0.0, front.z).normalize_or_zero();
        let right = self.right();

        let mut delta = Vec3::ZERO;
        if keys.contains(MoveKeys::FORWARD) {
            delta += planar;
        }
        if keys.contains(MoveKeys::BACKWARD) {
            delta -= planar;
        }
        if keys.contains(MoveKeys::RIGHT) {
            delta += right;
        }
        if keys.contains(MoveKeys::LEFT) {
            delta -= right;
        }
        if keys.contains(MoveKeys::UP) {
            delta += Vec3::Y;
        }
        if keys.contains(MoveKeys::DOWN) {
            delta -= Vec3::Y;
        }
        self.position += delta * step;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front(), Vec3::Y)
    }
}
