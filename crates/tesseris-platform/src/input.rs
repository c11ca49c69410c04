// SPDX-License-Identifier: CEPL-1.0
use tesseris_math::MoveKeys;
use winit::{event::ElementState, keyboard::KeyCode};

/// One-shot commands triggered on key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    ToggleFullscreen,
    ToggleVsync,
    ReleaseCursor,
}

impl Action {
    pub fn from_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::Escape => Some(Action::Quit),
            KeyCode::F11 => Some(Action::ToggleFullscreen),
            KeyCode::KeyV => Some(Action::ToggleVsync),
            KeyCode::Tab => Some(Action::ReleaseCursor),
            _ => None,
        }
    }
}

fn move_key(key: KeyCode) -> Option<MoveKeys> {
    match key {
        KeyCode::KeyW => Some(MoveKeys::FORWARD),
        KeyCode::KeyS => Some(MoveKeys::BACKWARD),
        KeyCode::KeyA => Some(MoveKeys::LEFT),
        KeyCode::KeyD => Some(MoveKeys::RIGHT),
        KeyCode::Space => Some(MoveKeys::UP),
        KeyCode::ShiftLeft => Some(MoveKeys::DOWN),
        _ => None,
    }
}

/// Held movement keys plus mouse motion accumulated between frames.
#[derive(Debug, Default)]
pub struct InputState {
    held: MoveKeys,
    mouse_delta: (f64, f64),
    grabbed: bool,
}

impl InputState {
    /// Tracks held movement keys. Returns the action a fresh press maps to;
    /// auto-repeat is filtered out.
    pub fn key(&mut self, key: KeyCode, state: ElementState, repeat: bool) -> Option<Action> {
        let pressed = state == ElementState::Pressed;
        if let Some(bit) = move_key(key) {
            self.held.set(bit, pressed);
            return None;
        }
        if pressed && !repeat {
            Action::from_key(key)
        } else {
            None
        }
    }

    pub fn held(&self) -> MoveKeys {
        self.held
    }

    /// Raw motion only counts while the cursor is grabbed.
    pub fn mouse_motion(&mut self, dx: f64, dy: f64) {
        if self.grabbed {
            self.mouse_delta.0 += dx;
            self.mouse_delta.1 += dy;
        }
    }

    pub fn take_mouse_delta(&mut self) -> (f32, f32) {
        let (dx, dy) = std::mem::take(&mut self.mouse_delta);
        (dx as f32, dy as f32)
    }

    pub fn grabbed(&self) -> bool {
        self.grabbed
    }

    pub fn set_grabbed(&mut self, grabbed: bool) {
        self.grabbed = grabbed;
        self.mouse_delta = (0.0, 0.0);
    }

    /// Focus loss drops held keys so the camera does not keep drifting.
    pub fn clear(&mut self) {
        self.held = MoveKeys::empty();
        self.mouse_delta = (0.0, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_keys_track_press_and_release() {
        let mut input = InputState::default();
        assert_eq!(input.key(KeyCode::KeyW, ElementState::Pressed, false), None);
        input.key(KeyCode::ShiftLeft, ElementState::Pressed, false);
        assert_eq!(input.held(), MoveKeys::FORWARD | MoveKeys::DOWN);
        input.key(KeyCode::KeyW, ElementState::Released, false);
        assert_eq!(input.held(), MoveKeys::DOWN);
    }

    #[test]
    fn actions_fire_on_fresh_press_only() {
        let mut input = InputState::default();
        assert_eq!(
            input.key(KeyCode::KeyV, ElementState::Pressed, false),
            Some(Action::ToggleVsync)
        );
        assert_eq!(input.key(KeyCode::KeyV, ElementState::Pressed, true), None);
        assert_eq!(input.key(KeyCode::KeyV, ElementState::Released, false), None);
        assert_eq!(
            input.key(KeyCode::Escape, ElementState::Pressed, false),
            Some(Action::Quit)
        );
        assert_eq!(input.key(KeyCode::KeyQ, ElementState::Pressed, false), None);
    }

    #[test]
    fn mouse_motion_ignored_until_grabbed() {
        let mut input = InputState::default();
        input.mouse_motion(5.0, 5.0);
        assert_eq!(input.take_mouse_delta(), (0.0, 0.0));

        input.set_grabbed(true);
        input.mouse_motion(3.0, -1.0);
        input.mouse_motion(2.0, -1.0);
        assert_eq!(input.take_mouse_delta(), (5.0, -2.0));
        assert_eq!(input.take_mouse_delta(), (0.0, 0.0));
    }

    #[test]
    fn clear_drops_held_keys() {
        let mut input = InputState::default();
        input.key(KeyCode::KeyA, ElementState::Pressed, false);
        input.clear();
        assert!(input.held().is_empty());
    }
}
