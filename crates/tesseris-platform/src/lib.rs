// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
pub mod input;
pub mod window;

pub use input::{Action, InputState};
pub use window::{create_window, set_cursor_grab, toggle_fullscreen, WindowSettings};
pub use winit;
