// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use tracing::{info, warn};
use winit::{
    dpi::LogicalSize,
    event_loop::ActiveEventLoop,
    window::{CursorGrabMode, Fullscreen, Window},
};

#[derive(Clone, Debug)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

pub fn create_window(event_loop: &ActiveEventLoop, settings: &WindowSettings) -> Result<Window> {
    let mut attrs = Window::default_attributes()
        .with_title(settings.title.clone())
        .with_inner_size(LogicalSize::new(settings.width, settings.height))
        .with_resizable(true);
    if settings.fullscreen {
        attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
    }
    let window = event_loop.create_window(attrs).context("create_window")?;
    info!(
        "window '{}' created ({}x{}, fullscreen={})",
        settings.title, settings.width, settings.height, settings.fullscreen
    );
    Ok(window)
}

/// Switches between windowed and borderless fullscreen. Returns the new state.
pub fn toggle_fullscreen(window: &Window) -> bool {
    let now_fullscreen = window.fullscreen().is_none();
    window.set_fullscreen(now_fullscreen.then_some(Fullscreen::Borderless(None)));
    info!("fullscreen={now_fullscreen}");
    now_fullscreen
}

/// Relative mouse mode: hide the cursor and keep it inside the window.
/// Platforms without pointer locking fall back to confinement.
pub fn set_cursor_grab(window: &Window, grab: bool) -> Result<()> {
    if grab {
        if let Err(e) = window.set_cursor_grab(CursorGrabMode::Locked) {
            warn!("cursor lock unavailable ({e}), confining instead");
            window
                .set_cursor_grab(CursorGrabMode::Confined)
                .context("set_cursor_grab(Confined)")?;
        }
    } else {
        window
            .set_cursor_grab(CursorGrabMode::None)
            .context("set_cursor_grab(None)")?;
    }
    window.set_cursor_visible(!grab);
    Ok(())
}
