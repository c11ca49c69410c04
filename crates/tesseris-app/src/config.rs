// SPDX-License-Identifier: CEPL-1.0
use clap::Parser;
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf};
use tesseris_platform::WindowSettings;
use tesseris_render::{Mesh, RenderSettings, Scene};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// OBJ mesh drawn instead of the built-in cube
    pub mesh: Option<PathBuf>,

    /// Settings file; missing keys keep their defaults
    #[arg(long, default_value = "tesseris.toml")]
    pub config: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SceneKind {
    #[default]
    Cube,
    Triangle,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: "tesseris".into(),
            width: 800,
            height: 600,
            fullscreen: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct RenderCfg {
    pub vsync: bool,
    pub clear_color: [f32; 4],
    pub validation: bool,
    pub scene: SceneKind,
}

impl Default for RenderCfg {
    fn default() -> Self {
        let d = RenderSettings::default();
        RenderCfg {
            vsync: d.vsync,
            clear_color: d.clear_color,
            validation: d.validation,
            scene: SceneKind::Cube,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CameraCfg {
    pub speed: f32,
    pub sensitivity: f32,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraCfg {
    fn default() -> Self {
        CameraCfg {
            speed: 2.5,
            sensitivity: 0.1,
            fov_degrees: 45.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
    pub camera: CameraCfg,
}

impl AppCfg {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Never fails: an unreadable or malformed file means defaults.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => match Self::parse(&text) {
                Ok(cfg) => {
                    info!("config: {}", path.display());
                    cfg
                }
                Err(e) => {
                    warn!("config {} is malformed, using defaults: {e}", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                warn!("config {} not read, using defaults: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn window_settings(&self) -> WindowSettings {
        WindowSettings {
            title: self.window.title.clone(),
            width: self.window.width,
            height: self.window.height,
            fullscreen: self.window.fullscreen,
        }
    }

    /// A loaded mesh overrides the configured scene.
    pub fn render_settings(&self, mesh: Option<Mesh>) -> RenderSettings {
        let scene = match (mesh, self.render.scene) {
            (Some(mesh), _) => Scene::Mesh(mesh),
            (None, SceneKind::Cube) => Scene::Mesh(Mesh::cube()),
            (None, SceneKind::Triangle) => Scene::Triangle,
        };
        RenderSettings {
            vsync: self.render.vsync,
            clear_color: self.render.clear_color,
            validation: self.render.validation,
            scene,
        }
    }
}
