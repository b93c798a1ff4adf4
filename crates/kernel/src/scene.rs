use std::path::{Path, PathBuf};

use cubefield_common::{ColorRgb, Position};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::systems::free_cam::FreeCamSettings;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to read scene file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid scene description: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// One explicitly placed cube.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubeSpec {
    pub position: Position,
    pub color: ColorRgb,
}

/// A `columns` x `rows` wall of cubes in the XY plane starting at `origin`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub columns: u32,
    pub rows: u32,
    pub spacing: f32,
    #[serde(default)]
    pub origin: Vec3,
}

impl GridSpec {
    /// Cubes of the grid, row by row. Red grows along columns, green along
    /// rows.
    pub fn cubes(&self) -> impl Iterator<Item = CubeSpec> + '_ {
        let red_step = 1.0 / self.columns.saturating_sub(1).max(1) as f32;
        let green_step = 1.0 / self.rows.saturating_sub(1).max(1) as f32;
        (0..self.rows).flat_map(move |row| {
            (0..self.columns).map(move |column| CubeSpec {
                position: Position(
                    self.origin + Vec3::new(column as f32, row as f32, 0.0) * self.spacing,
                ),
                color: ColorRgb::new(column as f32 * red_step, row as f32 * green_step, 0.5),
            })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSpec {
    pub position: Position,
    pub fov_degrees: f32,
    pub near_clip: f32,
    pub far_clip: f32,
}

impl Default for CameraSpec {
    fn default() -> Self {
        Self {
            position: Position::new(0.0, 0.0, -3.0),
            fov_degrees: 90.0,
            near_clip: 0.1,
            far_clip: 1000.0,
        }
    }
}

/// Scene description, loadable from YAML. Omitted fields fall back to the
/// default three-cube scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub cubes: Vec<CubeSpec>,
    pub grid: Option<GridSpec>,
    pub camera: CameraSpec,
    pub free_cam: FreeCamSettings,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            cubes: vec![
                CubeSpec {
                    position: Position::new(-1.25, 0.0, 0.0),
                    color: ColorRgb::RED,
                },
                CubeSpec {
                    position: Position::new(0.0, 0.25, 0.0),
                    color: ColorRgb::GREEN,
                },
                CubeSpec {
                    position: Position::new(1.25, 0.5, 0.0),
                    color: ColorRgb::BLUE,
                },
            ],
            grid: None,
            camera: CameraSpec::default(),
            free_cam: FreeCamSettings::default(),
        }
    }
}

impl SceneConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let scene = Self::from_yaml(&text)?;
        tracing::info!(path = %path.display(), cubes = scene.cube_count(), "scene loaded");
        Ok(scene)
    }

    pub fn from_yaml(text: &str) -> Result<Self, SceneError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml(&self) -> Result<String, SceneError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Every cube of the scene: explicit cubes first, then the grid.
    pub fn all_cubes(&self) -> Vec<CubeSpec> {
        let mut cubes = self.cubes.clone();
        if let Some(grid) = &self.grid {
            cubes.extend(grid.cubes());
        }
        cubes
    }

    pub fn cube_count(&self) -> usize {
        let grid = self
            .grid
            .map_or(0, |grid| grid.columns as usize * grid.rows as usize);
        self.cubes.len() + grid
    }
}
