//! Run configuration: RON file plus command-line overrides

use std::path::{Path, PathBuf};

use attractor_physics::{
    Attractor, AttractorField, CameraParams, EscapePolicy, Frustum, IntegrationParams,
    ModelParams, PhysicsError, SceneParams, ATTRACTOR_1_POSITION, ATTRACTOR_2_POSITION,
    DELTA_T, GRAVITY, GRID_RESOLUTION, MAX_DIST, PARTICLE_INV_MASS,
};
use attractor_renderer::PointStyle;
use attractor_simulation::RotationAnimation;
use clap::{Parser, ValueEnum};
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(version, about = "Particle cloud pulled around by fixed attractors")]
pub struct Cli {
    /// RON file with run parameters; every field is optional
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Where the integration step runs
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Grid points per axis; the run simulates resolution³ particles
    #[arg(long)]
    pub resolution: Option<u32>,
}

impl Cli {
    /// File values (or defaults), then flags on top.
    pub fn resolve(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(resolution) = self.resolution {
            config.resolution = resolution;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// wgpu compute shader
    #[default]
    Gpu,
    /// rayon thread pool
    Cpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EscapeConfig {
    #[default]
    LastAttractor,
    AllAttractors,
}

impl From<EscapeConfig> for EscapePolicy {
    fn from(escape: EscapeConfig) -> Self {
        match escape {
            EscapeConfig::LastAttractor => EscapePolicy::LastAttractor,
            EscapeConfig::AllAttractors => EscapePolicy::AllAttractors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttractorConfig {
    pub position: [f32; 3],
    pub gravity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendKind,
    pub resolution: u32,

    pub delta_t: f32,
    pub inverse_mass: f32,
    pub max_distance: f32,
    pub escape: EscapeConfig,
    pub attractors: Vec<AttractorConfig>,

    pub eye: [f32; 3],
    pub up: [f32; 3],
    pub look: [f32; 3],
    /// `[near, far, width, height]`
    pub frustum: [f32; 4],
    /// Degrees added to the model rotation every frame
    pub rotation_per_frame: [f32; 3],

    pub particle_color: [f32; 4],
    pub attractor_color: [f32; 4],
    pub attractor_size: f32,

    pub window_size: [u32; 2],
}

impl Default for AppConfig {
    fn default() -> Self {
        let camera = CameraParams::default();
        let frustum = Frustum::default();
        let style = PointStyle::default();
        Self {
            backend: BackendKind::Gpu,
            resolution: GRID_RESOLUTION,
            delta_t: DELTA_T,
            inverse_mass: PARTICLE_INV_MASS,
            max_distance: MAX_DIST,
            escape: EscapeConfig::LastAttractor,
            attractors: vec![
                AttractorConfig {
                    position: ATTRACTOR_1_POSITION.to_array(),
                    gravity: GRAVITY,
                },
                AttractorConfig {
                    position: ATTRACTOR_2_POSITION.to_array(),
                    gravity: GRAVITY,
                },
            ],
            eye: camera.eye.to_array(),
            up: camera.up.to_array(),
            look: camera.look.to_array(),
            frustum: [frustum.near, frustum.far, frustum.width, frustum.height],
            rotation_per_frame: RotationAnimation::default().degrees_per_frame.to_array(),
            particle_color: style.particle_color.to_array(),
            attractor_color: style.attractor_color.to_array(),
            attractor_size: style.attractor_size,
            window_size: [800, 600],
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&contents)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_ron(contents: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(contents)?)
    }

    pub fn particle_count(&self) -> u64 {
        (self.resolution as u64).pow(3)
    }

    pub fn field(&self) -> Result<AttractorField, PhysicsError> {
        AttractorField::new(
            self.attractors
                .iter()
                .map(|a| Attractor::new(Vec3::from_array(a.position), a.gravity))
                .collect(),
        )
    }

    pub fn integration_params(&self) -> IntegrationParams {
        IntegrationParams {
            delta_t: self.delta_t,
            inverse_mass: self.inverse_mass,
            max_distance: self.max_distance,
            escape: self.escape.into(),
        }
    }

    pub fn scene_params(&self) -> SceneParams {
        let [near, far, width, height] = self.frustum;
        SceneParams {
            model: ModelParams::default(),
            camera: CameraParams {
                eye: Vec3::from_array(self.eye),
                up: Vec3::from_array(self.up),
                look: Vec3::from_array(self.look),
            },
            frustum: Frustum {
                near,
                far,
                width,
                height,
            },
        }
    }

    pub fn animation(&self) -> RotationAnimation {
        RotationAnimation {
            degrees_per_frame: Vec3::from_array(self.rotation_per_frame),
        }
    }

    pub fn style(&self) -> PointStyle {
        PointStyle {
            particle_color: Vec4::from_array(self.particle_color),
            attractor_color: Vec4::from_array(self.attractor_color),
            attractor_size: self.attractor_size,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}
