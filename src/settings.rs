//! Persistent tracer settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::params::{Lens, APERTURE_RANGE, FOCUS_DISTANCE_RANGE};
use crate::scene::{ScatterParams, SceneVariant};
use crate::{Error, Result};

/// Tracer settings that persist between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerSettings {
    // Sphere scattering
    pub sphere_seed: u64,
    pub spheres_max: u32,
    pub sphere_radius: [f32; 2],  // [min, max]
    pub sphere_placement_radius: f32,

    // Lens
    pub aperture: f32,       // 1-16
    pub focus_distance: f32, // 0-20

    // Accumulation
    pub temporal_average: bool,

    // Program ABI
    pub variant: SceneVariant,

    // Output
    pub width: u32,
    pub height: u32,

    // Environment
    pub last_skybox: Option<PathBuf>,
}

impl Default for TracerSettings {
    fn default() -> Self {
        Self {
            sphere_seed: 1_223_832_719,
            spheres_max: 100,
            sphere_radius: [1.0, 3.0],
            sphere_placement_radius: 20.0,
            aperture: 16.0,
            focus_distance: 5.0,
            temporal_average: true,
            variant: SceneVariant::DepthOfField,
            width: 1280,
            height: 720,
            last_skybox: None,
        }
    }
}

impl TracerSettings {
    /// Get settings file path
    fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("progressive-tracer");
            std::fs::create_dir_all(&p).ok();
            p.push("settings.json");
            p
        })
    }

    /// Load settings from the user config dir, falling back to defaults
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| Self::load_from(&p).ok())
            .filter(|s| match s.validate() {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("ignoring saved settings: {e}");
                    false
                }
            })
            .unwrap_or_default()
    }

    /// Load settings from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let mut settings: Self = serde_json::from_str(&json)?;
        settings.sanitize();
        log::debug!("settings loaded from {}", path.display());
        Ok(settings)
    }

    /// Save settings to the user config dir
    pub fn save(&self) {
        if let Some(path) = Self::path() {
            if let Err(e) = self.save_to(&path) {
                log::warn!("failed to save settings: {e}");
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Clamp lens values into range and order the radius pair.
    fn sanitize(&mut self) {
        self.aperture = self.aperture.clamp(APERTURE_RANGE.0, APERTURE_RANGE.1);
        self.focus_distance = self.focus_distance.clamp(FOCUS_DISTANCE_RANGE.0, FOCUS_DISTANCE_RANGE.1);
        if self.sphere_radius[0] > self.sphere_radius[1] {
            self.sphere_radius.swap(0, 1);
        }
    }

    /// Reject values the tracer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.sphere_radius[0] < 0.0 {
            return Err(Error::InvalidSettings(format!(
                "sphere radius must be >= 0, got {:?}",
                self.sphere_radius
            )));
        }
        if self.sphere_placement_radius.is_nan() || self.sphere_placement_radius < 0.0 {
            return Err(Error::InvalidSettings(format!(
                "placement radius must be >= 0, got {}",
                self.sphere_placement_radius
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidSettings(format!(
                "output size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    pub fn scatter_params(&self) -> ScatterParams {
        ScatterParams {
            seed: self.sphere_seed,
            count: self.spheres_max,
            radius: (self.sphere_radius[0], self.sphere_radius[1]),
            placement_radius: self.sphere_placement_radius,
        }
    }

    pub fn lens(&self) -> Lens {
        Lens::new(self.aperture, self.focus_distance)
    }
}
