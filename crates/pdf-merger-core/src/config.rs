use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::pdf::{
    AssembleOptions, CompressOptions, DEFAULT_CONVERGENCE, DEFAULT_CUT_QUALITY,
    DEFAULT_EARLY_STOP_RATIO, DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_SIZE_BYTES,
    DEFAULT_RENDER_SCALE,
};
use crate::raster::{DEFAULT_IMAGE_CAP_BYTES, DEFAULT_MAX_PIXELS};

/// Size-constrained compression settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Byte budget for the compressed PDF
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,

    /// Lowest JPEG quality tried before giving up
    #[serde(default = "default_cut_quality")]
    pub cut_quality: f32,

    /// Maximum number of bisection trials
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Stop once an accepted result exceeds this fraction of the budget
    #[serde(default = "default_early_stop_ratio")]
    pub early_stop_ratio: f64,

    /// Stop once the quality interval is narrower than this
    #[serde(default = "default_convergence")]
    pub convergence: f32,
}

const fn default_max_size_bytes() -> u64 {
    DEFAULT_MAX_SIZE_BYTES
}

const fn default_cut_quality() -> f32 {
    DEFAULT_CUT_QUALITY
}

const fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

const fn default_early_stop_ratio() -> f64 {
    DEFAULT_EARLY_STOP_RATIO
}

const fn default_convergence() -> f32 {
    DEFAULT_CONVERGENCE
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            cut_quality: default_cut_quality(),
            max_iterations: default_max_iterations(),
            early_stop_ratio: default_early_stop_ratio(),
            convergence: default_convergence(),
        }
    }
}

impl From<CompressionConfig> for CompressOptions {
    fn from(config: CompressionConfig) -> Self {
        Self {
            max_size_bytes: config.max_size_bytes,
            cut_quality: config.cut_quality,
            max_iterations: config.max_iterations,
            early_stop_ratio: config.early_stop_ratio,
            convergence: config.convergence,
        }
    }
}

/// Raster input settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterConfig {
    /// Pixel budget for decoded images (default 4096x4096)
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,

    /// Per-image JPEG size the quality ladder aims for
    #[serde(default = "default_image_cap_bytes")]
    pub image_cap_bytes: u64,
}

const fn default_max_pixels() -> u64 {
    DEFAULT_MAX_PIXELS
}

const fn default_image_cap_bytes() -> u64 {
    DEFAULT_IMAGE_CAP_BYTES
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            max_pixels: default_max_pixels(),
            image_cap_bytes: default_image_cap_bytes(),
        }
    }
}

impl From<RasterConfig> for AssembleOptions {
    fn from(config: RasterConfig) -> Self {
        Self {
            max_pixels: config.max_pixels,
            image_cap_bytes: config.image_cap_bytes,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// PDF page render scale for recompression (default: 1.0)
    #[serde(default = "default_render_scale")]
    pub render_scale: f32,

    /// Compression configuration
    #[serde(default)]
    pub compression: CompressionConfig,

    /// Raster input configuration
    #[serde(default)]
    pub raster: RasterConfig,
}

const fn default_render_scale() -> f32 {
    DEFAULT_RENDER_SCALE
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            render_scale: default_render_scale(),
            compression: CompressionConfig::default(),
            raster: RasterConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        toml::from_str(&content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))
    }

    /// Config files in lookup order: user config, then `./config.toml`
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(config_dir) = crate::util::config_dir() {
            paths.push(config_dir.join("pdf-merger").join("config.toml"));
        }
        paths.push(PathBuf::from("config.toml"));
        paths
    }

    /// Load from default locations (~/.config/pdf-merger/config.toml, ./config.toml).
    ///
    /// Unreadable files are logged and skipped; falls back to defaults.
    pub fn load() -> Self {
        for path in Self::search_paths() {
            if !path.exists() {
                continue;
            }
            match Self::from_file(&path) {
                Ok(config) => {
                    tracing::debug!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load {}: {}", path.display(), e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }

    /// Like [`AppConfig::load`], but a file that exists and fails to load or
    /// validate is an error.
    pub fn try_load() -> Result<Self> {
        for path in Self::search_paths() {
            if path.exists() {
                let config = Self::from_file(&path)?;
                config.validate()?;
                tracing::debug!("Loaded config from {}", path.display());
                return Ok(config);
            }
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.render_scale.is_finite() || self.render_scale <= 0.0 {
            return Err(Error::ConfigInvalid {
                field: "render_scale".to_string(),
                reason: format!("must be a positive number, got {}", self.render_scale),
            });
        }
        if self.raster.max_pixels == 0 {
            return Err(Error::ConfigInvalid {
                field: "raster.max_pixels".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.compress_options().validate()
    }

    pub fn compress_options(&self) -> CompressOptions {
        self.compression.into()
    }

    pub fn assemble_options(&self) -> AssembleOptions {
        self.raster.into()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.compression.max_size_bytes, 1_000_000);
        assert!((config.compression.cut_quality - 0.04).abs() < f32::EPSILON);
        assert_eq!(config.compression.max_iterations, 10);
        assert_eq!(config.raster.max_pixels, 4096 * 4096);
        assert!((config.render_scale - 1.0).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r"
            [compression]
            max_size_bytes = 250000
            ",
        )
        .unwrap();

        assert_eq!(config.compression.max_size_bytes, 250_000);
        assert!((config.compression.cut_quality - 0.04).abs() < f32::EPSILON);
        assert_eq!(config.raster, RasterConfig::default());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "render_scale = 2.0\n[raster]\nmax_pixels = 1000000\n",
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert!((config.render_scale - 2.0).abs() < f32::EPSILON);
        assert_eq!(config.assemble_options().max_pixels, 1_000_000);
    }

    #[test]
    fn test_from_file_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "render_scale = \"big\"").unwrap();

        assert!(matches!(AppConfig::from_file(&path), Err(Error::ConfigLoad(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.render_scale = 0.0;
        assert!(matches!(config.validate(), Err(Error::ConfigInvalid { .. })));

        let mut config = AppConfig::default();
        config.compression.cut_quality = 2.0;
        assert!(matches!(config.validate(), Err(Error::ConfigInvalid { .. })));

        let mut config = AppConfig::default();
        config.raster.max_pixels = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_options_conversion() {
        let mut config = AppConfig::default();
        config.compression.max_size_bytes = 42;
        let options = config.compress_options();
        assert_eq!(options.max_size_bytes, 42);
        assert_eq!(options.max_iterations, DEFAULT_MAX_ITERATIONS);
    }
}
