//! Configuration file surface.
//!
//! Scanner setup can be described in a TOML file: camera settings,
//! viewfinder framing, and decoder selection. A missing file means
//! defaults; a malformed one is an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::camera::CameraSettings;
use crate::decoder::{BarcodeFormat, BinarizationMode, DecodeHints, DefaultDecoderFactory};
use crate::errors::ScanError;
use crate::scaling::ScalingMode;
use crate::scanner::BarcodeScanner;
use crate::types::Size;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub camera: CameraSettings,
    pub viewfinder: ViewfinderConfig,
    pub decoder: DecoderConfig,
}

/// Viewfinder framing and preview placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewfinderConfig {
    /// Exact framing size [width, height]; overrides the margin fraction.
    pub framing_size: Option<[u32; 2]>,
    /// Fraction of the smaller container dimension left free per side.
    pub margin_fraction: f64,
    /// Scaling strategy override; unset picks one from the surface kind.
    pub scaling: Option<ScalingMode>,
}

impl Default for ViewfinderConfig {
    fn default() -> Self {
        ViewfinderConfig {
            framing_size: None,
            margin_fraction: 0.1,
            scaling: None,
        }
    }
}

/// Decoder construction parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub mode: BinarizationMode,
    /// Formats to look for; unset means all the reader supports.
    pub formats: Option<Vec<BarcodeFormat>>,
    pub character_set: Option<String>,
}

impl ScannerConfig {
    /// Loads from a TOML file; a missing file yields the defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScanError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("config file not found at {:?}, using defaults", path);
            return Ok(ScannerConfig::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| ScanError::ConfigFile(format!("failed to read {path:?}: {e}")))?;
        let config: ScannerConfig = toml::from_str(&contents)
            .map_err(|e| ScanError::ConfigFile(format!("failed to parse {path:?}: {e}")))?;
        config.validate()?;
        log::info!("loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Saves as TOML, creating parent directories as needed.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ScanError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ScanError::ConfigFile(format!("failed to create config directory: {e}"))
            })?;
        }
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ScanError::ConfigFile(format!("failed to serialize config: {e}")))?;
        fs::write(path, toml_string)
            .map_err(|e| ScanError::ConfigFile(format!("failed to write {path:?}: {e}")))?;
        log::info!("saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("framescan.toml")
    }

    /// Loads from the default location, falling back to defaults on any
    /// failure.
    pub fn load_or_default() -> Self {
        ScannerConfig::load_from_file(ScannerConfig::default_path()).unwrap_or_else(|e| {
            log::warn!("failed to load config, using defaults: {e}");
            ScannerConfig::default()
        })
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        if !(self.viewfinder.margin_fraction >= 0.0 && self.viewfinder.margin_fraction < 0.5) {
            return Err(ScanError::InvalidArgument(
                "viewfinder margin fraction must be in [0, 0.5)".to_string(),
            ));
        }
        if let Some([w, h]) = self.viewfinder.framing_size {
            if w == 0 || h == 0 {
                return Err(ScanError::InvalidArgument(
                    "viewfinder framing size must be non-zero".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Base hints for the decoder factory.
    pub fn decode_hints(&self) -> DecodeHints {
        DecodeHints {
            formats: self.decoder.formats.clone(),
            character_set: self.decoder.character_set.clone(),
        }
    }

    /// Decoder factory reflecting the `[decoder]` section.
    pub fn decoder_factory(&self) -> DefaultDecoderFactory {
        let mut factory = DefaultDecoderFactory::new().with_mode(self.decoder.mode);
        if let Some(formats) = &self.decoder.formats {
            factory = factory.with_formats(formats.clone());
        }
        if let Some(character_set) = &self.decoder.character_set {
            factory = factory.with_character_set(character_set.clone());
        }
        factory
    }

    /// Applies every section to a scanner. Call before `resume`.
    pub fn apply_to(&self, scanner: &mut BarcodeScanner) -> Result<(), ScanError> {
        self.validate()?;
        scanner.set_camera_settings(self.camera.clone());
        match self.viewfinder.framing_size {
            Some([w, h]) => scanner.set_framing_size(Size::new(w, h)),
            None => scanner.set_framing_margin_fraction(self.viewfinder.margin_fraction)?,
        }
        if let Some(mode) = self.viewfinder.scaling {
            scanner.set_scaling_mode(mode);
        }
        scanner.set_decoder_factory(Arc::new(self.decoder_factory()));
        scanner.set_decode_hints(self.decode_hints());
        Ok(())
    }
}
