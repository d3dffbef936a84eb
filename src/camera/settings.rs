//! Per-session camera settings.
//!
//! Settings are captured when a session opens. Mutating them afterwards has
//! no effect on that session; the next session picks up the new values.

use serde::{Deserialize, Serialize};

/// Focus behavior requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusMode {
    /// Single focus sweeps, re-triggered periodically while previewing.
    Auto,
    /// Device-driven continuous focus, no periodic re-trigger.
    Continuous,
    Infinity,
    /// Close-range focus. Re-triggered periodically like [`FocusMode::Auto`].
    Macro,
}

/// Options applied to the camera when a session is opened and configured.
///
/// The focus mode is derived from the auto-focus and continuous-focus flags
/// so the common cases need no explicit choice, but it can also be set
/// directly for the uncommon ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    requested_device_id: Option<String>,
    scan_inverted: bool,
    scene_mode: bool,
    metering: bool,
    exposure: bool,
    auto_torch: bool,
    auto_focus: bool,
    continuous_focus: bool,
    focus_mode: Option<FocusMode>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        CameraSettings {
            requested_device_id: None,
            scan_inverted: false,
            scene_mode: false,
            metering: false,
            exposure: false,
            auto_torch: false,
            auto_focus: true,
            continuous_focus: false,
            focus_mode: Some(FocusMode::Auto),
        }
    }
}

impl CameraSettings {
    pub fn new() -> Self {
        CameraSettings::default()
    }

    /// Device to open, or `None` for the first available camera.
    pub fn requested_device_id(&self) -> Option<&str> {
        self.requested_device_id.as_deref()
    }

    pub fn set_requested_device_id(&mut self, id: Option<String>) {
        self.requested_device_id = id;
    }

    /// Whether the sensor output should be color-inverted by the device.
    pub fn scan_inverted(&self) -> bool {
        self.scan_inverted
    }

    pub fn set_scan_inverted(&mut self, inverted: bool) {
        self.scan_inverted = inverted;
    }

    /// Whether to request the device's barcode scene mode, if it has one.
    pub fn scene_mode(&self) -> bool {
        self.scene_mode
    }

    pub fn set_scene_mode(&mut self, enabled: bool) {
        self.scene_mode = enabled;
    }

    /// Whether to request center-weighted metering.
    pub fn metering(&self) -> bool {
        self.metering
    }

    pub fn set_metering(&mut self, enabled: bool) {
        self.metering = enabled;
    }

    /// Whether exposure compensation follows the torch state.
    pub fn exposure(&self) -> bool {
        self.exposure
    }

    pub fn set_exposure(&mut self, enabled: bool) {
        self.exposure = enabled;
    }

    /// Whether the torch is driven automatically from ambient light.
    pub fn auto_torch(&self) -> bool {
        self.auto_torch
    }

    pub fn set_auto_torch(&mut self, enabled: bool) {
        self.auto_torch = enabled;
    }

    pub fn auto_focus(&self) -> bool {
        self.auto_focus
    }

    /// Enables or disables auto-focus, re-deriving the focus mode.
    pub fn set_auto_focus(&mut self, enabled: bool) {
        self.auto_focus = enabled;
        self.focus_mode = if enabled && self.continuous_focus {
            Some(FocusMode::Continuous)
        } else if enabled {
            Some(FocusMode::Auto)
        } else {
            None
        };
    }

    pub fn continuous_focus(&self) -> bool {
        self.continuous_focus
    }

    /// Enables or disables continuous focus, re-deriving the focus mode.
    pub fn set_continuous_focus(&mut self, enabled: bool) {
        self.continuous_focus = enabled;
        self.focus_mode = if enabled {
            Some(FocusMode::Continuous)
        } else if self.auto_focus {
            Some(FocusMode::Auto)
        } else {
            None
        };
    }

    /// The focus mode the session will request, `None` for the device default.
    pub fn focus_mode(&self) -> Option<FocusMode> {
        self.focus_mode
    }

    /// Overrides the derived focus mode.
    pub fn set_focus_mode(&mut self, mode: Option<FocusMode>) {
        self.focus_mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_auto_focus() {
        let settings = CameraSettings::default();
        assert!(settings.auto_focus());
        assert!(!settings.continuous_focus());
        assert_eq!(settings.focus_mode(), Some(FocusMode::Auto));
    }

    #[test]
    fn disabling_auto_focus_clears_focus_mode() {
        let mut settings = CameraSettings::default();
        settings.set_auto_focus(false);
        assert_eq!(settings.focus_mode(), None);
    }

    #[test]
    fn continuous_focus_wins_while_auto_focus_enabled() {
        let mut settings = CameraSettings::default();
        settings.set_continuous_focus(true);
        assert_eq!(settings.focus_mode(), Some(FocusMode::Continuous));

        settings.set_continuous_focus(false);
        assert_eq!(settings.focus_mode(), Some(FocusMode::Auto));
    }

    #[test]
    fn disabling_auto_focus_overrides_continuous() {
        let mut settings = CameraSettings::default();
        settings.set_continuous_focus(true);
        settings.set_auto_focus(false);
        assert_eq!(settings.focus_mode(), None);
    }

    #[test]
    fn continuous_without_auto_focus_falls_back_to_none() {
        let mut settings = CameraSettings::default();
        settings.set_auto_focus(false);
        settings.set_continuous_focus(true);
        assert_eq!(settings.focus_mode(), Some(FocusMode::Continuous));

        settings.set_continuous_focus(false);
        assert_eq!(settings.focus_mode(), None);
    }

    #[test]
    fn explicit_focus_mode_survives_until_rederived() {
        let mut settings = CameraSettings::default();
        settings.set_focus_mode(Some(FocusMode::Macro));
        assert_eq!(settings.focus_mode(), Some(FocusMode::Macro));

        settings.set_auto_focus(true);
        assert_eq!(settings.focus_mode(), Some(FocusMode::Auto));
    }

    #[test]
    fn roundtrips_through_toml() {
        let mut settings = CameraSettings::default();
        settings.set_requested_device_id(Some("1".to_string()));
        settings.set_auto_torch(true);
        let text = toml::to_string(&settings).expect("serialize");
        let back: CameraSettings = toml::from_str(&text).expect("deserialize");
        assert_eq!(back, settings);
    }
}
