use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drivers::ViewerError;
use crate::interaction::DEFAULT_LABEL;
use crate::recorder::validate_label;
use crate::window::WindowParameters;

/// Viewer settings as stored on disk. Every field has a default, so a
/// partial file (or `{}`) is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub tick_period_ms: u64,
    pub window_duration: f64,
    pub buffer_duration: f64,
    pub amplitude_scale: f64,
    pub selected_channels: Vec<usize>,
    pub show_events: bool,
    pub annotation_label: String,
    pub annotation_file: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 20,
            window_duration: 10.0,
            buffer_duration: 30.0,
            amplitude_scale: 100.0,
            selected_channels: vec![0, 1, 2, 3],
            show_events: true,
            annotation_label: DEFAULT_LABEL.to_owned(),
            annotation_file: None,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self, ViewerError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ViewerError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ViewerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Window parameters checked against a scope with `channel_count`
    /// channels.
    pub fn to_params(&self, channel_count: usize) -> Result<WindowParameters, ViewerError> {
        if self.tick_period_ms == 0 {
            return Err(ViewerError::InvalidTickPeriod);
        }
        validate_label(&self.annotation_label)?;
        let params = WindowParameters {
            window_duration: self.window_duration,
            buffer_duration: self.buffer_duration,
            amplitude_scale: self.amplitude_scale,
            selected_channels: self.selected_channels.clone(),
            show_events: self.show_events,
        };
        params.validate(channel_count)?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config = ViewerConfig::from_json(r#"{ "window_duration": 5.0, "annotation_label": "blink" }"#)
            .unwrap();
        assert_eq!(config.window_duration, 5.0);
        assert_eq!(config.annotation_label, "blink");
        assert_eq!(config.tick_period(), Duration::from_millis(20));
        assert_eq!(config.buffer_duration, 30.0);
        assert!(config.annotation_file.is_none());
    }

    #[test]
    fn invalid_windows_are_rejected() {
        let config = ViewerConfig {
            window_duration: 45.0,
            ..ViewerConfig::default()
        };
        assert!(matches!(config.to_params(4), Err(ViewerError::WindowTooLong { .. })));
        let config = ViewerConfig::default();
        assert!(matches!(
            config.to_params(2),
            Err(ViewerError::ChannelOutOfRange { channel: 2, available: 2 })
        ));
        let config = ViewerConfig {
            annotation_label: "two\nlines".into(),
            ..ViewerConfig::default()
        };
        assert!(matches!(config.to_params(4), Err(ViewerError::InvalidLabel(_))));
        assert!(matches!(
            ViewerConfig::from_json("{ not json"),
            Err(ViewerError::Config(_))
        ));
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        let config = ViewerConfig {
            selected_channels: vec![3, 1],
            annotation_file: Some("notes.txt".into()),
            ..ViewerConfig::default()
        };
        fs::write(&path, config.to_json().unwrap()).unwrap();
        assert_eq!(ViewerConfig::load(&path).unwrap(), config);
        assert_eq!(config.to_params(4).unwrap().selected_channels, vec![3, 1]);
    }
}
