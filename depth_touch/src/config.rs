use crate::core_modules::roi::Roi;
use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Runtime configuration of the touch engine, loaded from TOML.
///
/// Every field has a default matching a Kinect-class sensor mounted about a
/// meter above a table, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TouchConfig {
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub roi: Roi,
    #[serde(default)]
    pub touch: TouchBandConfig,
    #[serde(default)]
    pub background: BackgroundConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    /// Frame width in pixels
    #[serde(default = "default_width")]
    pub width: u32,
    /// Frame height in pixels
    #[serde(default = "default_height")]
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TouchBandConfig {
    /// Lowest height above the surface (mm, exclusive) that counts as touch
    #[serde(default = "default_depth_min")]
    pub depth_min: i32,
    /// Highest height above the surface (mm, exclusive) that counts as touch
    #[serde(default = "default_depth_max")]
    pub depth_max: i32,
    /// Blobs with this many pixels or fewer are ignored
    #[serde(default = "default_min_area")]
    pub min_area: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackgroundConfig {
    /// Number of frames averaged into the background model
    #[serde(default = "default_training_frames")]
    pub training_frames: usize,
}

fn default_width() -> u32 { 640 }
fn default_height() -> u32 { 480 }
fn default_depth_min() -> i32 { 10 }
fn default_depth_max() -> i32 { 20 }
fn default_min_area() -> usize { 50 }
fn default_training_frames() -> usize { 30 }

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for TouchBandConfig {
    fn default() -> Self {
        Self {
            depth_min: default_depth_min(),
            depth_max: default_depth_max(),
            min_area: default_min_area(),
        }
    }
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            training_frames: default_training_frames(),
        }
    }
}

impl TouchConfig {
    /// Reads and validates a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: TouchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks internal consistency and clamps the ROI to the sensor resolution.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let SensorConfig { width, height } = self.sensor;
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidResolution { width, height });
        }
        // With integer heights the open band (min, max) needs a gap of at least 2.
        if i64::from(self.touch.depth_max) - i64::from(self.touch.depth_min) < 2 {
            return Err(ConfigError::InvalidDepthBand {
                min: self.touch.depth_min,
                max: self.touch.depth_max,
            });
        }
        if self.background.training_frames == 0 {
            return Err(ConfigError::EmptyTraining);
        }
        self.roi = self.roi.clamped(width, height)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = TouchConfig::from_toml("").unwrap();
        assert_eq!((config.sensor.width, config.sensor.height), (640, 480));
        assert_eq!(config.roi, Roi::new(110, 560, 120, 320));
        assert_eq!(config.touch.depth_min, 10);
        assert_eq!(config.touch.depth_max, 20);
        assert_eq!(config.touch.min_area, 50);
        assert_eq!(config.background.training_frames, 30);
    }

    #[test]
    fn parses_all_sections() {
        let config = TouchConfig::from_toml(
            r#"
            [sensor]
            width = 320
            height = 240

            [roi]
            x_min = 10
            x_max = 300
            y_min = 20
            y_max = 400

            [touch]
            depth_min = 5
            depth_max = 30
            min_area = 12

            [background]
            training_frames = 4
            "#,
        )
        .unwrap();

        // y_max is clamped to the sensor height.
        assert_eq!(config.roi, Roi::new(10, 300, 20, 240));
        assert_eq!(config.touch.min_area, 12);
        assert_eq!(config.background.training_frames, 4);
    }

    #[test]
    fn rejects_an_empty_band() {
        let err = TouchConfig::from_toml("[touch]\ndepth_min = 20\ndepth_max = 21\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDepthBand { min: 20, max: 21 }));
    }

    #[test]
    fn band_check_holds_at_the_integer_limits() {
        let widest = "[touch]\ndepth_min = -2147483648\ndepth_max = 2147483647\n";
        let config = TouchConfig::from_toml(widest).unwrap();
        assert_eq!((config.touch.depth_min, config.touch.depth_max), (i32::MIN, i32::MAX));

        let inverted = "[touch]\ndepth_min = 2147483647\ndepth_max = -2147483648\n";
        match TouchConfig::from_toml(inverted) {
            Err(ConfigError::InvalidDepthBand { min, max }) => {
                assert_eq!((min, max), (i32::MAX, i32::MIN));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_a_collapsed_roi() {
        let collapsed = "[roi]\nx_min = 300\nx_max = 200\ny_min = 0\ny_max = 10\n";
        let err = TouchConfig::from_toml(collapsed).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoi { .. }));
    }

    #[test]
    fn rejects_zero_training_frames() {
        let err = TouchConfig::from_toml("[background]\ntraining_frames = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyTraining));
    }

    #[test]
    fn reports_syntax_errors() {
        assert!(matches!(TouchConfig::from_toml("[roi"), Err(ConfigError::Parse(_))));
    }
}
