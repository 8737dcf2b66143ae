use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use viewdispatch::{FrameSize, GpuPower, ViewMode, AUGMENTED_FRAME_SLOT};

/// Smallest frame ring that still holds the slot the augmented view reads.
pub const MIN_FRAME_RING: usize = AUGMENTED_FRAME_SLOT + 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewerConfig {
    pub version: u32,
    #[serde(default)]
    pub view: ViewSection,
    #[serde(default)]
    pub gpu: GpuSection,
    #[serde(default)]
    pub engine: EngineSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewSection {
    #[serde(default, deserialize_with = "deserialize_mode")]
    pub initial_mode: ViewMode,
    #[serde(default = "default_frame_size", deserialize_with = "deserialize_size")]
    pub frame_size: FrameSize,
    #[serde(default = "default_window_size", deserialize_with = "deserialize_size")]
    pub window_size: FrameSize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GpuSection {
    #[serde(default)]
    pub power: GpuPower,
    #[serde(default = "default_vsync")]
    pub vsync: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// How long one simulated pose-detector pass keeps the detector busy.
    #[serde(
        default = "default_detector_latency",
        deserialize_with = "deserialize_duration"
    )]
    pub detector_latency: Duration,
    #[serde(default = "default_frame_ring")]
    pub frame_ring: usize,
}

impl Default for ViewSection {
    fn default() -> Self {
        Self {
            initial_mode: ViewMode::default(),
            frame_size: default_frame_size(),
            window_size: default_window_size(),
        }
    }
}

impl Default for GpuSection {
    fn default() -> Self {
        Self {
            power: GpuPower::default(),
            vsync: default_vsync(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            detector_latency: default_detector_latency(),
            frame_ring: default_frame_ring(),
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            view: ViewSection::default(),
            gpu: GpuSection::default(),
            engine: EngineSection::default(),
        }
    }
}

fn default_frame_size() -> FrameSize {
    FrameSize::new(768, 576)
}

fn default_window_size() -> FrameSize {
    FrameSize::new(1024, 768)
}

fn default_vsync() -> bool {
    true
}

fn default_detector_latency() -> Duration {
    Duration::from_millis(250)
}

fn default_frame_ring() -> usize {
    4
}

fn deserialize_mode<'de, D>(deserializer: D) -> Result<ViewMode, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    match Helper::deserialize(deserializer)? {
        Helper::Str(raw) => raw.parse().map_err(de::Error::custom),
        Helper::Num(value) => u8::try_from(value)
            .map_err(|_| de::Error::custom(format!("view mode ordinal {value} out of range")))
            .and_then(|ordinal| ViewMode::from_ordinal(ordinal).map_err(de::Error::custom)),
    }
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<FrameSize, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(de::Error::custom)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl ViewerConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: ViewerConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Loads `path` when it exists and falls back to defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        // Sizes are already non-zero once parsed; defaults are checked here.
        for (name, size) in [
            ("view.frame_size", self.view.frame_size),
            ("view.window_size", self.view.window_size),
        ] {
            if size.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be non-zero, got {size}"
                )));
            }
        }

        if self.engine.frame_ring < MIN_FRAME_RING {
            return Err(ConfigError::Invalid(format!(
                "engine.frame_ring must be at least {MIN_FRAME_RING}, got {}",
                self.engine.frame_ring
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[view]
initial_mode = "fitted-model"
frame_size = "768x576"
window_size = "1024x768"

[gpu]
power = "low"
vsync = false

[engine]
detector_latency = "250ms"
frame_ring = 4
"#;

    #[test]
    fn parses_sample_config() {
        let config = ViewerConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.version, 1);
        assert_eq!(config.view.initial_mode, ViewMode::FittedModel);
        assert_eq!(config.view.frame_size, FrameSize::new(768, 576));
        assert_eq!(config.view.window_size, FrameSize::new(1024, 768));
        assert_eq!(config.gpu.power, GpuPower::Low);
        assert!(!config.gpu.vsync);
        assert_eq!(config.engine.detector_latency, Duration::from_millis(250));
        assert_eq!(config.engine.frame_ring, 4);
    }

    #[test]
    fn sections_are_optional() {
        let config = ViewerConfig::from_toml_str("version = 1").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.view.initial_mode, ViewMode::Input);
        assert!(config.gpu.vsync);
    }

    #[test]
    fn accepts_mode_ordinal_and_numeric_duration() {
        let config = ViewerConfig::from_toml_str(
            r#"
version = 1

[view]
initial_mode = 9

[engine]
detector_latency = 1.5
"#,
        )
        .unwrap();
        assert_eq!(config.view.initial_mode, ViewMode::Contours);
        assert_eq!(config.engine.detector_latency, Duration::from_millis(1500));
    }

    #[test]
    fn rejects_out_of_range_mode() {
        let err = ViewerConfig::from_toml_str("version = 1\n[view]\ninitial_mode = 12\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        let err = ViewerConfig::from_toml_str("version = 1\n[view]\ninitial_mode = \"bogus\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_zero_sizes() {
        let err = ViewerConfig::from_toml_str("version = 1\n[view]\nframe_size = \"0x576\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_unrepresentable_latency() {
        for value in ["inf", "1e300", "nan", "-0.5"] {
            let input = format!("version = 1\n[engine]\ndetector_latency = {value}\n");
            let err = ViewerConfig::from_toml_str(&input).unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)), "{value}: {err}");
        }
    }

    #[test]
    fn rejects_unknown_version() {
        let err = ViewerConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_short_frame_ring() {
        let err = ViewerConfig::from_toml_str("version = 1\n[engine]\nframe_ring = 2\n")
            .unwrap_err();
        match err {
            ConfigError::Invalid(message) => assert!(message.contains("frame_ring")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = ViewerConfig::from_toml_str("version = 1\n[view]\nmode = \"input\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = Path::new("/nonexistent/trackview/config.toml");
        let config = ViewerConfig::load_or_default(path).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }
}
