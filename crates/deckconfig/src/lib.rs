use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level `shaderdeck.toml`. Every section is optional.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeckConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub gpu: GpuSection,
    #[serde(default)]
    pub run: RunSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowSection {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSection {
    /// Logical pixels per rendered pixel.
    pub scale_factor: f32,
    /// Overrides the ratio the window system reports.
    pub device_pixel_ratio: Option<f64>,
    /// Fixed resolution of the relay target used by the pixelate demo.
    #[serde(deserialize_with = "deserialize_resolution")]
    pub offscreen_resolution: (u32, u32),
    /// Frame cap; 0 or absent means uncapped.
    pub fps: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GpuSection {
    #[serde(deserialize_with = "deserialize_power")]
    pub power: PowerSetting,
    pub fallback_adapter: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    #[default]
    Low,
    High,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSection {
    pub demo: String,
    #[serde(
        deserialize_with = "deserialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Duration>,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            window: WindowSection::default(),
            render: RenderSection::default(),
            gpu: GpuSection::default(),
            run: RunSection::default(),
        }
    }
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "shaderdeck".into(),
        }
    }
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            device_pixel_ratio: None,
            offscreen_resolution: (160, 90),
            fps: None,
        }
    }
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            demo: "tunnel".into(),
            duration: None,
        }
    }
}

fn default_version() -> u32 {
    1
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Duration::try_from_secs_f64(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// Accepts `"320x180"` or `[320, 180]`.
fn deserialize_resolution<'de, D>(deserializer: D) -> Result<(u32, u32), D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Pair([i64; 2]),
    }

    match Helper::deserialize(deserializer)? {
        Helper::Str(raw) => parse_resolution(&raw).map_err(de::Error::custom),
        Helper::Pair([width, height]) => {
            let width = u32::try_from(width)
                .map_err(|_| de::Error::custom(format!("invalid width {width}")))?;
            let height = u32::try_from(height)
                .map_err(|_| de::Error::custom(format!("invalid height {height}")))?;
            Ok((width, height))
        }
    }
}

/// Parses `WIDTHxHEIGHT` (also accepts `X` and `×` as separator).
pub fn parse_resolution(raw: &str) -> Result<(u32, u32), String> {
    let normalized = raw.trim().to_ascii_lowercase();
    let (width, height) = normalized
        .split_once('x')
        .or_else(|| normalized.split_once('×'))
        .ok_or_else(|| format!("invalid resolution '{raw}'; expected WIDTHxHEIGHT"))?;
    let width = width
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("invalid width in '{raw}': {err}"))?;
    let height = height
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("invalid height in '{raw}': {err}"))?;
    Ok((width, height))
}

/// Parses a duration given as plain seconds (`"2.5"`) or humantime (`"1m 30s"`).
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let trimmed = raw.trim();
    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds)
            .map_err(|err| format!("invalid duration '{raw}': {err}"));
    }
    humantime::parse_duration(trimmed).map_err(|err| format!("invalid duration '{raw}': {err}"))
}

fn deserialize_power<'de, D>(deserializer: D) -> Result<PowerSetting, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_power(&raw).map_err(de::Error::custom)
}

fn parse_power(raw: &str) -> Result<PowerSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "low" | "low-power" | "lowpower" | "integrated" => Ok(PowerSetting::Low),
        "high" | "high-performance" | "performance" | "discrete" => Ok(PowerSetting::High),
        other => Err(format!("invalid gpu power setting '{other}'; expected 'low' or 'high'")),
    }
}

impl DeckConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: DeckConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Frame cap with 0 normalised to "uncapped".
    pub fn fps(&self) -> Option<f32> {
        self.render.fps.filter(|fps| *fps > 0.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be positive, got {}x{}",
                self.window.width, self.window.height
            )));
        }

        let scale = self.render.scale_factor;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "render.scale_factor must be > 0, got {scale}"
            )));
        }

        if let Some(ratio) = self.render.device_pixel_ratio {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "render.device_pixel_ratio must be > 0, got {ratio}"
                )));
            }
        }

        let (width, height) = self.render.offscreen_resolution;
        if width == 0 || height == 0 {
            return Err(ConfigError::Invalid(format!(
                "render.offscreen_resolution must be at least 1x1, got {width}x{height}"
            )));
        }

        if let Some(fps) = self.render.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid("render.fps must be >= 0".into()));
            }
        }

        if self.run.demo.trim().is_empty() {
            return Err(ConfigError::Invalid("run.demo may not be empty".into()));
        }

        if let Some(duration) = self.run.duration {
            if duration.is_zero() {
                return Err(ConfigError::Invalid(
                    "run.duration must be greater than zero".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[window]
width = 800
height = 600
title = "deck"

[render]
scale_factor = 2.0
device_pixel_ratio = 1.5
offscreen_resolution = "64x36"
fps = 30

[gpu]
power = "high-performance"
fallback_adapter = true

[run]
demo = "cube"
duration = "1m 30s"
"#;

    #[test]
    fn parses_sample_config() {
        let config = DeckConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.title, "deck");
        assert_eq!(config.render.scale_factor, 2.0);
        assert_eq!(config.render.device_pixel_ratio, Some(1.5));
        assert_eq!(config.render.offscreen_resolution, (64, 36));
        assert_eq!(config.fps(), Some(30.0));
        assert_eq!(config.gpu.power, PowerSetting::High);
        assert!(config.gpu.fallback_adapter);
        assert_eq!(config.run.demo, "cube");
        assert_eq!(config.run.duration, Some(Duration::from_secs(90)));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = DeckConfig::from_toml_str("").unwrap();
        assert_eq!(config, DeckConfig::default());
        assert_eq!(config.fps(), None);
        assert_eq!(config.gpu.power, PowerSetting::Low);
    }

    #[test]
    fn accepts_numeric_durations_and_array_resolution() {
        let config = DeckConfig::from_toml_str(
            r#"
[render]
offscreen_resolution = [320, 200]
fps = 0

[run]
duration = 2.5
"#,
        )
        .unwrap();
        assert_eq!(config.render.offscreen_resolution, (320, 200));
        assert_eq!(config.fps(), None);
        assert_eq!(config.run.duration, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn rejects_bad_values() {
        for input in [
            "version = 2",
            "[window]\nwidth = 0",
            "[render]\nscale_factor = 0.0",
            "[render]\nscale_factor = -1.5",
            "[render]\nfps = -1",
            "[render]\noffscreen_resolution = \"0x10\"",
            "[render]\ndevice_pixel_ratio = 0.0",
            "[run]\ndemo = \"  \"",
            "[run]\nduration = 0",
        ] {
            let err = DeckConfig::from_toml_str(input).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{input}: {err}");
        }
    }

    #[test]
    fn rejects_unparseable_values() {
        for input in [
            "[gpu]\npower = \"turbo\"",
            "[render]\noffscreen_resolution = \"wide\"",
            "[run]\nduration = \"soon\"",
            "[run]\nduration = 1e30",
            "[window]\ncolour = \"red\"",
        ] {
            let err = DeckConfig::from_toml_str(input).unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)), "{input}: {err}");
        }
    }

    #[test]
    fn load_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = DeckConfig::load(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Io { ref path, .. } if path == &missing));

        let present = dir.path().join("deck.toml");
        fs::write(&present, "[run]\ndemo = \"triangle\"\n").unwrap();
        assert_eq!(DeckConfig::load(&present).unwrap().run.demo, "triangle");
    }

    #[test]
    fn parses_resolution_strings() {
        assert_eq!(parse_resolution("1920x1080"), Ok((1920, 1080)));
        assert_eq!(parse_resolution(" 64 X 48 "), Ok((64, 48)));
        assert!(parse_resolution("64").is_err());
        assert!(parse_resolution("ax4").is_err());
    }

    #[test]
    fn parses_duration_strings() {
        assert_eq!(parse_duration("2.5"), Ok(Duration::from_millis(2500)));
        assert_eq!(parse_duration("90"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("1m 30s"), Ok(Duration::from_secs(90)));
        assert!(parse_duration("-1").is_err());
        assert!(parse_duration("later").is_err());
    }

    #[test]
    fn out_of_range_durations_are_errors() {
        for raw in ["1e30", "inf", "NaN"] {
            let err = parse_duration(raw).unwrap_err();
            assert!(err.starts_with("invalid duration"), "{raw}: {err}");
        }
    }
}
