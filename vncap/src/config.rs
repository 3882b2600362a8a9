//! Configuration for the `vncap` recorder.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use vncap_core::{CaptureConfig, PalettePolicy, Repeat, SchedulerError, SchedulerKind};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VncapConfig {
    /// Update scheduling and palette handling.
    pub capture: CaptureSection,
    /// Where and how the GIF is written.
    pub output: OutputConfig,
    /// Built-in synthetic framebuffer source.
    pub demo: DemoConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// How update requests are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Request the next frame as soon as one arrives.
    Reactive,
    /// Request frames at a fixed rate (`fps`).
    Periodic,
}

/// Capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    pub mode: CaptureMode,
    /// Target frames per second for periodic mode. Must be positive.
    pub fps: f64,
    /// "reduce" or "strict" handling of frames above 256 colors.
    pub palette: PalettePolicy,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// GIF file to write.
    pub path: PathBuf,
    /// Loop count written into the GIF.
    pub repeat: Repeat,
    /// GIF encoder speed, 1 (smallest file) to 30 (fastest).
    pub speed: i32,
}

/// Synthetic source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub width: u32,
    pub height: u32,
    /// Updates sent before the source ends the stream. 0 = unlimited.
    pub frames: u32,
    /// Simulated server render time per update, in milliseconds.
    pub render_delay_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Periodic,
            fps: 15.0,
            palette: PalettePolicy::Reduce,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("vnc-record.gif"),
            repeat: Repeat::Once,
            speed: 10,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 200,
            frames: 120,
            render_delay_ms: 20,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl VncapConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Convert capture settings into the core's `CaptureConfig`.
    pub fn to_capture_config(&self) -> Result<CaptureConfig, SchedulerError> {
        let scheduler = match self.capture.mode {
            CaptureMode::Reactive => SchedulerKind::Reactive,
            CaptureMode::Periodic => SchedulerKind::from_fps(self.capture.fps)?,
        };
        Ok(CaptureConfig {
            scheduler,
            palette: self.capture.palette,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = VncapConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("fps"));
        assert!(text.contains("render_delay_ms"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = VncapConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: VncapConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.capture.mode, CaptureMode::Periodic);
        assert_eq!(parsed.demo.width, 320);
        assert_eq!(parsed.output.repeat, Repeat::Once);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: VncapConfig = toml::from_str(
            r#"
            [capture]
            mode = "reactive"

            [output]
            repeat = "infinite"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.capture.mode, CaptureMode::Reactive);
        assert_eq!(parsed.capture.fps, 15.0);
        assert_eq!(parsed.output.repeat, Repeat::Infinite);
        assert_eq!(parsed.output.speed, 10);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn periodic_mode_uses_fps() {
        let mut cfg = VncapConfig::default();
        cfg.capture.fps = 10.0;
        let capture = cfg.to_capture_config().unwrap();
        assert_eq!(
            capture.scheduler,
            SchedulerKind::Periodic {
                period: Duration::from_millis(100)
            }
        );
    }

    #[test]
    fn non_positive_fps_is_rejected() {
        let mut cfg = VncapConfig::default();
        cfg.capture.fps = 0.0;
        assert_eq!(cfg.to_capture_config(), Err(SchedulerError::ZeroPeriod));

        cfg.capture.mode = CaptureMode::Reactive;
        assert!(cfg.to_capture_config().is_ok());
    }
}
