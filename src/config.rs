//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::board::DEFAULT_COOLDOWN_MS;
use crate::dwell::{DwellTiming, DEFAULT_DWELL_MS};

/// Speech program used when none is configured
#[cfg(target_os = "macos")]
pub const DEFAULT_SPEECH_PROGRAM: &str = "say";
#[cfg(not(target_os = "macos"))]
pub const DEFAULT_SPEECH_PROGRAM: &str = "espeak-ng";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Dwell thresholds
    pub dwell: DwellTiming,

    /// Text-to-speech program and leading arguments
    pub speech_program: String,
    pub speech_args: Vec<String>,

    /// Cooldown between Select/Back presses
    pub input_cooldown: Duration,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let home = lookup("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("aac-daemon");

        let socket_path = lookup("AAC_SOCKET_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("daemon.sock"));

        let dwell = DwellTiming {
            focus: millis(&lookup, "AAC_DWELL_FOCUS_MS", DEFAULT_DWELL_MS)?,
            commit: millis(&lookup, "AAC_DWELL_COMMIT_MS", DEFAULT_DWELL_MS)?,
        };
        if dwell.focus.is_zero() || dwell.commit.is_zero() {
            anyhow::bail!("dwell durations must be greater than zero");
        }

        let speech_program = lookup("AAC_SPEECH_PROGRAM")
            .filter(|program| !program.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SPEECH_PROGRAM.to_string());
        let speech_args = lookup("AAC_SPEECH_ARGS")
            .map(|args| args.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let input_cooldown = millis(&lookup, "AAC_INPUT_COOLDOWN_MS", DEFAULT_COOLDOWN_MS)?;

        Ok(Self {
            socket_path,
            data_dir,
            dwell,
            speech_program,
            speech_args,
            input_cooldown,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> Result<Duration> {
    let ms = match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{name} must be a whole number of milliseconds"))?,
        None => default,
    };
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load_with(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_config_load() {
        let config = Config::load().unwrap();
        assert!(config.socket_path.to_string_lossy().contains("aac-daemon"));
    }

    #[test]
    fn test_defaults() {
        let config = load_with(&[("HOME", "/home/user")]).unwrap();
        assert_eq!(
            config.socket_path,
            PathBuf::from("/home/user/.local/share/aac-daemon/daemon.sock")
        );
        assert_eq!(config.dwell, DwellTiming::default());
        assert_eq!(config.speech_program, DEFAULT_SPEECH_PROGRAM);
        assert!(config.speech_args.is_empty());
        assert_eq!(config.input_cooldown, Duration::from_millis(150));
    }

    #[test]
    fn test_overrides() {
        let config = load_with(&[
            ("HOME", "/home/user"),
            ("AAC_SOCKET_PATH", "/tmp/aac.sock"),
            ("AAC_DWELL_FOCUS_MS", "400"),
            ("AAC_DWELL_COMMIT_MS", "900"),
            ("AAC_SPEECH_PROGRAM", "espeak"),
            ("AAC_SPEECH_ARGS", "-v ja  -s 140"),
        ])
        .unwrap();

        assert_eq!(config.socket_path, PathBuf::from("/tmp/aac.sock"));
        assert_eq!(config.dwell.focus, Duration::from_millis(400));
        assert_eq!(config.dwell.commit, Duration::from_millis(900));
        assert_eq!(config.speech_program, "espeak");
        assert_eq!(config.speech_args, vec!["-v", "ja", "-s", "140"]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load_with(&[("HOME", "/h"), ("AAC_DWELL_FOCUS_MS", "soon")]).is_err());
        assert!(load_with(&[("HOME", "/h"), ("AAC_DWELL_COMMIT_MS", "0")]).is_err());
        assert!(load_with(&[]).is_err());
    }
}
