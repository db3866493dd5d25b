//! Persistent host settings (JSON file in the app data directory).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ditties_core::transcribe::capture::CaptureConfig;
use ditties_core::{AssistantConfig, ClassifierConfig, PlaybackConfig, ResampleMode};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const SETTINGS_ENV: &str = "DITTIES_SETTINGS";
pub const WIT_TOKEN_ENV: &str = "DITTIES_WIT_TOKEN";

/// One voice-channel participant backed by a file (raw s16le or WAV).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSettings {
    pub name: String,
    pub audio_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub bot_name: String,
    pub command_prefix: String,
    pub catalog_path: Option<PathBuf>,
    /// Mark `play <url>` requests ready immediately (no fetch step).
    pub instant_ready_requests: bool,
    pub participants: Vec<ParticipantSettings>,
    pub resample_mode: ResampleMode,
    pub classifier: ClassifierConfig,
    pub wit_endpoint: String,
    pub wit_token: Option<String>,
    pub end_silence_ms: u32,
    pub max_utterance_ms: u32,
    pub autoplay: bool,
    pub pending_poll_secs: u64,
    pub restart_delay_ms: u64,
    /// Simulated length of every song.
    pub song_duration_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            bot_name: "Dank Ditties bot".into(),
            command_prefix: "!dd".into(),
            catalog_path: None,
            instant_ready_requests: true,
            participants: Vec::new(),
            resample_mode: ResampleMode::Decimate,
            classifier: ClassifierConfig {
                model_path: "models/porcupine_params.pv".into(),
                keyword_paths: vec!["models/dank-ditties.ppn".into()],
                sensitivities: vec![0.5],
            },
            wit_endpoint: "https://api.wit.ai/speech".into(),
            wit_token: None,
            end_silence_ms: 800,
            max_utterance_ms: 10_000,
            autoplay: true,
            pending_poll_secs: 5,
            restart_delay_ms: 2_000,
            song_duration_secs: 180,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        let defaults = Self::default();

        self.bot_name = self.bot_name.trim().to_string();
        if self.bot_name.is_empty() {
            self.bot_name = defaults.bot_name;
        }
        self.command_prefix = self.command_prefix.trim().to_string();
        if self.command_prefix.is_empty() {
            self.command_prefix = defaults.command_prefix;
        }
        self.wit_endpoint = self.wit_endpoint.trim().to_string();
        if self.wit_endpoint.is_empty() {
            self.wit_endpoint = defaults.wit_endpoint;
        }
        self.wit_token = self
            .wit_token
            .as_ref()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        self.participants.retain(|p| !p.name.trim().is_empty());
        for p in &mut self.participants {
            p.name = p.name.trim().to_string();
        }
        self.classifier.sensitivities = self
            .classifier
            .sensitivities
            .iter()
            .map(|s| s.clamp(0.0, 1.0))
            .collect();

        self.end_silence_ms = self.end_silence_ms.clamp(200, 5_000);
        self.max_utterance_ms = self.max_utterance_ms.clamp(1_000, 30_000);
        self.pending_poll_secs = self.pending_poll_secs.clamp(1, 300);
        self.restart_delay_ms = self.restart_delay_ms.clamp(100, 60_000);
        self.song_duration_secs = self.song_duration_secs.clamp(1, 3_600);
    }

    /// Secrets from the environment win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(WIT_TOKEN_ENV) {
            let token = token.trim();
            if !token.is_empty() {
                self.wit_token = Some(token.to_string());
            }
        }
    }

    pub fn assistant_config(&self) -> AssistantConfig {
        let mut config = AssistantConfig {
            bot_name: self.bot_name.clone(),
            ..AssistantConfig::default()
        };
        config.resampler.mode = self.resample_mode;
        config
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            end_silence_ms: self.end_silence_ms,
            max_utterance_ms: self.max_utterance_ms,
            ..CaptureConfig::default()
        }
    }

    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            autoplay: self.autoplay,
            pending_poll_interval: Duration::from_secs(self.pending_poll_secs),
        }
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

pub fn default_settings_path() -> PathBuf {
    if let Some(path) = std::env::var_os(SETTINGS_ENV) {
        return PathBuf::from(path);
    }
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".local")
                .join("share")
        })
        .join("ditties")
        .join("settings.json")
}

/// Missing file means defaults; a malformed one is logged and ignored.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<AppSettings>(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), "ignoring malformed settings: {e}");
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    };
    settings.apply_env_overrides();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut s: AppSettings =
            serde_json::from_str(r#"{"botName":"  ","commandPrefix":"!music","restartDelayMs":5}"#)
                .unwrap();
        s.normalize();
        assert_eq!(s.bot_name, "Dank Ditties bot");
        assert_eq!(s.command_prefix, "!music");
        assert_eq!(s.restart_delay_ms, 100);
        assert!(s.autoplay);
        assert_eq!(s.resample_mode, ResampleMode::Decimate);
    }

    #[test]
    fn resample_mode_and_participants_parse() {
        let mut s: AppSettings = serde_json::from_str(
            r#"{"resampleMode":"filtered",
                "participants":[{"name":" alice ","audioPath":"a.wav"},{"name":"","audioPath":"b.raw"}],
                "witToken":"   "}"#,
        )
        .unwrap();
        s.normalize();
        assert_eq!(s.resample_mode, ResampleMode::Filtered);
        assert_eq!(s.participants.len(), 1);
        assert_eq!(s.participants[0].name, "alice");
        assert_eq!(s.wit_token, None);
        assert_eq!(s.assistant_config().resampler.mode, ResampleMode::Filtered);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = std::env::temp_dir().join(format!("ditties-settings-{}", std::process::id()));
        let path = dir.join("settings.json");
        let settings = AppSettings {
            song_duration_secs: 42,
            ..AppSettings::default()
        };
        save_settings(&path, &settings).unwrap();
        let loaded = load_settings(&path);
        assert_eq!(loaded.song_duration_secs, 42);
        let _ = fs::remove_dir_all(dir);
    }
}
