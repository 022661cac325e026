use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODULE_URL: &str = "g8emu.wasm";
pub const DEFAULT_SURFACE_SELECTOR: &str = "canvas";

const SLOW_HZ: NonZeroU32 = NonZeroU32::new(250).unwrap();
const NORMAL_HZ: NonZeroU32 = NonZeroU32::new(540).unwrap();
const FAST_HZ: NonZeroU32 = NonZeroU32::new(1000).unwrap();

/// CPU speed tiers offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedPreset {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl SpeedPreset {
    pub const ALL: [SpeedPreset; 3] = [SpeedPreset::Slow, SpeedPreset::Normal, SpeedPreset::Fast];

    pub fn frequency(self) -> NonZeroU32 {
        match self {
            SpeedPreset::Slow => SLOW_HZ,
            SpeedPreset::Normal => NORMAL_HZ,
            SpeedPreset::Fast => FAST_HZ,
        }
    }

    pub fn hz(self) -> u32 {
        self.frequency().get()
    }

    pub fn name(self) -> &'static str {
        match self {
            SpeedPreset::Slow => "slow",
            SpeedPreset::Normal => "normal",
            SpeedPreset::Fast => "fast",
        }
    }

    pub fn label(self) -> String {
        let name = self.name();
        let mut chars = name.chars();
        let title: String = chars
            .next()
            .map(|c| c.to_ascii_uppercase())
            .into_iter()
            .chain(chars)
            .collect();
        format!("{title} ({} Hz)", self.hz())
    }

    pub fn from_hz(hz: u32) -> Option<SpeedPreset> {
        Self::ALL.into_iter().find(|preset| preset.hz() == hz)
    }
}

impl fmt::Display for SpeedPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts a preset name (`"fast"`) or the Hz value a speed selector emits (`"1000"`).
impl FromStr for SpeedPreset {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(hz) = s.parse::<u32>() {
            return SpeedPreset::from_hz(hz).ok_or_else(|| BridgeError::UnknownSpeed(s.to_string()));
        }
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| BridgeError::UnknownSpeed(s.to_string()))
    }
}

/// Bounded retry used while waiting for the rendering surface to appear.
/// Once `max_attempts` lookups have failed the focus relay stays inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusPollConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for FocusPollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            max_attempts: 600,
        }
    }
}

impl FocusPollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Where the sandboxed context fetches the compiled module from
    pub module_url: String,
    /// Selector of the focus-capturing surface inside the sandboxed context
    pub surface_selector: String,
    pub focus_poll: FocusPollConfig,
    pub default_speed: SpeedPreset,
    /// File extensions offered by the ROM picker. Empty accepts everything.
    pub rom_extensions: Vec<String>,
    pub target_origin: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            module_url: DEFAULT_MODULE_URL.to_string(),
            surface_selector: DEFAULT_SURFACE_SELECTOR.to_string(),
            focus_poll: FocusPollConfig::default(),
            default_speed: SpeedPreset::default(),
            rom_extensions: vec!["ch8".to_string()],
            target_origin: "*".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, BridgeError> {
        let config: BridgeConfig =
            serde_json::from_str(json).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.module_url.trim().is_empty() {
            return Err(BridgeError::Config("module_url must not be empty".into()));
        }
        if self.surface_selector.trim().is_empty() {
            return Err(BridgeError::Config("surface_selector must not be empty".into()));
        }
        if self.focus_poll.interval_ms == 0 {
            return Err(BridgeError::Config("focus_poll.interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn accepts_file(&self, file_name: &str) -> bool {
        if self.rom_extensions.is_empty() {
            return true;
        }
        let Some((_, ext)) = file_name.rsplit_once('.') else {
            return false;
        };
        self.rom_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    /// Value for an `<input type="file" accept=...>` attribute
    pub fn accept_attribute(&self) -> String {
        self.rom_extensions
            .iter()
            .map(|ext| format!(".{}", ext.trim_start_matches('.')))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_distinct_and_positive() {
        let mut seen = Vec::new();
        for preset in SpeedPreset::ALL {
            assert!(preset.hz() > 0);
            assert!(!seen.contains(&preset.hz()));
            seen.push(preset.hz());
        }
        assert_eq!(SpeedPreset::default().hz(), 540);
    }

    #[test]
    fn test_parse_speed_preset() {
        assert_eq!("fast".parse::<SpeedPreset>(), Ok(SpeedPreset::Fast));
        assert_eq!(" Slow ".parse::<SpeedPreset>(), Ok(SpeedPreset::Slow));
        assert_eq!("1000".parse::<SpeedPreset>(), Ok(SpeedPreset::Fast));
        assert_eq!("540".parse::<SpeedPreset>(), Ok(SpeedPreset::Normal));
        assert_eq!(
            "541".parse::<SpeedPreset>(),
            Err(BridgeError::UnknownSpeed("541".into()))
        );
        assert!("ludicrous".parse::<SpeedPreset>().is_err());
    }

    #[test]
    fn test_preset_label() {
        assert_eq!(SpeedPreset::Normal.label(), "Normal (540 Hz)");
        assert_eq!(SpeedPreset::Fast.label(), "Fast (1000 Hz)");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = BridgeConfig::from_json_str(
            r#"{ "module_url": "roms/emu.wasm", "focus_poll": { "max_attempts": 5 } }"#,
        )
        .unwrap();
        assert_eq!(config.module_url, "roms/emu.wasm");
        assert_eq!(config.focus_poll.max_attempts, 5);
        assert_eq!(config.focus_poll.interval(), Duration::from_millis(100));
        assert_eq!(config.default_speed, SpeedPreset::Normal);
        assert_eq!(config.surface_selector, "canvas");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(
            BridgeConfig::from_json_str(r#"{ "focus_poll": { "interval_ms": 0 } }"#),
            Err(BridgeError::Config(_))
        ));
        assert!(matches!(
            BridgeConfig::from_json_str(r#"{ "module_url": "" }"#),
            Err(BridgeError::Config(_))
        ));
        assert!(matches!(
            BridgeConfig::from_json_str(r#"{ "default_speed": "warp" }"#),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn test_rom_extension_filter() {
        let config = BridgeConfig::default();
        assert!(config.accepts_file("PONG.CH8"));
        assert!(config.accepts_file("games/tetris.ch8"));
        assert!(!config.accepts_file("tetris.nes"));
        assert!(!config.accepts_file("README"));
        assert_eq!(config.accept_attribute(), ".ch8");

        let open = BridgeConfig {
            rom_extensions: Vec::new(),
            ..BridgeConfig::default()
        };
        assert!(open.accepts_file("anything.bin"));
    }
}
