//! Configuration loaded from `config.json` next to the executable.
//!
//! Missing or invalid files log and fall back to defaults, field by field
//! where possible.

use serde::{Deserialize, Serialize};
use std::fs;

/// Which recognition strategy to construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Template,
    Engine,
}

/// Which deduplication policy the loop runs with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Single-slot change-or-expire gate, no look-ahead.
    Single,
    /// Two-slot this/next queue with an explicit pop.
    Lookahead,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Top-left corner of the monitored region, absolute pixels.
    #[serde(default = "default_region_left_top")]
    pub region_left_top: (i32, i32),
    /// Bottom-right corner of the monitored region, absolute pixels.
    #[serde(default = "default_region_right_bottom")]
    pub region_right_bottom: (i32, i32),
    /// Dedup entries re-accept after this many seconds even if unchanged.
    #[serde(default = "default_expire_secs")]
    pub expire_secs: f32,
    /// Polling interval of the runner loop, milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Pause after triggering a draw so the next tick does not recapture
    /// mid-stroke ink as a new problem.
    #[serde(default = "default_post_draw_pause_ms")]
    pub post_draw_pause_ms: u64,
    /// Per-event settle time of the pen backend, milliseconds.
    #[serde(default = "default_pen_step_ms")]
    pub pen_step_ms: u64,
    /// Gate: region mean intensity must exceed this (background visible).
    #[serde(default = "default_bright_mean_above")]
    pub bright_mean_above: f32,
    /// Gate: region minimum intensity must fall below this (ink visible).
    #[serde(default = "default_ink_min_below")]
    pub ink_min_below: u8,
    /// Lookahead release: region minimum below this means the answer ink
    /// has started appearing. Heuristic, not an invariant.
    #[serde(default = "default_dark_release_below")]
    pub dark_release_below: u8,
    /// Template matches below this confidence are dropped.
    #[serde(default = "default_match_confidence")]
    pub match_confidence: f64,
    #[serde(default = "default_strategy")]
    pub strategy: Strategy,
    #[serde(default = "default_cache_policy")]
    pub cache_policy: CachePolicy,
    /// Reject non-integral answers instead of drawing a fractional part.
    #[serde(default)]
    pub forbid_fractional: bool,
    /// Normalize loaded templates to this size, when set.
    #[serde(default)]
    pub template_norm_size: Option<(u32, u32)>,
}

fn default_region_left_top() -> (i32, i32) {
    (800, 225)
}

fn default_region_right_bottom() -> (i32, i32) {
    (1100, 300)
}

fn default_expire_secs() -> f32 {
    2.5
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_post_draw_pause_ms() -> u64 {
    250
}

fn default_pen_step_ms() -> u64 {
    40
}

fn default_bright_mean_above() -> f32 {
    196.0
}

fn default_ink_min_below() -> u8 {
    32
}

fn default_dark_release_below() -> u8 {
    48
}

fn default_match_confidence() -> f64 {
    0.5
}

fn default_strategy() -> Strategy {
    Strategy::Template
}

fn default_cache_policy() -> CachePolicy {
    CachePolicy::Single
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            region_left_top: default_region_left_top(),
            region_right_bottom: default_region_right_bottom(),
            expire_secs: default_expire_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            post_draw_pause_ms: default_post_draw_pause_ms(),
            pen_step_ms: default_pen_step_ms(),
            bright_mean_above: default_bright_mean_above(),
            ink_min_below: default_ink_min_below(),
            dark_release_below: default_dark_release_below(),
            match_confidence: default_match_confidence(),
            strategy: default_strategy(),
            cache_policy: default_cache_policy(),
            forbid_fractional: false,
            template_norm_size: None,
        }
    }
}

/// Field-level validation after parse. `expire_secs` feeds
/// `Duration::from_secs_f32`, which panics on negative or non-finite input,
/// so bad values fall back to the default with a log line instead.
fn sanitize(mut config: AppConfig) -> AppConfig {
    if !config.expire_secs.is_finite() || config.expire_secs < 0.0 {
        crate::log(&format!(
            "Invalid expire_secs {}, using default",
            config.expire_secs
        ));
        config.expire_secs = default_expire_secs();
    }
    config
}

/// Loads the configuration, falling back to defaults with a log line.
pub fn load_config() -> AppConfig {
    let config_path = crate::paths::get_config_file();
    if !config_path.exists() {
        crate::log("config.json not found, using default config");
        return AppConfig::default();
    }
    match fs::read_to_string(&config_path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                crate::log("Config loaded from config.json");
                sanitize(config)
            }
            Err(e) => {
                crate::log(&format!("Failed to parse config.json: {e}. Using defaults."));
                AppConfig::default()
            }
        },
        Err(e) => {
            crate::log(&format!("Failed to read config.json: {e}. Using defaults."));
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.expire_secs, 2.5);
        assert_eq!(config.strategy, Strategy::Template);
        assert_eq!(config.cache_policy, CachePolicy::Single);
        assert!(!config.forbid_fractional);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"region_left_top": [10, 20], "cache_policy": "lookahead"}"#,
        )
        .unwrap();
        assert_eq!(config.region_left_top, (10, 20));
        assert_eq!(config.region_right_bottom, (1100, 300));
        assert_eq!(config.cache_policy, CachePolicy::Lookahead);
    }

    #[test]
    fn test_sanitize_rejects_negative_expire() {
        let config: AppConfig = serde_json::from_str(r#"{"expire_secs": -1.0}"#).unwrap();
        assert_eq!(sanitize(config).expire_secs, default_expire_secs());
    }

    #[test]
    fn test_strategy_round_trips() {
        let json = serde_json::to_string(&Strategy::Engine).unwrap();
        assert_eq!(json, "\"engine\"");
        let back: Strategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Strategy::Engine);
    }
}
