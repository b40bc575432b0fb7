//! Per-store tuning.
//!
//! Profiles are plain data: built-ins cover the stores we have tuned so far
//! and a TOML document can override or add to them. Once loaded a profile is
//! shared read-only behind an `Arc`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::scoring::MIN_CONFIDENCE;

pub const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse profile TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid ignore pattern for profile '{profile}': {source}")]
    InvalidIgnorePattern {
        profile: String,
        #[source]
        source: regex::Error,
    },
    #[error("Unknown store profile: '{0}'")]
    Unknown(String),
}

/// Blank-line block segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentKnobs {
    /// Blocks shorter than this (space-joined chars) are dropped.
    pub min_block_len: usize,
    /// How many following blocks a rescue merge may absorb.
    pub merge_lookahead: usize,
}

impl Default for SegmentKnobs {
    fn default() -> Self {
        Self { min_block_len: 25, merge_lookahead: 2 }
    }
}

/// Price-anchored word clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterKnobs {
    pub min_word_conf: i32,
    pub anchor_conf: i32,
    pub radius_px: f32,
    pub min_words_per_offer: usize,
    pub max_offers_per_page: usize,
    /// Whole-word pattern for badge glyphs that should never join a cluster.
    pub ignore_pattern: Option<String>,
}

impl Default for ClusterKnobs {
    fn default() -> Self {
        Self {
            min_word_conf: 35,
            anchor_conf: 40,
            radius_px: 260.0,
            min_words_per_offer: 4,
            max_offers_per_page: 250,
            ignore_pattern: None,
        }
    }
}

/// Character windows around price tokens, for flyers whose OCR has no
/// usable blank-line structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackKnobs {
    pub enabled: bool,
    /// Switch to windows when block mode yields fewer offers than this.
    pub min_offers: usize,
    pub before: usize,
    pub after: usize,
}

impl Default for FallbackKnobs {
    fn default() -> Self {
        Self { enabled: false, min_offers: 10, before: 160, after: 260 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreProfile {
    pub name: String,
    pub segment: SegmentKnobs,
    pub cluster: ClusterKnobs,
    pub fallback: FallbackKnobs,
    /// Offers scoring below this (0–100) are rejected.
    pub min_confidence: u8,
    #[serde(skip)]
    ignore_re: Option<Regex>,
}

impl Default for StoreProfile {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROFILE.to_string(),
            segment: SegmentKnobs::default(),
            cluster: ClusterKnobs::default(),
            fallback: FallbackKnobs::default(),
            min_confidence: MIN_CONFIDENCE,
            ignore_re: None,
        }
    }
}

impl StoreProfile {
    /// Compile the ignore pattern. Must run before the profile is shared.
    pub fn compile(mut self) -> Result<Self, ProfileError> {
        self.ignore_re = match &self.cluster.ignore_pattern {
            Some(pat) if !pat.is_empty() => Some(Regex::new(pat).map_err(|source| {
                ProfileError::InvalidIgnorePattern { profile: self.name.clone(), source }
            })?),
            _ => None,
        };
        Ok(self)
    }

    /// Whether a word should be left out of every cluster.
    pub fn ignores_word(&self, text: &str) -> bool {
        self.ignore_re.as_ref().is_some_and(|re| re.is_match(text.trim()))
    }

    fn wegmans() -> Self {
        Self {
            name: "wegmans".to_string(),
            cluster: ClusterKnobs {
                ignore_pattern: Some("(?i)^(ng|fp)$".to_string()),
                ..ClusterKnobs::default()
            },
            ..Self::default()
        }
    }

    fn shaws() -> Self {
        Self {
            name: "shaws".to_string(),
            cluster: ClusterKnobs {
                min_word_conf: 25,
                anchor_conf: 35,
                radius_px: 380.0,
                min_words_per_offer: 3,
                max_offers_per_page: 400,
                ignore_pattern: Some("(?i)^(u|club|app|qr)$".to_string()),
            },
            ..Self::default()
        }
    }

    fn aldi() -> Self {
        Self {
            name: "aldi".to_string(),
            fallback: FallbackKnobs { enabled: true, ..FallbackKnobs::default() },
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profiles: HashMap<String, StoreProfile>,
}

/// Store profiles by lower-case key.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<String, Arc<StoreProfile>>,
}

impl ProfileRegistry {
    pub fn builtin() -> Self {
        let mut registry = Self { profiles: HashMap::new() };
        for profile in [
            StoreProfile::default(),
            StoreProfile::wegmans(),
            StoreProfile::shaws(),
            StoreProfile::aldi(),
        ] {
            match profile.compile() {
                Ok(profile) => {
                    registry.profiles.insert(profile.name.clone(), Arc::new(profile));
                }
                Err(err) => warn!(%err, "skipping built-in profile"),
            }
        }
        registry
    }

    /// Built-ins overlaid with `[profiles.<key>]` tables from TOML. Missing
    /// fields take the generic defaults, not the built-in store's values.
    pub fn from_toml(toml_content: &str) -> Result<Self, ProfileError> {
        let file: ProfileFile = toml::from_str(toml_content)?;
        let mut registry = Self::builtin();
        for (key, mut profile) in file.profiles {
            let key = key.trim().to_lowercase();
            profile.name = key.clone();
            let profile = profile.compile()?;
            registry.profiles.insert(key, Arc::new(profile));
        }
        Ok(registry)
    }

    pub fn from_path(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Profile for `key`, or the default profile for unknown stores.
    pub fn get(&self, key: &str) -> Arc<StoreProfile> {
        self.require(key)
            .or_else(|_| self.require(DEFAULT_PROFILE))
            .unwrap_or_else(|_| Arc::new(StoreProfile::default()))
    }

    pub fn require(&self, key: &str) -> Result<Arc<StoreProfile>, ProfileError> {
        self.profiles
            .get(&key.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| ProfileError::Unknown(key.to_string()))
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
