// Data-driven checker configuration.
//
// The rule engine reads its tunable limits from `CheckerConfig` instead of
// hard-coding them: voice ranges, spacing limits, and how many melody notes
// each species allows per bass note. Defaults are the textbook values; a
// JSON file may override any subset of fields.
//
// See also: `rules.rs`, the only consumer.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Inclusive MIDI ranges for the four choral roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceRanges {
    pub soprano: (u8, u8),
    pub alto: (u8, u8),
    pub tenor: (u8, u8),
    pub bass: (u8, u8),
}

impl Default for VoiceRanges {
    fn default() -> Self {
        VoiceRanges {
            soprano: (60, 79), // C4-G5
            alto: (55, 74),    // G3-D5
            tenor: (48, 67),   // C3-G4
            bass: (40, 62),    // E2-D4
        }
    }
}

impl VoiceRanges {
    /// Range for a layout position counted from the bass (0) up.
    pub fn for_position(&self, index: usize) -> (u8, u8) {
        match index {
            0 => self.bass,
            1 => self.tenor,
            2 => self.alto,
            _ => self.soprano,
        }
    }
}

/// Melody attacks allowed between one harmonic onset and the next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesPerOnset {
    pub species2: usize,
    pub species3: usize,
    pub species4: usize,
}

impl Default for NotesPerOnset {
    fn default() -> Self {
        NotesPerOnset {
            species2: 2,
            species3: 4,
            species4: 2,
        }
    }
}

/// Top-level checker configuration. Loaded from JSON, never mutated during a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub ranges: VoiceRanges,

    /// Largest allowed distance in semitones between adjacent upper voices
    /// (soprano/alto, alto/tenor).
    pub upper_spacing_limit: u8,

    /// Largest allowed distance between tenor and bass: an octave plus a fifth.
    pub tenor_bass_spacing_limit: u8,

    pub melody_notes_per_onset: NotesPerOnset,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            ranges: VoiceRanges::default(),
            upper_spacing_limit: 12,
            tenor_bass_spacing_limit: 19,
            melody_notes_per_onset: NotesPerOnset::default(),
        }
    }
}

impl CheckerConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}
