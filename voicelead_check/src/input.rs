// JSON score files.
//
// A score file is the score model plus an optional policy:
//
//   {
//     "key_signature": -1,
//     "layout": { "voices": ["bass", "tenor", "alto", "soprano"], "texture": "choral" },
//     "policy": "homophonic",
//     "time_points": [
//       { "tick": 0, "label": "I", "notes": [{ "voice": "bass", "pitch": 48, "tpc": 14 }] }
//     ]
//   }
//
// Note flags (`tie_back`, `tie_forward`, `held`) default to false. The file
// is validated through `Score::new`, so a loaded score is always well formed.

use crate::nct::NctPolicy;
use crate::score::{Score, ScoreError, TimePoint, VoiceLayout};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read score {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid score JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid score: {0}")]
    Score(#[from] ScoreError),
}

#[derive(Debug, Deserialize)]
struct ScoreFile {
    #[serde(default)]
    key_signature: Option<i32>,
    layout: VoiceLayout,
    #[serde(default)]
    policy: Option<NctPolicy>,
    time_points: Vec<TimePoint>,
}

/// Parse a score file's contents. Returns the score and the policy it asks
/// for, if any.
pub fn parse_score(json: &str) -> Result<(Score, Option<NctPolicy>), InputError> {
    let file: ScoreFile = serde_json::from_str(json)?;
    debug!(
        points = file.time_points.len(),
        voices = file.layout.len(),
        policy = ?file.policy,
        "parsed score file"
    );
    let score = Score::new(file.layout, file.time_points, file.key_signature)?;
    Ok((score, file.policy))
}

pub fn load_score(path: &Path) -> Result<(Score, Option<NctPolicy>), InputError> {
    let json = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_score(&json)
}
