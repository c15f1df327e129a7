// Key and mode inference.
//
// The checker needs one global tonic and mode for the analyzed span. Three
// stages, first success wins:
//
// 1. Key signature. `14 + signature` is the major-key tonic (sharps positive,
//    flats negative). Absent a signature, C major. This is the default
//    hypothesis; the relative minor is three fifths up.
// 2. First root-position, non-secondary V or V7. Its lowest note is the
//    chord root, so the implied tonic sits one fifth below. If that matches
//    the major or the relative-minor hypothesis, it decides.
// 3. Otherwise, tally Roman numerals: major-typical chords vote +1,
//    minor-typical ones -1. The sign picks the mode; a zero total keeps the
//    major hypothesis.
//
// The whole span is assumed to be in one key. Modulating passages are
// analyzed against whichever key these stages settle on.

use crate::chord::HarmonicLabel;
use crate::pitch::Tpc;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

/// The global key of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub tonic: Tpc,
    pub mode: Mode,
}

impl Key {
    pub fn new(tonic: Tpc, mode: Mode) -> Self {
        Key { tonic, mode }
    }

    /// Major-key tonic for a signature (-7..=7, flats negative).
    pub fn major_from_signature(signature: i32) -> Tpc {
        Tpc::C.offset(signature)
    }

    /// C major -> A minor: three fifths up.
    pub fn relative_minor_tonic(major_tonic: Tpc) -> Tpc {
        major_tonic.offset(3)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Major => "major",
            Mode::Minor => "minor",
        };
        write!(f, "{} {}", self.tonic, mode)
    }
}

/// One harmonic label as it appears in the piece, with the TPC of the
/// lowest sounding note at that point.
#[derive(Debug, Clone, Copy)]
pub struct LabelObservation<'a> {
    pub label: &'a str,
    pub bass: Option<Tpc>,
}

/// Infer the key from labels in time order and an optional signature.
pub fn infer_key<'a, I>(observations: I, key_signature: Option<i32>) -> Key
where
    I: IntoIterator<Item = LabelObservation<'a>>,
{
    let major = key_signature.map_or(Tpc::C, Key::major_from_signature);
    let minor = Key::relative_minor_tonic(major);
    let observations: Vec<LabelObservation<'a>> = observations.into_iter().collect();

    if let Some(key) = key_from_first_dominant(&observations, major, minor) {
        debug!(%key, "key confirmed by root-position dominant");
        return key;
    }

    let score: i32 = observations.iter().map(|obs| mode_vote(obs.label)).sum();
    let key = if score < 0 {
        Key::new(minor, Mode::Minor)
    } else {
        Key::new(major, Mode::Major)
    };
    debug!(%key, score, "key from Roman numeral tally");
    key
}

fn key_from_first_dominant(
    observations: &[LabelObservation<'_>],
    major: Tpc,
    minor: Tpc,
) -> Option<Key> {
    for obs in observations {
        let label = obs.label.trim();
        if label != "V" && label != "V7" {
            continue;
        }
        let Some(bass) = obs.bass else {
            continue;
        };
        let implied = bass.offset(-1);
        if implied == major {
            return Some(Key::new(major, Mode::Major));
        }
        if implied == minor {
            return Some(Key::new(minor, Mode::Minor));
        }
    }
    None
}

fn mode_vote(label: &str) -> i32 {
    let Some(parsed) = HarmonicLabel::parse(label) else {
        return 0;
    };
    match parsed.base.as_str() {
        "I" | "ii" | "iii" | "IV" | "vi" => 1,
        "i" | "iio" | "ii0" | "III" | "iv" | "VI" => -1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(label: &str, bass: i32) -> LabelObservation<'_> {
        LabelObservation {
            label,
            bass: Some(Tpc(bass)),
        }
    }

    #[test]
    fn test_signature_gives_major_hypothesis() {
        assert_eq!(Key::major_from_signature(0), Tpc(14));
        assert_eq!(Key::major_from_signature(-3), Tpc(11)); // Eb
        assert_eq!(Key::relative_minor_tonic(Tpc(14)), Tpc(17)); // A
    }

    #[test]
    fn test_dominant_confirms_major() {
        let key = infer_key([obs("I", 14), obs("V7", 15), obs("I", 14)], Some(0));
        assert_eq!(key, Key::new(Tpc(14), Mode::Major));
    }

    #[test]
    fn test_dominant_confirms_relative_minor() {
        // V7 over E (18) implies A minor.
        let key = infer_key([obs("i", 17), obs("V7", 18)], Some(0));
        assert_eq!(key, Key::new(Tpc(17), Mode::Minor));
    }

    #[test]
    fn test_dominant_without_signature_uses_c_hypotheses() {
        // No signature: C major / A minor. V over E implies A.
        let key = infer_key([obs("V", 18)], None);
        assert_eq!(key, Key::new(Tpc(17), Mode::Minor));
        // V over A implies D, which is neither hypothesis.
        let key = infer_key([obs("V", 17)], None);
        assert_eq!(key, Key::new(Tpc(14), Mode::Major));
    }

    #[test]
    fn test_secondary_and_inverted_dominants_are_ignored() {
        // V/V and V6 do not count; the tally of I/IV decides instead.
        let key = infer_key([obs("V/V", 16), obs("V6", 19), obs("I", 14), obs("IV", 13)], Some(0));
        assert_eq!(key, Key::new(Tpc(14), Mode::Major));
    }

    #[test]
    fn test_first_matching_dominant_wins() {
        // First V implies neither key, second V confirms minor.
        let key = infer_key([obs("V", 20), obs("V", 18), obs("V", 15)], Some(0));
        assert_eq!(key, Key::new(Tpc(17), Mode::Minor));
    }

    #[test]
    fn test_tally_picks_minor() {
        let key = infer_key([obs("i", 17), obs("iv", 16), obs("iiø7", 19), obs("I", 14)], Some(0));
        assert_eq!(key, Key::new(Tpc(17), Mode::Minor));
    }

    #[test]
    fn test_tie_defaults_to_major() {
        let key = infer_key([obs("I", 14), obs("i", 17)], Some(2));
        assert_eq!(key, Key::new(Tpc(16), Mode::Major));
        let empty: [LabelObservation<'_>; 0] = [];
        assert_eq!(infer_key(empty, None), Key::new(Tpc::C, Mode::Major));
    }

    #[test]
    fn test_dominant_without_bass_is_skipped() {
        let no_bass = LabelObservation { label: "V", bass: None };
        let key = infer_key([no_bass, obs("vi", 17), obs("ii", 16)], Some(0));
        assert_eq!(key, Key::new(Tpc(14), Mode::Major));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(Key::new(Tpc(12), Mode::Major).to_string(), "Bb major");
        assert_eq!(Key::new(Tpc(17), Mode::Minor).to_string(), "A minor");
    }

    #[test]
    fn test_key_json_shape() {
        let json = serde_json::to_string(&Key::new(Tpc(17), Mode::Minor)).unwrap();
        assert_eq!(json, r#"{"tonic":17,"mode":"minor"}"#);
    }
}
