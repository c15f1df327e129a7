// Pitch-class arithmetic on two coordinates.
//
// Every note carries an absolute chromatic pitch (MIDI number) and a tonal
// pitch class (TPC): a position on the line of fifths where each spelling is
// distinct, so C# and Db are different values even though they sound the
// same. TPC 14 is C; each step up is a perfect fifth of spelling (G = 15,
// D = 16, ...), each step down a fifth the other way (F = 13, Bb = 12, ...).
//
// Interval classification here never derives spelling from pitch. Perfect
// intervals need both coordinates; steps and leaps are judged in TPC space,
// with semitones used only to tell a half step from a whole step or a fourth
// from a sixth.
//
// Used by chord.rs (templates are TPC offsets), key.rs, and the whole rule
// engine in voicelead_check.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tonal pitch class: spelling-sensitive position on the line of fifths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tpc(pub i32);

impl Tpc {
    pub const C: Tpc = Tpc(14);
    /// Fbb, the lowest spelling a note may carry.
    pub const MIN: Tpc = Tpc(-1);
    /// Bx, the highest.
    pub const MAX: Tpc = Tpc(33);

    /// Within double flats and double sharps. Interval arithmetic assumes
    /// notes stay in this range.
    pub fn is_spelled(self) -> bool {
        (Tpc::MIN.0..=Tpc::MAX.0).contains(&self.0)
    }

    /// Move `fifths` positions along the line of fifths.
    pub fn offset(self, fifths: i32) -> Tpc {
        Tpc(self.0 + fifths)
    }

    /// Signed TPC distance from `self` to `other`.
    pub fn distance_to(self, other: Tpc) -> i32 {
        other.0 - self.0
    }

    /// Letter name ignoring accidentals.
    pub fn letter(self) -> char {
        const LETTERS: [char; 7] = ['C', 'G', 'D', 'A', 'E', 'B', 'F'];
        LETTERS[(self.0 - 14).rem_euclid(7) as usize]
    }

    /// Number of sharps (positive) or flats (negative) in the spelling.
    /// The naturals are F (13) through B (19).
    pub fn accidentals(self) -> i32 {
        (self.0 - 13).div_euclid(7)
    }

    /// Spelled name, e.g. "F#", "Bb", "Cx", "Ebb".
    pub fn name(self) -> String {
        let mut name = self.letter().to_string();
        match self.accidentals() {
            0 => {}
            2 => name.push('x'),
            n if n > 0 => name.push_str(&"#".repeat(n as usize)),
            n => name.push_str(&"b".repeat(n.unsigned_abs() as usize)),
        }
        name
    }
}

impl fmt::Display for Tpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// The two perfect intervals the parallel/direct rules care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Perfect {
    Fifth,
    Octave,
}

impl fmt::Display for Perfect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Perfect::Fifth => f.write_str("P5"),
            Perfect::Octave => f.write_str("P8"),
        }
    }
}

/// Classify the vertical interval between two notes as a perfect fifth or
/// octave (compound intervals and unisons included). Spelling decides: a
/// diminished sixth that happens to span seven semitones is not a fifth.
pub fn perfect_interval(lower: (u8, Tpc), upper: (u8, Tpc)) -> Option<Perfect> {
    let tpc_dist = lower.1.distance_to(upper.1);
    let semitones = (upper.0 as i16 - lower.0 as i16).unsigned_abs() % 12;
    if tpc_dist == 0 && semitones == 0 {
        Some(Perfect::Octave)
    } else if tpc_dist.abs() == 1 && semitones == 7 {
        Some(Perfect::Fifth)
    } else {
        None
    }
}

/// Major second (2) or minor second (5) in TPC space.
pub fn is_step(tpc_dist: i32) -> bool {
    matches!(tpc_dist.abs(), 2 | 5)
}

/// A step that spans exactly one semitone.
pub fn is_half_step(tpc_dist: i32, semitones: i16) -> bool {
    is_step(tpc_dist) && semitones.abs() == 1
}

/// Anything wider than a second (or an augmented unison) in TPC space.
pub fn is_leap(tpc_dist: i32) -> bool {
    tpc_dist.abs() >= 3
}

/// A melodic third, or a perfect fourth. Sixths share the TPC distance of
/// thirds, so the semitone span separates them.
pub fn is_third_or_fourth(tpc_dist: i32, semitones: i16) -> bool {
    let span = semitones.abs();
    match tpc_dist.abs() {
        3 | 4 => matches!(span, 3 | 4),
        1 => span == 5,
        _ => false,
    }
}

/// Augmented or diminished melodic intervals, judged by spelling alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MelodicQuality {
    Augmented,
    Diminished,
}

impl MelodicQuality {
    /// TPC distances of six or more fifths are augmented (upward in the line)
    /// or diminished (downward).
    pub fn from_tpc_distance(tpc_dist: i32) -> Option<MelodicQuality> {
        if tpc_dist >= 6 {
            Some(MelodicQuality::Augmented)
        } else if tpc_dist <= -6 {
            Some(MelodicQuality::Diminished)
        } else {
            None
        }
    }
}

impl fmt::Display for MelodicQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MelodicQuality::Augmented => f.write_str("Aug."),
            MelodicQuality::Diminished => f.write_str("Dim."),
        }
    }
}
