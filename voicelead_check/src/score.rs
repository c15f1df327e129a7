// The score model: what the checker reads.
//
// A score is a sequence of time points in ascending tick order. Each point
// carries the harmonic label in effect at that instant and the notes
// sounding there, one per voice at most. Every note has both coordinates:
// a MIDI pitch for register and a TPC for spelling.
//
// The voice layout lists voices from lowest to highest and fixes the
// texture, which decides how crossing and the melodic rules are applied.
// Index 0 is always the bass; the last index is the top voice.
//
// `VoiceTable` is the analysis-time view: a dense point x voice table built
// once per run, so that rules can ask for a voice's previous or next attack
// without rescanning the note lists.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::warn;
use voicelead_theory::Tpc;

/// Opaque voice identifier, e.g. "soprano" or "cantus".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceId(pub String);

impl VoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        VoiceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One sounding note at a time point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub voice: VoiceId,
    /// MIDI pitch number.
    pub pitch: u8,
    pub tpc: Tpc,
    /// Tied from the previous note in this voice.
    #[serde(default)]
    pub tie_back: bool,
    /// Tied into the next note in this voice.
    #[serde(default)]
    pub tie_forward: bool,
    /// Still sounding from an earlier attack (no tie, no new attack).
    #[serde(default)]
    pub held: bool,
}

impl Note {
    pub fn new(voice: &str, pitch: u8, tpc: i32) -> Self {
        Note {
            voice: VoiceId::new(voice),
            pitch,
            tpc: Tpc(tpc),
            tie_back: false,
            tie_forward: false,
            held: false,
        }
    }

    pub fn tied_back(mut self) -> Self {
        self.tie_back = true;
        self
    }

    pub fn tied_forward(mut self) -> Self {
        self.tie_forward = true;
        self
    }

    pub fn held(mut self) -> Self {
        self.held = true;
        self
    }
}

/// A vertical slice of the score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePoint {
    pub tick: u32,
    /// Roman-numeral label in effect here, if any.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl TimePoint {
    pub fn new(tick: u32, label: Option<&str>, notes: Vec<Note>) -> Self {
        TimePoint {
            tick,
            label: label.map(str::to_string),
            notes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Texture {
    /// Three upper voices in the right hand: only tenor/bass crossing matters.
    Keyboard,
    /// SATB on two staves: only alto/tenor crossing matters.
    Choral,
    /// One staff per voice: every adjacent pair is checked.
    Open,
    /// Species counterpoint.
    Linear,
}

impl Texture {
    pub fn is_four_part(self) -> bool {
        self != Texture::Linear
    }
}

/// Voices from lowest to highest, plus the texture they are written in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceLayout {
    pub voices: Vec<VoiceId>,
    pub texture: Texture,
}

impl VoiceLayout {
    pub fn new(voices: &[&str], texture: Texture) -> Self {
        VoiceLayout {
            voices: voices.iter().map(|v| VoiceId::new(*v)).collect(),
            texture,
        }
    }

    /// Bass, tenor, alto, soprano.
    pub fn satb(texture: Texture) -> Self {
        VoiceLayout::new(&["bass", "tenor", "alto", "soprano"], texture)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn index_of(&self, voice: &VoiceId) -> Option<usize> {
        self.voices.iter().position(|v| v == voice)
    }

    /// Four voices in a four-part texture: the roles B, T, A, S apply.
    pub fn is_satb(&self) -> bool {
        self.texture.is_four_part() && self.voices.len() == 4
    }

    pub fn top(&self) -> usize {
        self.voices.len().saturating_sub(1)
    }

    /// Short name used in messages: B/T/A/S for four-part writing, the voice
    /// id otherwise.
    pub fn abbrev(&self, index: usize) -> String {
        const ROLES: [&str; 4] = ["B", "T", "A", "S"];
        if self.is_satb() {
            ROLES[index].to_string()
        } else {
            self.voices[index].to_string()
        }
    }

    /// Full role name for range messages. Only meaningful when `is_satb`.
    pub fn role_name(&self, index: usize) -> &'static str {
        const ROLES: [&str; 4] = ["Bass", "Tenor", "Alto", "Soprano"];
        ROLES[index.min(3)]
    }
}

/// A note's position: time point index and layout index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteRef {
    pub point: usize,
    pub voice: usize,
}

impl NoteRef {
    pub fn new(point: usize, voice: usize) -> Self {
        NoteRef { point, voice }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreError {
    #[error("voice layout is empty")]
    EmptyLayout,
    #[error("voice {0} appears twice in the layout")]
    DuplicateLayoutVoice(VoiceId),
    #[error("time point at tick {tick} does not come after tick {previous}")]
    OutOfOrder { tick: u32, previous: u32 },
    #[error("voice {voice} has more than one note at tick {tick}")]
    DuplicateVoice { tick: u32, voice: VoiceId },
    #[error("voice {voice} at tick {tick} has TPC {tpc}, outside Fbb (-1) to Bx (33)")]
    TpcOutOfRange { tick: u32, voice: VoiceId, tpc: i32 },
    #[error("key signature {0} is outside -7..=7")]
    KeySignatureOutOfRange(i32),
}

/// A validated score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    key_signature: Option<i32>,
    layout: VoiceLayout,
    time_points: Vec<TimePoint>,
}

impl Score {
    pub fn new(
        layout: VoiceLayout,
        time_points: Vec<TimePoint>,
        key_signature: Option<i32>,
    ) -> Result<Self, ScoreError> {
        if layout.is_empty() {
            return Err(ScoreError::EmptyLayout);
        }
        if let Some(sig) = key_signature
            && !(-7..=7).contains(&sig)
        {
            return Err(ScoreError::KeySignatureOutOfRange(sig));
        }
        let mut seen = HashSet::new();
        for voice in &layout.voices {
            if !seen.insert(voice) {
                return Err(ScoreError::DuplicateLayoutVoice(voice.clone()));
            }
        }

        for pair in time_points.windows(2) {
            if pair[1].tick <= pair[0].tick {
                return Err(ScoreError::OutOfOrder {
                    tick: pair[1].tick,
                    previous: pair[0].tick,
                });
            }
        }
        for tp in &time_points {
            let mut voices = HashSet::new();
            for note in &tp.notes {
                if !voices.insert(&note.voice) {
                    return Err(ScoreError::DuplicateVoice {
                        tick: tp.tick,
                        voice: note.voice.clone(),
                    });
                }
                if !note.tpc.is_spelled() {
                    return Err(ScoreError::TpcOutOfRange {
                        tick: tp.tick,
                        voice: note.voice.clone(),
                        tpc: note.tpc.0,
                    });
                }
            }
        }

        Ok(Score {
            key_signature,
            layout,
            time_points,
        })
    }

    pub fn key_signature(&self) -> Option<i32> {
        self.key_signature
    }

    pub fn layout(&self) -> &VoiceLayout {
        &self.layout
    }

    pub fn time_points(&self) -> &[TimePoint] {
        &self.time_points
    }

    pub fn len(&self) -> usize {
        self.time_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_points.is_empty()
    }
}

/// Dense `[point][voice]` lookup over a score.
#[derive(Debug)]
pub struct VoiceTable<'a> {
    cells: Vec<Vec<Option<&'a Note>>>,
}

impl<'a> VoiceTable<'a> {
    pub fn build(score: &'a Score) -> Self {
        let layout = score.layout();
        let cells = score
            .time_points()
            .iter()
            .map(|tp| {
                let mut row = vec![None; layout.len()];
                for note in &tp.notes {
                    match layout.index_of(&note.voice) {
                        Some(v) => row[v] = Some(note),
                        None => warn!(
                            tick = tp.tick,
                            voice = %note.voice,
                            "note for a voice outside the layout, ignored"
                        ),
                    }
                }
                row
            })
            .collect();
        VoiceTable { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn note(&self, point: usize, voice: usize) -> Option<&'a Note> {
        self.cells.get(point).and_then(|row| row.get(voice).copied().flatten())
    }

    /// Every voice's note at a point, by layout index.
    pub fn slice(&self, point: usize) -> &[Option<&'a Note>] {
        &self.cells[point]
    }

    /// The next attacked note in `voice` after `point`, skipping held
    /// continuations. A rest ends the line.
    pub fn next_attack(&self, voice: usize, point: usize) -> Option<(usize, &'a Note)> {
        for p in point + 1..self.cells.len() {
            let note = self.note(p, voice)?;
            if !note.held {
                return Some((p, note));
            }
        }
        None
    }

    /// The attack that precedes the note at `point` in `voice`.
    pub fn prev_attack(&self, voice: usize, point: usize) -> Option<(usize, &'a Note)> {
        for p in (0..point).rev() {
            let note = self.note(p, voice)?;
            if !note.held {
                return Some((p, note));
            }
        }
        None
    }
}
