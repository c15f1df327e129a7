// Voice-leading checker.
//
// Reads a score of spelled, harmonically labeled notes and reports
// part-writing and species-counterpoint errors, each anchored to a time
// point and the notes it concerns.
//
// Architecture:
// - score.rs: Score model (time points, notes, voice layout) and the dense
//   point x voice table the rules query
// - config.rs: Tunable limits (voice ranges, spacing, notes per onset), JSON
//   loadable
// - diagnostic.rs: Diagnostics, categories, and the note annotation table
// - nct.rs: Non-chord-tone classification per species policy, plus the
//   species-3 figure matcher (double neighbor, cambiata)
// - engine.rs: One analysis pass: onsets, key inference, harmony per point,
//   then the rule catalog in order
// - rules.rs: The rule catalog itself
// - input.rs: JSON score files
//
// Harmony and spelling arithmetic live in `voicelead_theory`.

pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod input;
pub mod nct;
mod rules;
pub mod score;

pub use config::CheckerConfig;
pub use diagnostic::{Category, Diagnostic, Report};
pub use engine::analyze;
pub use input::{load_score, parse_score};
pub use nct::NctPolicy;
pub use score::{Note, NoteRef, Score, Texture, TimePoint, VoiceLayout};
