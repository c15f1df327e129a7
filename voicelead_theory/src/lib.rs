// Voice-leading theory primitives.
//
// The spelling-aware half of the voice-leading checker: everything that can
// be said about harmony without knowing about notes, voices, or time.
//
// Architecture:
// - pitch.rs: Tonal pitch classes (line of fifths), perfect-interval,
//   step/leap, and melodic-quality classification
// - chord.rs: Roman-numeral label parsing and chord template resolution,
//   including secondary functions, augmented sixths, Neapolitan, and Cad
// - key.rs: Global tonic/mode inference from key signature and labels
//
// All functions are total: malformed labels resolve to an empty harmonic
// context instead of an error.

pub mod chord;
pub mod key;
pub mod pitch;

pub use chord::{HarmonicContext, HarmonicLabel, resolve};
pub use key::{Key, LabelObservation, Mode, infer_key};
pub use pitch::Tpc;
