// Non-chord-tone classification for species counterpoint.
//
// A melody note that is not a member of the harmony in effect must be
// explained by one of the figures its policy permits, or it is an illegal
// dissonance. Classification looks only at the note itself, its immediate
// neighbors in the same voice, and whether it falls on a harmonic onset
// (a new bass note or a label change).
//
// - Homophonic (four-part writing, species 1): no embellishments at all.
// - Species 2: unaccented passing tones.
// - Species 3: unaccented passing and neighbor tones, plus the two
//   four-note figures (double neighbor, nota cambiata) found by
//   `find_figures`, which certify notes the single-note rules reject.
// - Species 4: on the onset, suspensions, retardations, accented passing
//   and neighbor tones, appoggiaturas; off the onset, the species-3 shapes
//   or, for leaps, a leap-to-dissonance error.
//
// Species 2/3 measure steps in semitones (at most two), with one exception
// for the augmented second of the minor mode: three semitones and one, in
// the same direction. Species 4 measures steps in TPC space.

use serde::{Deserialize, Serialize};
use voicelead_theory::pitch::{is_half_step, is_leap, is_step, is_third_or_fourth};
use voicelead_theory::{HarmonicContext, Tpc};

/// Which embellishments a run accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NctPolicy {
    #[default]
    Homophonic,
    Species2,
    Species3,
    Species4,
}

/// The adjacent note on one side of the note being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub pitch: u8,
    pub tpc: Tpc,
    /// Member of the harmony in effect at the neighbor's own point.
    pub is_chord_tone: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NctInput {
    pub pitch: u8,
    pub tpc: Tpc,
    pub is_chord_tone: bool,
    pub on_onset: bool,
    pub tie_back: bool,
    pub tie_forward: bool,
    pub prev: Option<Neighbor>,
    pub next: Option<Neighbor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FigureKind {
    DoubleNeighbor,
    Cambiata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// No permitted figure explains the note.
    Unsupported,
    /// Species 4, off the onset: approached or left by leap.
    LeapToDissonance,
    /// Species 4, off the onset: a dissonance tied into the next bar.
    TiedOffBeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NctKind {
    ChordTone,
    Passing,
    Neighbor,
    AccentedPassing,
    AccentedNeighbor,
    Suspension,
    Retardation,
    Appoggiatura,
    Figure(FigureKind),
    Invalid(InvalidReason),
}

impl NctKind {
    pub fn is_valid(self) -> bool {
        !matches!(self, NctKind::Invalid(_))
    }

    /// A non-chord tone the policy accepts.
    pub fn is_embellishment(self) -> bool {
        self.is_valid() && self != NctKind::ChordTone
    }
}

/// Classify one note under `policy`.
pub fn classify(policy: NctPolicy, input: &NctInput) -> NctKind {
    if input.is_chord_tone {
        return NctKind::ChordTone;
    }
    match policy {
        NctPolicy::Homophonic => NctKind::Invalid(InvalidReason::Unsupported),
        NctPolicy::Species2 if input.on_onset => NctKind::Invalid(InvalidReason::Unsupported),
        NctPolicy::Species2 => unaccented(input, false),
        NctPolicy::Species3 if input.on_onset => NctKind::Invalid(InvalidReason::Unsupported),
        NctPolicy::Species3 => unaccented(input, true),
        NctPolicy::Species4 if input.on_onset => accented(input),
        NctPolicy::Species4 => syncopated_off_beat(input),
    }
}

/// Signed semitone motion from `a` to `b`.
fn motion(a: u8, b: u8) -> i16 {
    b as i16 - a as i16
}

// Species 2/3 passing and neighbor shapes, in semitones.
fn unaccented(input: &NctInput, allow_neighbor: bool) -> NctKind {
    let (Some(prev), Some(next)) = (input.prev, input.next) else {
        return NctKind::Invalid(InvalidReason::Unsupported);
    };
    let into = motion(prev.pitch, input.pitch);
    let out = motion(input.pitch, next.pitch);
    let small = into.abs() <= 2 && out.abs() <= 2;

    if small && into * out > 0 {
        return NctKind::Passing;
    }
    // Minor-mode sixth and seventh, e.g. F-G#-A: three semitones then one.
    let spans = (into.abs(), out.abs());
    if into * out > 0 && (spans == (3, 1) || spans == (1, 3)) {
        return NctKind::Passing;
    }
    if allow_neighbor
        && small
        && into * out < 0
        && prev.pitch == next.pitch
        && prev.tpc == next.tpc
    {
        return NctKind::Neighbor;
    }
    NctKind::Invalid(InvalidReason::Unsupported)
}

// Species 4 dissonance on the onset.
fn accented(input: &NctInput) -> NctKind {
    let (Some(prev), Some(next)) = (input.prev, input.next) else {
        return NctKind::Invalid(InvalidReason::Unsupported);
    };
    let tpc_in = prev.tpc.distance_to(input.tpc);
    let tpc_out = input.tpc.distance_to(next.tpc);
    let into = motion(prev.pitch, input.pitch);
    let out = motion(input.pitch, next.pitch);

    if input.tie_back && prev.is_chord_tone && next.is_chord_tone {
        if is_step(tpc_out) && out < 0 {
            return NctKind::Suspension;
        }
        if is_half_step(tpc_out, out) && out > 0 {
            return NctKind::Retardation;
        }
    }
    if is_step(tpc_in) && is_step(tpc_out) {
        if into * out > 0 {
            return NctKind::AccentedPassing;
        }
        if into * out < 0 && prev.pitch == next.pitch && prev.tpc == next.tpc {
            return NctKind::AccentedNeighbor;
        }
    }
    if is_leap(tpc_in) {
        let down_by_step = is_step(tpc_out) && out < 0;
        let up_by_half_step = is_half_step(tpc_out, out) && out > 0;
        if (into > 0 && down_by_step) || (into < 0 && up_by_half_step) {
            return NctKind::Appoggiatura;
        }
    }
    NctKind::Invalid(InvalidReason::Unsupported)
}

// Species 4 dissonance between onsets.
fn syncopated_off_beat(input: &NctInput) -> NctKind {
    if input.tie_forward {
        return NctKind::Invalid(InvalidReason::TiedOffBeat);
    }
    let (Some(prev), Some(next)) = (input.prev, input.next) else {
        return NctKind::Invalid(InvalidReason::Unsupported);
    };
    let into = motion(prev.pitch, input.pitch);
    let out = motion(input.pitch, next.pitch);
    let stepwise_in = is_step(prev.tpc.distance_to(input.tpc)) && into.abs() <= 2;
    let stepwise_out = is_step(input.tpc.distance_to(next.tpc)) && out.abs() <= 2;
    if !stepwise_in || !stepwise_out {
        return NctKind::Invalid(InvalidReason::LeapToDissonance);
    }
    if into * out > 0 {
        NctKind::Passing
    } else if into * out < 0 && prev.pitch == next.pitch && prev.tpc == next.tpc {
        NctKind::Neighbor
    } else {
        NctKind::Invalid(InvalidReason::Unsupported)
    }
}

/// A melody note as the figure matcher sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MelodicNote {
    pub pitch: u8,
    pub tpc: Tpc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FigureMatch {
    pub kind: FigureKind,
    /// Index of the figure's first note in the melody passed to `find_figures`.
    pub start: usize,
}

impl FigureMatch {
    /// Indices of the two interior notes the figure certifies.
    pub fn certified(&self) -> [usize; 2] {
        [self.start + 1, self.start + 2]
    }
}

/// Match a four-note window against the species-3 figures.
pub fn match_figure(
    window: [MelodicNote; 4],
    onsets: [bool; 4],
    start_harmony: &HarmonicContext,
) -> Option<FigureKind> {
    if !onsets[0] {
        return None;
    }
    let tpc = |i: usize| window[i].tpc.distance_to(window[i + 1].tpc);
    let semis = |i: usize| motion(window[i].pitch, window[i + 1].pitch);

    let returns_home = window[3] == window[0];
    if onsets[3]
        && !onsets[1]
        && !onsets[2]
        && is_step(tpc(0))
        && is_third_or_fourth(tpc(1), semis(1))
        && is_step(tpc(2))
        && semis(0) * semis(1) < 0
        && returns_home
    {
        return Some(FigureKind::DoubleNeighbor);
    }

    if is_step(tpc(0))
        && semis(0) < 0
        && is_third_or_fourth(tpc(1), semis(1))
        && semis(1) < 0
        && start_harmony.contains(window[2].tpc)
        && is_step(tpc(2))
        && semis(2) > 0
    {
        return Some(FigureKind::Cambiata);
    }
    None
}

/// Scan one voice's melody for species-3 figures.
///
/// `melody[i]` is the voice's attacked note at point `i` (`None` for a rest
/// or a held note); `onsets` and `harmony` are indexed the same way.
/// Windows that overlap a rest never match.
pub fn find_figures(
    melody: &[Option<MelodicNote>],
    onsets: &[bool],
    harmony: &[HarmonicContext],
) -> Vec<FigureMatch> {
    let mut found = Vec::new();
    for start in 0..melody.len().saturating_sub(3) {
        let notes = &melody[start..start + 4];
        let [Some(a), Some(b), Some(c), Some(d)] = [notes[0], notes[1], notes[2], notes[3]] else {
            continue;
        };
        let flags = [onsets[start], onsets[start + 1], onsets[start + 2], onsets[start + 3]];
        if let Some(kind) = match_figure([a, b, c, d], flags, &harmony[start]) {
            found.push(FigureMatch { kind, start });
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSUPPORTED: NctKind = NctKind::Invalid(InvalidReason::Unsupported);

    fn n(pitch: u8, tpc: i32, is_chord_tone: bool) -> Neighbor {
        Neighbor {
            pitch,
            tpc: Tpc(tpc),
            is_chord_tone,
        }
    }

    fn dissonance(pitch: u8, tpc: i32, on_onset: bool, prev: Neighbor, next: Neighbor) -> NctInput {
        NctInput {
            pitch,
            tpc: Tpc(tpc),
            is_chord_tone: false,
            on_onset,
            tie_back: false,
            tie_forward: false,
            prev: Some(prev),
            next: Some(next),
        }
    }

    fn m(pitch: u8, tpc: i32) -> MelodicNote {
        MelodicNote { pitch, tpc: Tpc(tpc) }
    }

    #[test]
    fn test_chord_tones_always_pass() {
        let mut input = dissonance(60, 14, true, n(72, 14, true), n(40, 14, true));
        input.is_chord_tone = true;
        for policy in [
            NctPolicy::Homophonic,
            NctPolicy::Species2,
            NctPolicy::Species3,
            NctPolicy::Species4,
        ] {
            assert_eq!(classify(policy, &input), NctKind::ChordTone);
        }
    }

    #[test]
    fn test_homophonic_rejects_every_dissonance() {
        let input = dissonance(62, 16, false, n(60, 14, true), n(64, 18, true));
        assert_eq!(classify(NctPolicy::Homophonic, &input), UNSUPPORTED);
    }

    #[test]
    fn test_species2_passing_tone() {
        // C-D-E over C major, D off the onset.
        let input = dissonance(62, 16, false, n(60, 14, true), n(64, 18, true));
        assert_eq!(classify(NctPolicy::Species2, &input), NctKind::Passing);
        // The same shape on the onset is not allowed.
        let accented = NctInput { on_onset: true, ..input };
        assert_eq!(classify(NctPolicy::Species2, &accented), UNSUPPORTED);
    }

    #[test]
    fn test_species2_rejects_neighbor_species3_accepts() {
        // E-F-E.
        let input = dissonance(65, 13, false, n(64, 18, true), n(64, 18, true));
        assert_eq!(classify(NctPolicy::Species2, &input), UNSUPPORTED);
        assert_eq!(classify(NctPolicy::Species3, &input), NctKind::Neighbor);
    }

    #[test]
    fn test_melodic_minor_exception() {
        // F-G#-A in A minor: an augmented second up then a half step up.
        let input = dissonance(68, 22, false, n(65, 13, true), n(69, 17, true));
        assert_eq!(classify(NctPolicy::Species2, &input), NctKind::Passing);
        // A major third then a half step does not qualify.
        let wide = dissonance(68, 22, false, n(64, 18, true), n(69, 17, true));
        assert!(!classify(NctPolicy::Species2, &wide).is_valid());
    }

    #[test]
    fn test_species3_neighbor_must_return_to_same_spelling() {
        // F#-G-Gb: same direction change, different spelling.
        let input = dissonance(67, 15, false, n(66, 20, true), n(66, 8, true));
        assert!(!classify(NctPolicy::Species3, &input).is_valid());
    }

    #[test]
    fn test_missing_neighbor_is_invalid() {
        let mut input = dissonance(62, 16, false, n(60, 14, true), n(64, 18, true));
        input.next = None;
        assert_eq!(classify(NctPolicy::Species2, &input), UNSUPPORTED);
        assert_eq!(classify(NctPolicy::Species4, &input), UNSUPPORTED);
    }

    #[test]
    fn test_species4_suspension() {
        // F tied over from a chord tone, resolving down by step to E.
        let mut input = dissonance(65, 13, true, n(65, 13, true), n(64, 18, true));
        input.tie_back = true;
        assert_eq!(classify(NctPolicy::Species4, &input), NctKind::Suspension);
        // Unprepared: the previous note was itself dissonant.
        input.prev = Some(n(65, 13, false));
        assert_eq!(classify(NctPolicy::Species4, &input), UNSUPPORTED);
    }

    #[test]
    fn test_species4_retardation() {
        // B tied over, resolving up a half step to C.
        let mut input = dissonance(71, 19, true, n(71, 19, true), n(72, 14, true));
        input.tie_back = true;
        assert_eq!(classify(NctPolicy::Species4, &input), NctKind::Retardation);
        // Up a whole step is not a retardation.
        input.next = Some(n(73, 21, true));
        assert!(!classify(NctPolicy::Species4, &input).is_valid());
    }

    #[test]
    fn test_species4_accented_passing_and_neighbor() {
        let passing = dissonance(62, 16, true, n(60, 14, true), n(64, 18, true));
        assert_eq!(classify(NctPolicy::Species4, &passing), NctKind::AccentedPassing);
        let neighbor = dissonance(62, 16, true, n(64, 18, true), n(64, 18, true));
        assert_eq!(classify(NctPolicy::Species4, &neighbor), NctKind::AccentedNeighbor);
    }

    #[test]
    fn test_species4_appoggiatura() {
        // Leap up C-A, resolve down a step to G.
        let up = dissonance(69, 17, true, n(60, 14, true), n(67, 15, true));
        assert_eq!(classify(NctPolicy::Species4, &up), NctKind::Appoggiatura);
        // Leap down G-B, resolve up a half step to C.
        let down = dissonance(59, 19, true, n(67, 15, true), n(60, 14, true));
        assert_eq!(classify(NctPolicy::Species4, &down), NctKind::Appoggiatura);
        // Leap down, resolve up a whole step: invalid.
        let bad = dissonance(62, 16, true, n(67, 15, true), n(64, 18, true));
        assert!(!classify(NctPolicy::Species4, &bad).is_valid());
    }

    #[test]
    fn test_species4_off_beat_rules() {
        let mut tied = dissonance(62, 16, false, n(60, 14, true), n(64, 18, true));
        tied.tie_forward = true;
        assert_eq!(
            classify(NctPolicy::Species4, &tied),
            NctKind::Invalid(InvalidReason::TiedOffBeat)
        );

        let leap_in = dissonance(65, 13, false, n(60, 14, true), n(64, 18, true));
        assert_eq!(
            classify(NctPolicy::Species4, &leap_in),
            NctKind::Invalid(InvalidReason::LeapToDissonance)
        );

        let passing = dissonance(62, 16, false, n(60, 14, true), n(64, 18, true));
        assert_eq!(classify(NctPolicy::Species4, &passing), NctKind::Passing);
    }

    #[test]
    fn test_double_neighbor_figure() {
        // C-D-B-C with onsets on both Cs.
        let window = [m(72, 14), m(74, 16), m(71, 19), m(72, 14)];
        let harmony = HarmonicContext::empty();
        assert_eq!(
            match_figure(window, [true, false, false, true], &harmony),
            Some(FigureKind::DoubleNeighbor)
        );
        // Interior note on an onset: not anchored.
        assert_eq!(match_figure(window, [true, true, false, true], &harmony), None);
    }

    #[test]
    fn test_cambiata_needs_chord_tone_landing() {
        // D-C-A-B over A minor: the A lands on the harmony's root.
        let window = [m(74, 16), m(72, 14), m(69, 17), m(71, 19)];
        let a_minor = voicelead_theory::resolve("i", Tpc(17), voicelead_theory::Mode::Minor);
        assert_eq!(
            match_figure(window, [true, false, false, false], &a_minor),
            Some(FigureKind::Cambiata)
        );
        let g_major = voicelead_theory::resolve("V", Tpc(14), voicelead_theory::Mode::Major);
        assert_eq!(match_figure(window, [true, false, false, false], &g_major), None);
    }

    #[test]
    fn test_find_figures_skips_rests() {
        let melody = [
            Some(m(72, 14)),
            Some(m(74, 16)),
            Some(m(71, 19)),
            Some(m(72, 14)),
            None,
            Some(m(74, 16)),
        ];
        let onsets = [true, false, false, true, false, false];
        let harmony = vec![HarmonicContext::empty(); 6];
        let found = find_figures(&melody, &onsets, &harmony);
        assert_eq!(found, vec![FigureMatch { kind: FigureKind::DoubleNeighbor, start: 0 }]);
        assert_eq!(found[0].certified(), [1, 2]);
    }
}
