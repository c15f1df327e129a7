// The voice-leading rule catalog.
//
// `check_point` runs every rule for one time point, in a fixed order that
// is also the order of the diagnostics it produces. The rules fall into
// layers:
//
// Layer 1 (species bounds, 2-4 only): first and last note, melody notes per
//   bass note.
// Layer 2 (vertical, this point only): range, spacing, crossing, unraised
//   leading tone, non-chord tones, missing members, doubled tendency tones.
// Layer 3 (melodic, this note to the voice's next attack): tendency-tone
//   resolution, repeated notes, augmented/diminished intervals, sevenths.
// Layer 4 (successive, this point to the next): overlap, cross-relation,
//   parallel and direct perfects.
//
// Rules that need harmony skip points whose context is empty. Within a
// point, voices are visited from the top down and voice pairs from the
// highest pair down, so "S-A" comes before "T-B".
//
// Called from engine.rs, which owns the per-run `Analysis` state.

use crate::diagnostic::{Category, Findings};
use crate::engine::Analysis;
use crate::nct::{InvalidReason, NctKind, NctPolicy, classify};
use crate::score::{Note, NoteRef, Texture};
use voicelead_theory::chord::{HarmonicLabel, is_dominant_function, local_tonic};
use voicelead_theory::pitch::{MelodicQuality, Perfect, perfect_interval};
use voicelead_theory::{Mode, Tpc};

pub(crate) fn check_point(a: &Analysis<'_>, t: usize, out: &mut Findings) {
    if a.is_species() {
        check_first_note(a, t, out);
        check_last_note(a, t, out);
        check_notes_per_onset(a, t, out);
    }
    if a.layout().is_satb() {
        check_ranges(a, t, out);
        check_spacing(a, t, out);
    }
    check_crossing(a, t, out);
    check_unraised_leading_tone(a, t, out);
    check_non_chord_tones(a, t, out);
    if a.layout().texture.is_four_part() {
        check_missing_members(a, t, out);
    }
    check_doubled_tendency_tones(a, t, out);
    check_tendency_resolution(a, t, out);
    if a.is_species() {
        check_repeated_notes(a, t, out);
    }
    check_melodic_quality(a, t, out);
    if a.is_linear() {
        check_seventh_leaps(a, t, out);
    }
    if t + 1 < a.len() {
        check_overlap(a, t, t + 1, out);
        check_cross_relations(a, t, t + 1, out);
    }
    if let Some(u) = a.vertical_successor(t) {
        let pairs = voice_pairs(a);
        check_parallels(a, t, u, &pairs, out);
        let direct_pairs = if a.is_linear() { outer_pair(a) } else { pairs };
        check_directs(a, t, u, &direct_pairs, out);
    }
    if a.policy == NctPolicy::Species4 && !a.onsets[t] && t + 2 < a.len() && !a.onsets[t + 2] {
        let pair = outer_pair(a);
        check_parallels(a, t, t + 2, &pair, out);
        check_directs(a, t, t + 2, &pair, out);
    }
}

fn at(point: usize, voice: usize) -> NoteRef {
    NoteRef::new(point, voice)
}

fn semitones(from: &Note, to: &Note) -> i16 {
    to.pitch as i16 - from.pitch as i16
}

/// Every (upper, lower) layout pair, highest pair first.
fn voice_pairs(a: &Analysis<'_>) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for hi in a.voices_top_down() {
        for lo in (0..hi).rev() {
            pairs.push((hi, lo));
        }
    }
    pairs
}

/// Top voice against bass.
fn outer_pair(a: &Analysis<'_>) -> Vec<(usize, usize)> {
    let top = a.layout().top();
    if top == 0 { Vec::new() } else { vec![(top, 0)] }
}

fn pair_name(a: &Analysis<'_>, hi: usize, lo: usize) -> String {
    format!("{}-{}", a.layout().abbrev(hi), a.layout().abbrev(lo))
}

// ── Layer 1: Species bounds ──

fn check_first_note(a: &Analysis<'_>, t: usize, out: &mut Findings) {
    let harmony = &a.harmony[t];
    if t != 0 || harmony.is_empty() {
        return;
    }
    for v in a.voices_top_down().filter(|&v| v != 0) {
        if let Some(note) = a.attacked(t, v)
            && !harmony.contains(note.tpc)
        {
            out.report(
                t,
                a.tick(t),
                Category::IllegalDissonance,
                "First note must\nbe chord tone",
                vec![at(t, v)],
            );
        }
    }
}

fn check_last_note(a: &Analysis<'_>, t: usize, out: &mut Findings) {
    if t + 1 != a.len() {
        return;
    }
    if !a.onsets[t] {
        let notes = a
            .voices_top_down()
            .filter(|&v| a.sounding(t, v).is_some())
            .map(|v| at(t, v))
            .collect();
        out.report(
            t,
            a.tick(t),
            Category::IllegalDissonance,
            "Last note must align\nwith bass note",
            notes,
        );
        return;
    }
    let harmony = &a.harmony[t];
    if harmony.is_empty() {
        return;
    }
    for v in a.voices_top_down().filter(|&v| v != 0) {
        if let Some(note) = a.sounding(t, v)
            && !harmony.contains(note.tpc)
        {
            out.report(
                t,
                a.tick(t),
                Category::IllegalDissonance,
                "Last note must\nbe chord tone",
                vec![at(t, v)],
            );
        }
    }
}

/// Melody attacks from this onset up to the next one.
fn check_notes_per_onset(a: &Analysis<'_>, t: usize, out: &mut Findings) {
    let limits = &a.config.melody_notes_per_onset;
    let limit = match a.policy {
        NctPolicy::Homophonic => return,
        NctPolicy::Species2 => limits.species2,
        NctPolicy::Species3 => limits.species3,
        NctPolicy::Species4 => limits.species4,
    };
    if !a.onsets[t] {
        return;
    }
    let Some(next) = a.next_onset(t) else {
        return;
    };
    for v in a.voices_top_down().filter(|&v| v != 0) {
        let attacks: Vec<NoteRef> = (t..next)
            .filter(|&p| a.attacked(p, v).is_some())
            .map(|p| at(p, v))
            .collect();
        if attacks.len() > limit {
            out.report(
                t,
                a.tick(t),
                Category::VoiceLeading,
                "Too many melody notes\nper bass note",
                attacks,
            );
        }
    }
}

// ── Layer 2: Vertical rules ──

fn check_ranges(a: &Analysis<'_>, t: usize, out: &mut Findings) {
    let layout = a.layout();
    for v in a.voices_top_down() {
        let Some(note) = a.attacked(t, v) else {
            continue;
        };
        let (low, high) = a.config.ranges.for_position(v);
        let problem = if note.pitch < low {
            "too low"
        } else if note.pitch > high {
            "too high"
        } else {
            continue;
        };
        out.report(
            t,
            a.tick(t),
            Category::Spacing,
            format!("{}\n{}", layout.role_name(v), problem),
            vec![at(t, v)],
        );
    }
}

fn check_spacing(a: &Analysis<'_>, t: usize, out: &mut Findings) {
    let upper = a.config.upper_spacing_limit as i16;
    let tenor_bass = a.config.tenor_bass_spacing_limit as i16;
    for (hi, lo, limit) in [(3, 2, upper), (2, 1, upper), (1, 0, tenor_bass)] {
        let (Some(h), Some(l)) = (a.sounding(t, hi), a.sounding(t, lo)) else {
            continue;
        };
        if semitones(l, h) <= limit {
            continue;
        }
        let limit_name = if lo == 0 { "8ve + P5" } else { "octave" };
        out.report(
            t,
            a.tick(t),
            Category::Spacing,
            format!("{} spacing\n> {}", pair_name(a, hi, lo), limit_name),
            vec![at(t, hi), at(t, lo)],
        );
    }
}

fn check_crossing(a: &Analysis<'_>, t: usize, out: &mut Findings) {
    let texture = a.layout().texture;
    for hi in a.voices_top_down().filter(|&v| v != 0) {
        let lo = hi - 1;
        let checked = match texture {
            Texture::Keyboard => lo == 0,
            Texture::Choral => lo == 1,
            Texture::Open | Texture::Linear => true,
        };
        if !checked {
            continue;
        }
        let (Some(h), Some(l)) = (a.sounding(t, hi), a.sounding(t, lo)) else {
            continue;
        };
        if l.pitch <= h.pitch {
            continue;
        }
        let message = if texture == Texture::Linear {
            "Voice Crossing".to_string()
        } else {
            format!("{}\ncrossing", pair_name(a, hi, lo))
        };
        out.report(t, a.tick(t), Category::Spacing, message, vec![at(t, hi), at(t, lo)]);
    }
}

/// The natural seventh degree under a dominant in minor.
fn check_unraised_leading_tone(a: &Analysis<'_>, t: usize, out: &mut Findings) {
    if a.key.mode != Mode::Minor {
        return;
    }
    let Some(label) = a.label(t) else {
        return;
    };
    if !is_dominant_function(label) {
        return;
    }
    let unraised = local_tonic(label, a.key.tonic, Mode::Minor).offset(-2);
    for v in a.voices_top_down() {
        if let Some(note) = a.attacked(t, v)
            && note.tpc == unraised
            && !a.harmony[t].contains(note.tpc)
        {
            out.report(
                t,
                a.tick(t),
                Category::IllegalDissonance,
                "Need to\nraise LT",
                vec![at(t, v)],
            );
        }
    }
}

fn check_non_chord_tones(a: &Analysis<'_>, t: usize, out: &mut Findings) {
    let harmony = &a.harmony[t];
    if harmony.is_empty() {
        return;
    }
    if a.policy == NctPolicy::Homophonic || !a.is_linear() {
        for v in a.voices_top_down() {
            if v == 0 && a.is_linear() {
                continue;
            }
            if let Some(note) = a.attacked(t, v)
                && !harmony.contains(note.tpc)
            {
                out.report(
                    t,
                    a.tick(t),
                    Category::IllegalDissonance,
                    format!("Non-Chord\n({})", note.tpc),
                    vec![at(t, v)],
                );
            }
        }
        return;
    }

    for v in a.voices_top_down().filter(|&v| v != 0) {
        let Some(note) = a.attacked(t, v) else {
            continue;
        };
        let here = at(t, v);
        let kind = classify(a.policy, &a.nct_input(t, v, note));
        match kind {
            NctKind::Invalid(_) if a.certified.contains(&here) => {
                out.tag(here, Category::ValidPattern)
            }
            NctKind::Invalid(InvalidReason::LeapToDissonance) => out.report(
                t,
                a.tick(t),
                Category::IllegalDissonance,
                "Leap to/from\ndissonance",
                vec![here],
            ),
            NctKind::Invalid(_) => {
                out.report(t, a.tick(t), Category::IllegalDissonance, "Invalid\nNCT", vec![here])
            }
            kind if kind.is_embellishment() => out.tag(here, Category::ValidPattern),
            _ => {}
        }
    }
}

fn check_missing_members(a: &Analysis<'_>, t: usize, out: &mut Findings) {
    let Some(label) = a.label(t).and_then(HarmonicLabel::parse) else {
        return;
    };
    if label.is_augmented_sixth()
        || label.is_cadential()
        || label.is_neapolitan()
        || label.is_diminished_leading_tone()
    {
        return;
    }
    let harmony = &a.harmony[t];
    if harmony.tones.len() < 3 {
        return;
    }
    let present: Vec<Tpc> = a
        .voices_top_down()
        .filter_map(|v| a.sounding(t, v))
        .map(|n| n.tpc)
        .collect();
    if present.is_empty() {
        return;
    }
    let members = [
        (harmony.root(), "Missing\nroot"),
        (harmony.third(), "Missing\n3rd"),
        (harmony.chord_seventh(), "Missing\n7th"),
    ];
    for (tone, message) in members {
        if let Some(tone) = tone
            && !present.contains(&tone)
        {
            out.report(t, a.tick(t), Category::VoiceLeading, message, Vec::new());
        }
    }
}

fn check_doubled_tendency_tones(a: &Analysis<'_>, t: usize, out: &mut Findings) {
    if a.is_linear() && !a.onsets[t] {
        return;
    }
    let harmony = &a.harmony[t];
    let tendencies = [
        (harmony.leading_tone, "Doubled\nLead Tone", Category::VoiceLeading),
        (harmony.seventh, "Doubled\n7th", Category::CrossRelation),
    ];
    for (tone, message, category) in tendencies {
        let Some(tone) = tone else {
            continue;
        };
        let notes: Vec<NoteRef> = a
            .voices_top_down()
            .filter(|&v| a.sounding(t, v).is_some_and(|n| n.tpc == tone))
            .map(|v| at(t, v))
            .collect();
        if notes.len() > 1 {
            out.report(t, a.tick(t), category, message, notes);
        }
    }
}

// ── Layer 3: Melodic rules ──

/// Leading tones rise by step, sevenths fall by step.
fn check_tendency_resolution(a: &Analysis<'_>, t: usize, out: &mut Findings) {
    let harmony = &a.harmony[t];
    if harmony.leading_tone.is_none() && harmony.seventh.is_none() {
        return;
    }
    let top = a.layout().top();
    for v in a.voices_top_down() {
        let checked = if a.is_linear() { v != 0 } else { v == top };
        if !checked {
            continue;
        }
        let Some(note) = a.attacked(t, v) else {
            continue;
        };
        if note.tie_forward {
            continue;
        }
        let Some((p, next)) = a.table.next_attack(v, t) else {
            continue;
        };
        if a.is_linear() && !a.onsets[p] {
            continue;
        }
        let motion = semitones(note, next);
        let message = if harmony.leading_tone == Some(note.tpc) && !(1..=2).contains(&motion) {
            format!("{} should\nstep UP", note.tpc)
        } else if harmony.seventh == Some(note.tpc) && !(-2..=-1).contains(&motion) {
            format!("{} should\nstep DOWN", note.tpc)
        } else {
            continue;
        };
        out.report(t, a.tick(t), Category::VoiceLeading, message, vec![at(t, v)]);
    }
}

fn check_repeated_notes(a: &Analysis<'_>, t: usize, out: &mut Findings) {
    for v in a.voices_top_down().filter(|&v| v != 0) {
        let Some(note) = a.attacked(t, v) else {
            continue;
        };
        let Some((p, next)) = a.table.next_attack(v, t) else {
            continue;
        };
        let same = next.pitch == note.pitch && next.tpc == note.tpc;
        if same && !note.tie_forward && !next.tie_back {
            out.report(
                t,
                a.tick(t),
                Category::VoiceLeading,
                "Repeated\nMelody Note",
                vec![at(t, v), at(p, v)],
            );
        }
    }
}

/// Augmented and diminished melodic intervals, by spelling.
fn check_melodic_quality(a: &Analysis<'_>, t: usize, out: &mut Findings) {
    for v in a.voices_top_down() {
        let Some(note) = a.attacked(t, v) else {
            continue;
        };
        let Some((p, next)) = a.table.next_attack(v, t) else {
            continue;
        };
        // C-Db spelled B#-Db is still a half step.
        if semitones(note, next).abs() == 1 {
            continue;
        }
        let Some(quality) = MelodicQuality::from_tpc_distance(note.tpc.distance_to(next.tpc)) else {
            continue;
        };
        let message = if a.is_linear() {
            format!("Melodic {quality}")
        } else {
            format!("{}: Melodic\n{quality}", a.layout().abbrev(v))
        };
        out.report(t, a.tick(t), Category::VoiceLeading, message, vec![at(t, v), at(p, v)]);
    }
}

fn check_seventh_leaps(a: &Analysis<'_>, t: usize, out: &mut Findings) {
    for v in a.voices_top_down() {
        let Some(note) = a.attacked(t, v) else {
            continue;
        };
        let Some((p, next)) = a.table.next_attack(v, t) else {
            continue;
        };
        if matches!(semitones(note, next).abs(), 10 | 11) {
            out.report(
                t,
                a.tick(t),
                Category::VoiceLeading,
                "Leap\nof 7th",
                vec![at(t, v), at(p, v)],
            );
        }
    }
}

// ── Layer 4: Successive rules ──

/// A voice must not move past where its neighbor just was.
fn check_overlap(a: &Analysis<'_>, t: usize, u: usize, out: &mut Findings) {
    let layout = a.layout();
    for hi in a.voices_top_down().filter(|&v| v != 0) {
        let lo = hi - 1;
        let (Some(upper), Some(lower)) = (a.sounding(t, hi), a.sounding(t, lo)) else {
            continue;
        };
        let (Some(next_upper), Some(next_lower)) = (a.sounding(u, hi), a.sounding(u, lo)) else {
            continue;
        };
        if next_lower.pitch > upper.pitch {
            out.report(
                t,
                a.tick(t),
                Category::VoiceLeading,
                format!("{} overlaps\n{}", layout.abbrev(lo), layout.abbrev(hi)),
                vec![at(u, lo)],
            );
        }
        if next_upper.pitch < lower.pitch {
            out.report(
                t,
                a.tick(t),
                Category::VoiceLeading,
                format!("{} overlaps\n{}", layout.abbrev(hi), layout.abbrev(lo)),
                vec![at(u, hi)],
            );
        }
    }
}

/// Same letter, different spelling, different voices, adjacent points.
fn check_cross_relations(a: &Analysis<'_>, t: usize, u: usize, out: &mut Findings) {
    for i in a.voices_top_down() {
        let Some(first) = a.sounding(t, i) else {
            continue;
        };
        for j in a.voices_top_down().filter(|&j| j != i) {
            let Some(second) = a.attacked(u, j) else {
                continue;
            };
            if first.tpc != second.tpc && first.tpc.letter() == second.tpc.letter() {
                out.report(
                    t,
                    a.tick(t),
                    Category::CrossRelation,
                    format!("Cross-relation\n({}-{})", first.tpc, second.tpc),
                    vec![at(t, i), at(u, j)],
                );
            }
        }
    }
}

/// A voice pair at two points. Each side lists `(layout index, note)` for
/// the lower and then the higher sounding pitch.
struct PairMotion<'n> {
    before: [(usize, &'n Note); 2],
    after: [(usize, &'n Note); 2],
}

impl<'n> PairMotion<'n> {
    fn new(a: &Analysis<'n>, t: usize, u: usize, hi: usize, lo: usize) -> Option<PairMotion<'n>> {
        let order = |upper: &'n Note, lower: &'n Note| {
            if lower.pitch <= upper.pitch {
                [(lo, lower), (hi, upper)]
            } else {
                [(hi, upper), (lo, lower)]
            }
        };
        Some(PairMotion {
            before: order(a.sounding(t, hi)?, a.sounding(t, lo)?),
            after: order(a.sounding(u, hi)?, a.sounding(u, lo)?),
        })
    }

    fn perfect(side: &[(usize, &Note); 2]) -> Option<Perfect> {
        let (low, high) = (side[0].1, side[1].1);
        perfect_interval((low.pitch, low.tpc), (high.pitch, high.tpc))
    }
}

fn check_parallels(
    a: &Analysis<'_>,
    t: usize,
    u: usize,
    pairs: &[(usize, usize)],
    out: &mut Findings,
) {
    for &(hi, lo) in pairs {
        let Some(motion) = PairMotion::new(a, t, u, hi, lo) else {
            continue;
        };
        let before = PairMotion::perfect(&motion.before);
        let Some(interval) = before else {
            continue;
        };
        let upper_moved = a.sounding(t, hi).map(|n| n.pitch) != a.sounding(u, hi).map(|n| n.pitch);
        if PairMotion::perfect(&motion.after) != before || !upper_moved {
            continue;
        }
        let message = if a.is_linear() {
            format!("Parallel {interval}")
        } else {
            format!("{}:\nParallel {interval}", pair_name(a, hi, lo))
        };
        out.report(
            t,
            a.tick(t),
            Category::IllegalDissonance,
            message,
            vec![at(t, hi), at(t, lo), at(u, hi), at(u, lo)],
        );
    }
}

/// Similar motion into a perfect interval with a leap in the upper voice.
fn check_directs(
    a: &Analysis<'_>,
    t: usize,
    u: usize,
    pairs: &[(usize, usize)],
    out: &mut Findings,
) {
    for &(hi, lo) in pairs {
        let Some(motion) = PairMotion::new(a, t, u, hi, lo) else {
            continue;
        };
        if PairMotion::perfect(&motion.before).is_some() {
            continue;
        }
        let Some(arrival) = PairMotion::perfect(&motion.after) else {
            continue;
        };
        // In counterpoint the bass has to stay underneath.
        if a.is_linear() && motion.after[0].0 != lo {
            continue;
        }
        let lower_motion = semitones(motion.before[0].1, motion.after[0].1);
        let upper_motion = semitones(motion.before[1].1, motion.after[1].1);
        if lower_motion * upper_motion <= 0 || upper_motion.abs() <= 2 {
            continue;
        }
        let message = if a.is_linear() {
            format!("Direct {arrival}")
        } else {
            format!("{}:\nDirect {arrival}", pair_name(a, hi, lo))
        };
        out.report(
            t,
            a.tick(t),
            Category::IllegalDissonance,
            message,
            vec![at(u, motion.after[1].0)],
        );
    }
}
