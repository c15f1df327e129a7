// Analysis driver.
//
// `analyze` runs one pass over a score:
//
// 1. Build the voice table (dense point x voice lookup).
// 2. Carry each label forward to the unlabeled points after it, then mark
//    harmonic onsets. In four-part textures and species 1 every point is an
//    onset; in species 2-4 a point is an onset when the bass strikes a new
//    note or the label in effect changes.
// 3. Infer the key from the labels seen at onsets, then resolve every
//    point's label against it.
// 4. For species 3, scan each melody for double-neighbor and cambiata
//    figures and remember the notes they certify.
// 5. Run the rule catalog (rules.rs) point by point, in time order.
//
// The score is never modified; all findings go into the returned `Report`.

use crate::config::CheckerConfig;
use crate::diagnostic::{Findings, Report};
use crate::nct::{MelodicNote, NctInput, NctPolicy, Neighbor, find_figures};
use crate::rules;
use crate::score::{Note, NoteRef, Score, Texture, VoiceLayout, VoiceTable};
use std::collections::BTreeSet;
use std::iter::Rev;
use std::ops::Range;
use tracing::{debug, trace};
use voicelead_theory::{HarmonicContext, Key, LabelObservation, infer_key, resolve};

/// Check a score under the given policy.
pub fn analyze(score: &Score, policy: NctPolicy, config: &CheckerConfig) -> Report {
    let table = VoiceTable::build(score);
    let labels = labels_in_effect(score);
    let onsets = harmonic_onsets(score, &table, &labels, policy);

    let observations = score
        .time_points()
        .iter()
        .enumerate()
        .filter(|&(p, _)| onsets[p])
        .filter_map(|(p, tp)| {
            let label = tp.label.as_deref()?;
            let bass = table.slice(p).iter().flatten().min_by_key(|n| n.pitch).map(|n| n.tpc);
            Some(LabelObservation { label, bass })
        });
    let key = infer_key(observations, score.key_signature());
    debug!(%key, points = score.len(), ?policy, "analyzing");

    let mut harmony: Vec<HarmonicContext> = Vec::with_capacity(score.len());
    for (p, &label) in labels.iter().enumerate() {
        let repeated = p > 0 && labels[p - 1] == label;
        let context = match (label, repeated) {
            (_, true) => harmony[p - 1].clone(),
            (Some(label), false) => resolve(label, key.tonic, key.mode),
            (None, false) => HarmonicContext::empty(),
        };
        harmony.push(context);
    }

    let mut analysis = Analysis {
        score,
        table,
        labels,
        harmony,
        onsets,
        key,
        policy,
        config,
        certified: BTreeSet::new(),
    };
    if policy == NctPolicy::Species3 {
        analysis.certified = certified_figure_notes(&analysis);
    }

    let mut findings = Findings::default();
    for t in 0..score.len() {
        trace!(point = t, tick = analysis.tick(t), onset = analysis.onsets[t], "checking point");
        rules::check_point(&analysis, t, &mut findings);
    }
    findings.into_report(key)
}

/// The label in effect at each point: its own, or the last one before it.
/// Blank labels count as absent.
fn labels_in_effect(score: &Score) -> Vec<Option<&str>> {
    let mut current = None;
    score
        .time_points()
        .iter()
        .map(|tp| {
            if let Some(label) = tp.label.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
                current = Some(label);
            }
            current
        })
        .collect()
}

/// Onset flags, one per time point.
fn harmonic_onsets(
    score: &Score,
    table: &VoiceTable<'_>,
    labels: &[Option<&str>],
    policy: NctPolicy,
) -> Vec<bool> {
    let every_point = score.layout().texture != Texture::Linear || policy == NctPolicy::Homophonic;
    (0..score.len())
        .map(|p| {
            if every_point || p == 0 {
                return true;
            }
            let bass_struck = table.note(p, 0).is_some_and(|n| !n.held && !n.tie_back);
            bass_struck || labels[p] != labels[p - 1]
        })
        .collect()
}

fn certified_figure_notes(analysis: &Analysis<'_>) -> BTreeSet<NoteRef> {
    let mut certified = BTreeSet::new();
    for v in 1..analysis.layout().len() {
        let melody: Vec<Option<MelodicNote>> = (0..analysis.len())
            .map(|p| {
                analysis.attacked(p, v).map(|n| MelodicNote {
                    pitch: n.pitch,
                    tpc: n.tpc,
                })
            })
            .collect();
        for figure in find_figures(&melody, &analysis.onsets, &analysis.harmony) {
            debug!(voice = v, start = figure.start, kind = ?figure.kind, "figure found");
            for p in figure.certified() {
                certified.insert(NoteRef::new(p, v));
            }
        }
    }
    certified
}

/// Everything the rules read while checking one score.
pub(crate) struct Analysis<'a> {
    pub score: &'a Score,
    pub table: VoiceTable<'a>,
    /// Label in effect per point, carried forward over unlabeled points.
    pub labels: Vec<Option<&'a str>>,
    /// Resolved harmony per point.
    pub harmony: Vec<HarmonicContext>,
    pub onsets: Vec<bool>,
    pub key: Key,
    pub policy: NctPolicy,
    pub config: &'a CheckerConfig,
    /// Notes inside a recognized species-3 figure.
    pub certified: BTreeSet<NoteRef>,
}

impl<'a> Analysis<'a> {
    pub fn layout(&self) -> &'a VoiceLayout {
        self.score.layout()
    }

    pub fn len(&self) -> usize {
        self.score.len()
    }

    pub fn tick(&self, point: usize) -> u32 {
        self.score.time_points()[point].tick
    }

    pub fn label(&self, point: usize) -> Option<&'a str> {
        self.labels[point]
    }

    pub fn is_linear(&self) -> bool {
        self.layout().texture == Texture::Linear
    }

    /// Species 2-4.
    pub fn is_species(&self) -> bool {
        self.is_linear() && self.policy != NctPolicy::Homophonic
    }

    /// The note sounding in `voice` at `point`, held or not.
    pub fn sounding(&self, point: usize, voice: usize) -> Option<&'a Note> {
        self.table.note(point, voice)
    }

    /// The note struck in `voice` at `point`; held continuations excluded.
    pub fn attacked(&self, point: usize, voice: usize) -> Option<&'a Note> {
        self.table.note(point, voice).filter(|n| !n.held)
    }

    /// Layout indices from the top voice down.
    pub fn voices_top_down(&self) -> Rev<Range<usize>> {
        (0..self.layout().len()).rev()
    }

    pub fn next_onset(&self, point: usize) -> Option<usize> {
        (point + 1..self.len()).find(|&p| self.onsets[p])
    }

    /// The point vertical rules compare `point` against: the next point, or
    /// in species 2-4 the next harmonic onset (and only from an onset).
    pub fn vertical_successor(&self, point: usize) -> Option<usize> {
        if !self.is_species() {
            return (point + 1 < self.len()).then_some(point + 1);
        }
        if !self.onsets[point] {
            return None;
        }
        self.next_onset(point)
    }

    /// Classifier input for the note struck in `voice` at `point`.
    pub fn nct_input(&self, point: usize, voice: usize, note: &Note) -> NctInput {
        let neighbor = |(p, n): (usize, &Note)| Neighbor {
            pitch: n.pitch,
            tpc: n.tpc,
            is_chord_tone: self.harmony[p].contains(n.tpc),
        };
        NctInput {
            pitch: note.pitch,
            tpc: note.tpc,
            is_chord_tone: self.harmony[point].contains(note.tpc),
            on_onset: self.onsets[point],
            tie_back: note.tie_back,
            tie_forward: note.tie_forward,
            prev: self.table.prev_attack(voice, point).map(neighbor),
            next: self.table.next_attack(voice, point).map(neighbor),
        }
    }
}
