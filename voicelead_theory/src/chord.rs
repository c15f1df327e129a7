// Roman-numeral chord resolution.
//
// Turns a harmonic-function label ("V7", "viio6/V", "Ger65", "Cad64") plus a
// tonic and mode into the concrete TPCs that count as chord members, and for
// dominant-function chords the two tendency tones (leading tone and chordal
// seventh).
//
// Label grammar: PRIMARY[/TARGET], where each part is a BASE followed by an
// optional inversion figure (7, 65, 43, 42, 6, 64). Figures never change
// membership; they only tell the lookup that a seventh chord is meant. The
// target of a secondary function is resolved first, with the same function,
// to find the local tonic for the primary part.
//
// Template order matters: slot 0 is the nominal root, slot 2 the third, slot
// 3 the seventh. Two families break that pattern. For vii° chords slot 2 is
// the root; for augmented sixths slot 3 is the bass (the lowered sixth
// degree). Local tonic selection and the missing-member rule both rely on
// this.
//
// Resolution is total. Unknown or malformed labels produce an empty context,
// which downstream rules read as "no harmonic information".

use crate::key::Mode;
use crate::pitch::Tpc;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Recursion limit for chains like "V/V/V". Real labels only nest one deep.
pub const MAX_SECONDARY_DEPTH: usize = 4;

const CAD_MAJOR: [i32; 3] = [1, 0, 4];
const CAD_MINOR: [i32; 3] = [1, 0, -3];

/// TPC offsets from the local tonic for each table key.
fn template(key: &str) -> Option<&'static [i32]> {
    let offsets: &'static [i32] = match key {
        "I" => &[0, 1, 4],
        "III" => &[-3, -2, 1],
        "IV" => &[-1, 0, 3],
        "V" => &[1, 2, 5],
        "VI" => &[-4, -3, 0],
        "VII" => &[-2, -1, 1],
        "i" => &[0, 1, -3],
        "ii" => &[2, 3, -1],
        "iii" => &[4, 5, 1],
        "iv" => &[-1, 0, -4],
        "v" => &[1, 2, -2],
        "vi" => &[3, 4, 0],
        "iio" => &[2, -4, -1],
        "viio" => &[-1, 2, 5],
        "I7" => &[0, 1, 4, 5],
        "III7" => &[-3, -2, 1, 2],
        "IV7" => &[-1, 0, 3, 4],
        "VI7" => &[-4, -3, 0, 1],
        "VII7" => &[-2, -1, 2, 3],
        "i7" => &[0, 1, -3, -2],
        "ii7" => &[2, 3, -1, 0],
        "iii7" => &[4, 5, 1, 2],
        "iv7" => &[-1, 0, -4, -3],
        "vi7" => &[3, 4, 0, 1],
        "V7" => &[1, 2, 5, -1],
        "viio7" => &[2, -1, 5, -4],
        "vii07" => &[2, -1, 5, 3],
        "ii07" => &[2, -4, -1, 0],
        "It" | "It6" => &[0, 0, 6, -4],
        "Fr" | "Fr65" => &[0, 2, 6, -4],
        "Ger" | "Ger65" => &[0, -3, 6, -4],
        "N" | "N6" => &[-5, -4, -1],
        _ => return None,
    };
    Some(offsets)
}

/// The resolved harmony at one time point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarmonicContext {
    /// Chord members in template order.
    pub tones: Vec<Tpc>,
    /// Leading tone of a dominant-function chord.
    pub leading_tone: Option<Tpc>,
    /// Chordal seventh of a dominant-function seventh chord.
    pub seventh: Option<Tpc>,
}

impl HarmonicContext {
    /// No harmonic information: missing, unknown, or malformed label.
    pub fn empty() -> Self {
        HarmonicContext::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tones.is_empty()
    }

    pub fn contains(&self, tpc: Tpc) -> bool {
        self.tones.contains(&tpc)
    }

    pub fn root(&self) -> Option<Tpc> {
        self.tones.first().copied()
    }

    pub fn third(&self) -> Option<Tpc> {
        self.tones.get(2).copied()
    }

    pub fn chord_seventh(&self) -> Option<Tpc> {
        self.tones.get(3).copied()
    }

    pub fn is_tendency_tone(&self, tpc: Tpc) -> bool {
        self.leading_tone == Some(tpc) || self.seventh == Some(tpc)
    }
}

/// A parsed harmonic-function label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarmonicLabel {
    /// The part before the first slash, figures included ("V65").
    pub primary: String,
    /// `primary` with figure digits removed ("V").
    pub base: String,
    /// A seventh figure (7, 65, 43, 42) was present.
    pub is_seventh: bool,
    /// Everything after the first slash, if any. May itself be secondary.
    pub target: Option<String>,
}

impl HarmonicLabel {
    /// Parse a label. Returns None for an empty label.
    pub fn parse(text: &str) -> Option<HarmonicLabel> {
        let text = normalize(text);
        if text.is_empty() {
            return None;
        }
        let (primary, target) = match text.split_once('/') {
            Some((p, t)) => (p.to_string(), Some(t.to_string())),
            None => (text, None),
        };
        let is_seventh = ["7", "65", "43", "42"].iter().any(|fig| primary.contains(fig));
        let base = strip_figures(&primary);
        Some(HarmonicLabel {
            primary,
            base,
            is_seventh,
            target,
        })
    }

    /// It, Fr, Ger and their inversions.
    pub fn is_augmented_sixth(&self) -> bool {
        let lower = self.base.to_lowercase();
        lower.starts_with("it") || lower.starts_with("fr") || lower.starts_with("ger")
    }

    /// Diminished or half-diminished vii.
    pub fn is_diminished_leading_tone(&self) -> bool {
        let lower = self.base.to_lowercase();
        lower.contains("viio") || lower.contains("vii0")
    }

    pub fn is_cadential(&self) -> bool {
        self.base.to_lowercase().starts_with("cad")
    }

    pub fn is_neapolitan(&self) -> bool {
        self.base.starts_with('N') || self.base.starts_with('n')
    }

    /// V or vii° in any inversion, secondary forms included. Case-sensitive:
    /// a minor v has no leading tone.
    pub fn is_dominant_function(&self) -> bool {
        matches!(self.base.as_str(), "V" | "viio" | "vii0")
    }

    /// Chords whose tendency tones are tracked.
    fn has_tendency_tones(&self) -> bool {
        matches!(self.base.to_uppercase().as_str(), "V" | "VIIO" | "VII0")
    }

    /// Template lookup with the fallback chain: exact key, seventh-suffixed
    /// base, bare base, capitalized base. Cad depends only on mode.
    fn offsets(&self, mode: Mode) -> Option<&'static [i32]> {
        if self.base == "Cad" {
            return Some(match mode {
                Mode::Major => &CAD_MAJOR,
                Mode::Minor => &CAD_MINOR,
            });
        }
        template(&self.primary)
            .or_else(|| {
                if self.is_seventh {
                    template(&format!("{}7", self.base))
                } else {
                    None
                }
            })
            .or_else(|| template(&self.base))
            .or_else(|| template(&capitalize(&self.base)))
    }
}

fn normalize(text: &str) -> String {
    text.trim().replace('ø', "0").replace('°', "o")
}

fn strip_figures(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '2'..='7')).collect()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resolve a label against a tonic and mode.
pub fn resolve(label: &str, tonic: Tpc, mode: Mode) -> HarmonicContext {
    resolve_at_depth(label, tonic, mode, 0)
}

fn resolve_at_depth(text: &str, tonic: Tpc, mode: Mode, depth: usize) -> HarmonicContext {
    if depth > MAX_SECONDARY_DEPTH {
        debug!(label = text, "secondary chain too deep, treating as no harmony");
        return HarmonicContext::empty();
    }
    let Some(label) = HarmonicLabel::parse(text) else {
        return HarmonicContext::empty();
    };
    let local = local_tonic_at_depth(&label, tonic, mode, depth);
    let Some(offsets) = label.offsets(mode) else {
        debug!(label = text, "no chord template for label");
        return HarmonicContext::empty();
    };

    let tones: Vec<Tpc> = offsets.iter().map(|&o| local.offset(o)).collect();
    let (leading_tone, seventh) = if label.has_tendency_tones() {
        (tones.get(2).copied(), tones.get(3).copied())
    } else {
        (None, None)
    };
    HarmonicContext {
        tones,
        leading_tone,
        seventh,
    }
}

/// The tonic a label's primary part is built on: the global tonic, or for a
/// secondary function the relevant member of the resolved target.
pub fn local_tonic(label: &str, tonic: Tpc, mode: Mode) -> Tpc {
    match HarmonicLabel::parse(label) {
        Some(parsed) => local_tonic_at_depth(&parsed, tonic, mode, 0),
        None => tonic,
    }
}

fn local_tonic_at_depth(label: &HarmonicLabel, tonic: Tpc, mode: Mode, depth: usize) -> Tpc {
    let Some(target_text) = label.target.as_deref() else {
        return tonic;
    };
    let Some(target) = HarmonicLabel::parse(target_text) else {
        return tonic;
    };
    let resolved = resolve_at_depth(target_text, tonic, mode, depth + 1);
    let member = if target.is_diminished_leading_tone() {
        resolved.tones.get(2)
    } else if target.is_augmented_sixth() {
        resolved.tones.get(3)
    } else {
        resolved.tones.first()
    };
    member.copied().unwrap_or(tonic)
}

/// Convenience wrapper over `HarmonicLabel::is_dominant_function`.
pub fn is_dominant_function(label: &str) -> bool {
    HarmonicLabel::parse(label).is_some_and(|l| l.is_dominant_function())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tpcs(values: &[i32]) -> Vec<Tpc> {
        values.iter().map(|&v| Tpc(v)).collect()
    }

    #[test]
    fn test_dominant_seventh_in_c() {
        let ctx = resolve("V7", Tpc::C, Mode::Major);
        assert_eq!(ctx.tones, tpcs(&[15, 16, 19, 13]));
        assert_eq!(ctx.leading_tone, Some(Tpc(19)));
        assert_eq!(ctx.seventh, Some(Tpc(13)));
    }

    #[test]
    fn test_triads_have_template_length() {
        for label in ["I", "ii", "iii", "IV", "V", "vi", "viio", "i", "iv", "VI", "N6"] {
            assert_eq!(resolve(label, Tpc::C, Mode::Major).tones.len(), 3, "{label}");
        }
        for label in ["I7", "ii7", "V7", "viio7", "vii07", "It6", "Fr65", "Ger65"] {
            assert_eq!(resolve(label, Tpc::C, Mode::Major).tones.len(), 4, "{label}");
        }
    }

    #[test]
    fn test_secondary_dominant_uses_target_root() {
        let v = resolve("V", Tpc::C, Mode::Major);
        assert_eq!(v.tones[0], Tpc(15));
        let v_of_v = resolve("V/V", Tpc::C, Mode::Major);
        assert_eq!(v_of_v.tones, tpcs(&[16, 17, 20]));
        assert_eq!(v_of_v.leading_tone, Some(Tpc(20))); // F#
    }

    #[test]
    fn test_chained_secondary() {
        // V of V of V in C is A major.
        let ctx = resolve("V/V/V", Tpc::C, Mode::Major);
        assert_eq!(ctx.tones, tpcs(&[17, 18, 21]));
    }

    #[test]
    fn test_secondary_of_diminished_target_uses_its_root() {
        // viio in C is [F, D, B]; slot 2 (B) is the root.
        let ctx = resolve("V/viio", Tpc::C, Mode::Major);
        assert_eq!(ctx.tones, tpcs(&[20, 21, 24]));
        assert_eq!(local_tonic("V7/viio", Tpc::C, Mode::Major), Tpc(19));
    }

    #[test]
    fn test_secondary_of_augmented_sixth_uses_bass() {
        // It6 in C: slot 3 is Ab.
        assert_eq!(local_tonic("V/It6", Tpc::C, Mode::Major), Tpc(10));
    }

    #[test]
    fn test_unresolvable_target_falls_back_to_global_tonic() {
        assert_eq!(local_tonic("V/Foo", Tpc::C, Mode::Major), Tpc::C);
        assert_eq!(resolve("V/Foo", Tpc::C, Mode::Major).tones, tpcs(&[15, 16, 19]));
    }

    #[test]
    fn test_cadential_depends_on_mode() {
        let major = resolve("Cad", Tpc::C, Mode::Major);
        let minor = resolve("Cad64", Tpc::C, Mode::Minor);
        assert_eq!(major.tones[2].0 - major.tones[1].0, 4, "major third above the bass");
        assert_eq!(minor.tones[2].0 - minor.tones[1].0, -3, "minor third above the bass");
        assert_eq!(major.tones[0], minor.tones[0]);
    }

    #[test]
    fn test_figure_fallbacks() {
        // V65 is not a key; falls back to V7.
        assert_eq!(resolve("V65", Tpc::C, Mode::Major), resolve("V7", Tpc::C, Mode::Major));
        // V6 falls back to the bare triad.
        assert_eq!(resolve("V6", Tpc::C, Mode::Major), resolve("V", Tpc::C, Mode::Major));
        // Miscapitalized input.
        assert_eq!(resolve("iV", Tpc::C, Mode::Major), resolve("IV", Tpc::C, Mode::Major));
    }

    #[test]
    fn test_diacritics_normalize() {
        assert_eq!(resolve("viiø7", Tpc::C, Mode::Major), resolve("vii07", Tpc::C, Mode::Major));
        assert_eq!(resolve("vii°", Tpc::C, Mode::Major), resolve("viio", Tpc::C, Mode::Major));
        assert_eq!(resolve("iiø65", Tpc::C, Mode::Minor).tones.len(), 4);
    }

    #[test]
    fn test_unknown_and_empty_labels_are_empty() {
        assert!(resolve("", Tpc::C, Mode::Major).is_empty());
        assert!(resolve("   ", Tpc::C, Mode::Major).is_empty());
        let unknown = resolve("Xyz", Tpc::C, Mode::Major);
        assert!(unknown.is_empty());
        assert_eq!(unknown.leading_tone, None);
    }

    #[test]
    fn test_tendency_tones_only_on_dominants() {
        assert_eq!(resolve("IV", Tpc::C, Mode::Major).leading_tone, None);
        let vii = resolve("viio7", Tpc::C, Mode::Major);
        assert_eq!(vii.leading_tone, Some(Tpc(19)));
        assert_eq!(vii.seventh, Some(Tpc(10)));
        assert_eq!(resolve("V", Tpc::C, Mode::Major).seventh, None);
    }

    #[test]
    fn test_dominant_function_detection() {
        assert!(is_dominant_function("V"));
        assert!(is_dominant_function("V65/V"));
        assert!(is_dominant_function("viiø7"));
        assert!(is_dominant_function("viio6"));
        assert!(!is_dominant_function("v"));
        assert!(!is_dominant_function("IV/V"));
        assert!(!is_dominant_function(""));
    }

    #[test]
    fn test_label_parse() {
        let label = HarmonicLabel::parse(" viio43/V ").unwrap();
        assert_eq!(label.primary, "viio43");
        assert_eq!(label.base, "viio");
        assert!(label.is_seventh);
        assert_eq!(label.target.as_deref(), Some("V"));
        assert!(HarmonicLabel::parse("Ger65").unwrap().is_augmented_sixth());
        assert!(HarmonicLabel::parse("N6").unwrap().is_neapolitan());
        assert!(HarmonicLabel::parse("Cad64").unwrap().is_cadential());
        assert!(HarmonicLabel::parse("").is_none());
    }

    #[test]
    fn test_secondary_in_minor_key() {
        // A minor (tonic 17): V/iv resolves against D minor's root.
        let iv = resolve("iv", Tpc(17), Mode::Minor);
        assert_eq!(iv.tones[0], Tpc(16));
        let ctx = resolve("V7/iv", Tpc(17), Mode::Minor);
        assert_eq!(ctx.tones, tpcs(&[17, 18, 21, 15]));
    }
}
