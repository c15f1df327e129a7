// Diagnostics and the note annotation side-table.
//
// Every rule violation becomes a `Diagnostic`: the time point it was found
// at, a short message (often two lines, as shown under a note head), a
// category, and the notes it concerns. The same notes are recorded in the
// annotation table with the diagnostic's category, so a renderer can color
// them. Certified embellishments are annotated without a diagnostic.
//
// Annotations are last-write-wins: when two rules touch the same note, the
// later rule in the engine's order decides its category.

use crate::score::NoteRef;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use voicelead_theory::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    IllegalDissonance,
    VoiceLeading,
    Spacing,
    CrossRelation,
    ValidPattern,
}

impl Category {
    /// Display color for annotated notes.
    pub fn color(self) -> &'static str {
        match self {
            Category::IllegalDissonance => "#c41e3a",
            Category::VoiceLeading => "#b8860b",
            Category::Spacing => "#d2691e",
            Category::CrossRelation => "#228b22",
            Category::ValidPattern => "#2e7d32",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub point: usize,
    pub tick: u32,
    pub category: Category,
    pub message: String,
    pub notes: Vec<NoteRef>,
}

impl Diagnostic {
    /// The message on one line.
    pub fn one_line(&self) -> String {
        self.message.replace('\n', " ")
    }
}

/// Result of one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub key: Key,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(serialize_with = "annotations_as_list")]
    pub annotations: BTreeMap<NoteRef, Category>,
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.diagnostics.iter().map(|d| d.message.as_str()).collect()
    }

    pub fn annotation(&self, note: NoteRef) -> Option<Category> {
        self.annotations.get(&note).copied()
    }
}

#[derive(Serialize)]
struct Annotation {
    #[serde(flatten)]
    note: NoteRef,
    category: Category,
    color: &'static str,
}

// JSON object keys must be strings, so the table goes out as a list.
fn annotations_as_list<S: Serializer>(
    annotations: &BTreeMap<NoteRef, Category>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(annotations.iter().map(|(&note, &category)| Annotation {
        note,
        category,
        color: category.color(),
    }))
}

/// Accumulates diagnostics and annotations while the rules run.
#[derive(Debug, Default)]
pub struct Findings {
    diagnostics: Vec<Diagnostic>,
    annotations: BTreeMap<NoteRef, Category>,
}

impl Findings {
    pub fn report(
        &mut self,
        point: usize,
        tick: u32,
        category: Category,
        message: impl Into<String>,
        notes: Vec<NoteRef>,
    ) {
        for &note in &notes {
            self.annotations.insert(note, category);
        }
        self.diagnostics.push(Diagnostic {
            point,
            tick,
            category,
            message: message.into(),
            notes,
        });
    }

    /// Annotate a note without producing a diagnostic.
    pub fn tag(&mut self, note: NoteRef, category: Category) {
        self.annotations.insert(note, category);
    }

    pub fn into_report(self, key: Key) -> Report {
        Report {
            key,
            diagnostics: self.diagnostics,
            annotations: self.annotations,
        }
    }
}
