use std::cmp::Ordering;

use log::debug;
use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::geometry::Rect;

/// Category given to candidates recognized without a bracketed category.
pub const NO_DETAIL_CATEGORY: &str = "无详情";

const MARKER_SIMILARITY: f64 = 0.8;

/// A piece of recognized text and where it is on screen.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct OcrText {
    pub text: String,
    pub rect: Rect,
}

impl OcrText {
    pub fn new(text: impl Into<String>, rect: Rect) -> Self {
        Self {
            text: text.into(),
            rect,
        }
    }
}

/// Rank label of a candidate.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Debug,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum Level {
    S,
    A,
    B,
    #[default]
    #[strum(serialize = "?")]
    #[serde(rename = "?")]
    Unknown,
}

impl Level {
    #[inline]
    pub fn is_known(self) -> bool {
        self != Level::Unknown
    }
}

/// Screen markers that can appear above a candidate card.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display, EnumIter)]
pub enum Marker {
    #[strum(to_string = "有同流派武备")]
    SameArchetype,
    #[strum(to_string = "已选择")]
    Chosen,
    #[strum(to_string = "齿轮硬币不足")]
    InsufficientCurrency,
    #[strum(to_string = "NEW!")]
    New,
}

impl Marker {
    /// Finds the marker `text` most likely is.
    pub fn recognize(text: &str) -> Option<Marker> {
        let text = text.trim();
        Marker::iter()
            .map(|marker| (marker, jaro_winkler(text, &marker.to_string())))
            .filter(|(_, similarity)| *similarity >= MARKER_SIMILARITY)
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            .map(|(marker, _)| marker)
    }
}

/// A selectable item recognized on screen.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub level: Level,
    /// The full recognized text the candidate was built from.
    #[serde(default)]
    pub text: String,
    pub rect: Rect,
    /// Whether the text carried an explicit bracketed category.
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub chosen: bool,
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub same_archetype: bool,
    #[serde(default = "selectable_default")]
    pub selectable: bool,
}

impl Candidate {
    /// Builds a candidate from one piece of recognized text.
    ///
    /// `[category]name` and `[category:level]name` (full-width brackets included) yield a primary
    /// candidate. Any other text of at least two characters yields a secondary candidate.
    pub fn from_ocr(text: &str, rect: Rect) -> Option<Candidate> {
        let text = text.trim();
        if text.chars().count() < 2 {
            return None;
        }

        let normalized = text.replace('【', "[").replace('】', "]");
        if let Some(rest) = normalized.strip_prefix('[')
            && let Some((raw_category, raw_name)) = rest.split_once(']')
            && !raw_category.is_empty()
            && !raw_name.is_empty()
        {
            let name = raw_name.trim();
            if name.is_empty() {
                return None;
            }
            let raw_category = raw_category.trim();
            let (category, detail) = raw_category
                .split_once(['：', ':'])
                .unwrap_or((raw_category, ""));
            let category = match category.trim() {
                "" => raw_category,
                category => category,
            };
            let mut candidate = Candidate::new(name, category, text, rect, true);
            if let Ok(level) = detail.trim().parse::<Level>() {
                candidate.level = level;
            }

            return Some(candidate);
        }

        Some(Candidate::new(text, NO_DETAIL_CATEGORY, text, rect, false))
    }

    fn new(name: &str, category: &str, text: &str, rect: Rect, primary: bool) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            level: Level::Unknown,
            text: text.to_string(),
            rect,
            primary,
            chosen: false,
            new: false,
            same_archetype: false,
            selectable: true,
        }
    }

    #[inline]
    pub fn display_name(&self) -> String {
        format!("[{}]{}", self.category, self.name)
    }

    fn score(&self) -> (bool, bool, usize, i32) {
        (
            self.primary,
            self.level.is_known(),
            self.text.chars().count(),
            -self.rect.center().y,
        )
    }

    /// Returns whichever of `self` and `other` carries more information.
    fn better(self, other: Candidate) -> Candidate {
        if other.score() > self.score() {
            other
        } else {
            self
        }
    }
}

/// Builds one candidate per card from recognized text.
///
/// Texts whose horizontal centers are closer than `merge_distance` belong to the same card and
/// only the most informative one is kept.
pub fn build_candidates(ocr: &[OcrText], merge_distance: i32) -> Vec<Candidate> {
    let mut raw = ocr
        .iter()
        .filter_map(|ocr| Candidate::from_ocr(&ocr.text, ocr.rect))
        .collect::<Vec<_>>();
    sort_by_position(&mut raw);

    let mut merged = Vec::<Candidate>::with_capacity(raw.len());
    for candidate in raw {
        let x = candidate.rect.center().x;
        match merged
            .iter_mut()
            .find(|existing| (existing.rect.center().x - x).abs() < merge_distance)
        {
            Some(existing) => {
                *existing = existing.clone().better(candidate);
            }
            None => merged.push(candidate),
        }
    }
    sort_by_position(&mut merged);

    merged
}

/// Keeps only the top-most candidate of every group closer than `overlap_distance` horizontally.
///
/// The result is sorted left to right then top to bottom.
pub fn remove_overlapping(mut candidates: Vec<Candidate>, overlap_distance: i32) -> Vec<Candidate> {
    if candidates.len() <= 1 {
        return candidates;
    }

    candidates.sort_by_key(|candidate| candidate.rect.center().x);
    let mut result = Vec::with_capacity(candidates.len());
    let mut iter = candidates.into_iter().peekable();
    while let Some(first) = iter.next() {
        let x = first.rect.center().x;
        let mut best = first;
        let overlaps = |next: &Candidate| (next.rect.center().x - x).abs() < overlap_distance;
        while let Some(next) = iter.next_if(overlaps) {
            debug!(
                target: "selection",
                "{} overlaps {}",
                best.display_name(),
                next.display_name()
            );
            if next.rect.center().y < best.rect.center().y {
                best = next;
            }
        }
        result.push(best);
    }
    sort_by_position(&mut result);

    result
}

/// Attaches the markers found in `ocr` to the horizontally nearest candidate below each marker.
pub fn annotate_markers(candidates: &mut [Candidate], ocr: &[OcrText]) {
    for text in ocr {
        let Some(marker) = Marker::recognize(&text.text) else {
            continue;
        };
        let bottom = text.rect.y + text.rect.height;
        let x = text.rect.center().x;
        let Some(candidate) = candidates
            .iter_mut()
            .filter(|candidate| bottom < candidate.rect.y)
            .min_by_key(|candidate| (candidate.rect.center().x - x).abs())
        else {
            continue;
        };

        debug!(target: "selection", "{marker} marks {}", candidate.display_name());
        match marker {
            Marker::SameArchetype => candidate.same_archetype = true,
            Marker::Chosen => {
                candidate.chosen = true;
                candidate.selectable = false;
            }
            Marker::InsufficientCurrency => candidate.selectable = false,
            Marker::New => candidate.new = true,
        }
    }
}

#[inline]
fn sort_by_position(candidates: &mut [Candidate]) {
    candidates.sort_by_key(|candidate| {
        let center = candidate.rect.center();
        (center.x, center.y)
    });
}

fn selectable_default() -> bool {
    true
}
