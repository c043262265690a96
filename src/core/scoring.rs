use crate::models::{AttributeBundle, OptionSet, ScoringWeights};

/// Scores are reported in steps of this size
pub const SCORE_STEP: f64 = 5.0;

/// Calculate the similarity score (0-100) of `item` relative to `source`
///
/// Scoring formula (defaults):
/// score = (
///     fragrance_type_overlap * 20 +   # shared / item's fragrance types
///     main_note_contained * 10 +      # all of item's main notes in source
///     concentration_contained * 5 +   # all of item's concentrations in source
///     top_overlap * 5 +
///     middle_overlap * 5 +
///     base_overlap * 15 +
///     note_ratio * 40                 # shared notes / item's notes, all tiers
/// ) rounded to the nearest multiple of 5
///
/// A category contributes nothing when either side is empty.
pub fn calculate_similarity_score(
    source: &AttributeBundle,
    item: &AttributeBundle,
    weights: &ScoringWeights,
) -> f64 {
    score_from_points(raw_similarity_points(source, item, weights))
}

/// Unrounded weighted points behind [`calculate_similarity_score`]
pub fn raw_similarity_points(
    source: &AttributeBundle,
    item: &AttributeBundle,
    weights: &ScoringWeights,
) -> f64 {
    let mut points = overlap_ratio(&source.fragrance_type, &item.fragrance_type) * weights.fragrance_type;

    if fully_contained(&source.main_note, &item.main_note) {
        points += weights.main_note;
    }

    if fully_contained(&source.concentration, &item.concentration) {
        points += weights.concentration;
    }

    points += overlap_ratio(&source.top_notes, &item.top_notes) * weights.top_notes;
    points += overlap_ratio(&source.middle_notes, &item.middle_notes) * weights.middle_notes;
    points += overlap_ratio(&source.base_notes, &item.base_notes) * weights.base_notes;

    let matched = shared_count(&source.top_notes, &item.top_notes)
        + shared_count(&source.middle_notes, &item.middle_notes)
        + shared_count(&source.base_notes, &item.base_notes);
    let potential = item.top_notes.len() + item.middle_notes.len() + item.base_notes.len();

    points += note_ratio(matched, potential) * weights.note_bonus;
    points
}

/// Reported score for raw points: stepped and kept within 0-100
#[inline]
pub fn score_from_points(points: f64) -> f64 {
    round_to_step(points).clamp(0.0, 100.0)
}

/// Round to the nearest multiple of [`SCORE_STEP`], halves away from zero
#[inline]
pub fn round_to_step(points: f64) -> f64 {
    (points / SCORE_STEP).round() * SCORE_STEP
}

/// Ratio of matched to potential notes.
///
/// A ratio above 1 is inverted instead of capped, which pushes such items
/// down rather than up.
#[inline]
pub fn note_ratio(matched: usize, potential: usize) -> f64 {
    if matched == 0 || potential == 0 {
        return 0.0;
    }

    let ratio = matched as f64 / potential as f64;
    if ratio > 1.0 {
        potential as f64 / matched as f64
    } else {
        ratio
    }
}

/// Number of options in both sets, zero when either side is empty
#[inline]
fn shared_count(source: &OptionSet, item: &OptionSet) -> usize {
    if source.is_empty() || item.is_empty() {
        return 0;
    }
    source.intersection(item).count()
}

/// Fraction of the item's options that the source shares (0-1)
#[inline]
fn overlap_ratio(source: &OptionSet, item: &OptionSet) -> f64 {
    if item.is_empty() {
        return 0.0;
    }
    shared_count(source, item) as f64 / item.len() as f64
}

/// True when every one of the item's options is also in the source
#[inline]
fn fully_contained(source: &OptionSet, item: &OptionSet) -> bool {
    !source.is_empty() && !item.is_empty() && shared_count(source, item) == item.len()
}
