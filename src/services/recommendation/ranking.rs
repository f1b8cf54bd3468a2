use std::collections::HashSet;

use crate::models::ContentItem;

use super::Candidate;

/// Orders, de-duplicates and truncates candidates, stripping internal scores
///
/// Sort is by score descending; a non-finite score ranks as zero. Duplicate
/// item ids keep their highest-scored occurrence. Callers only ever see the
/// final ordering, never the raw scores.
pub fn finalize(mut candidates: Vec<Candidate>, limit: usize) -> Vec<ContentItem> {
    candidates.sort_by(|a, b| {
        effective_score(b)
            .partial_cmp(&effective_score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen: HashSet<uuid::Uuid> = HashSet::new();
    let mut items = Vec::new();

    for candidate in candidates {
        if items.len() == limit {
            break;
        }
        if seen.insert(candidate.item.id) {
            items.push(candidate.item);
        }
    }

    items
}

fn effective_score(candidate: &Candidate) -> f64 {
    if candidate.score.is_finite() {
        candidate.score
    } else {
        0.0
    }
}
