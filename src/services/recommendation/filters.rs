use std::collections::HashSet;
use uuid::Uuid;

use crate::models::Preferences;

use super::Candidate;

/// Removes candidates the user has already downloaded
pub fn drop_downloaded(candidates: Vec<Candidate>, downloaded: &HashSet<Uuid>) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| !downloaded.contains(&c.item.id))
        .collect()
}

/// Applies explicit user-supplied constraints as a conjunction
///
/// A candidate must pass every supplied dimension. An empty list for a
/// dimension is treated as "not supplied" rather than matching nothing.
pub fn apply_preferences(candidates: Vec<Candidate>, preferences: &Preferences) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| matches_preferences(c, preferences))
        .collect()
}

fn matches_preferences(candidate: &Candidate, preferences: &Preferences) -> bool {
    let item = &candidate.item;

    if let Some(characters) = &preferences.characters {
        if !characters.is_empty() {
            let name = item.character_name.to_lowercase();
            if !characters.iter().any(|c| name.contains(&c.to_lowercase())) {
                return false;
            }
        }
    }

    if let Some(difficulties) = &preferences.difficulties {
        if !difficulties.is_empty() && !difficulties.contains(&item.difficulty) {
            return false;
        }
    }

    if let Some(keywords) = &preferences.keywords {
        if !keywords.is_empty() {
            let matched = item.keywords.iter().any(|item_keyword| {
                let item_keyword = item_keyword.to_lowercase();
                keywords
                    .iter()
                    .any(|wanted| item_keyword.contains(&wanted.to_lowercase()))
            });
            if !matched {
                return false;
            }
        }
    }

    true
}
