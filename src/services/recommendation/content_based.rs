use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::StrategyUsed;
use crate::services::store::{CatalogStore, InteractionLog};

use super::{Candidate, GenerationContext, Strategy, StrategyOutput};

const MAX_PREFERRED_KEYWORDS: usize = 5;
const MAX_PREFERRED_DIFFICULTIES: usize = 2;
const KEYWORD_MATCH_WEIGHT: f64 = 0.5;
const DIFFICULTY_MATCH_WEIGHT: f64 = 0.3;
const POPULARITY_WEIGHT: f64 = 0.2;
/// Content similarity is treated as moderately reliable whenever it produces
/// anything, independent of sample size
const CONFIDENCE: f64 = 0.8;

/// Recommends items whose attributes resemble the user's download history
///
/// Used when collaborative signal is absent: keyword and difficulty
/// preferences are inferred from what the user already downloaded, then
/// matched against the catalog.
pub struct ContentBasedFiltering {
    catalog: Arc<dyn CatalogStore>,
    interactions: Arc<dyn InteractionLog>,
}

impl ContentBasedFiltering {
    pub fn new(catalog: Arc<dyn CatalogStore>, interactions: Arc<dyn InteractionLog>) -> Self {
        Self {
            catalog,
            interactions,
        }
    }
}

/// Most frequent values first; ties keep first-seen order
fn top_by_frequency<T: Eq + Hash + Clone>(values: impl Iterator<Item = T>, cap: usize) -> Vec<T> {
    let mut counts: HashMap<T, usize> = HashMap::new();
    let mut ranked: Vec<T> = Vec::new();

    for value in values {
        let count = counts.entry(value.clone()).or_insert(0);
        if *count == 0 {
            ranked.push(value);
        }
        *count += 1;
    }

    // Stable sort preserves first-seen order among equal counts
    ranked.sort_by(|a, b| counts[b].cmp(&counts[a]));
    ranked.truncate(cap);
    ranked
}

#[async_trait]
impl Strategy for ContentBasedFiltering {
    fn kind(&self) -> StrategyUsed {
        StrategyUsed::ContentBased
    }

    async fn generate(&self, ctx: &GenerationContext) -> AppResult<StrategyOutput> {
        let user = match &ctx.user {
            Some(user) => user,
            None => return Ok(StrategyOutput::empty()),
        };

        let downloaded_ids = self.interactions.downloads_by_user(user.id).await?;
        if downloaded_ids.is_empty() {
            return Ok(StrategyOutput::empty());
        }

        let history = self.catalog.by_ids(&downloaded_ids).await?;
        if history.is_empty() {
            return Ok(StrategyOutput::empty());
        }

        let preferred_keywords = top_by_frequency(
            history.iter().flat_map(|item| item.keywords.iter().cloned()),
            MAX_PREFERRED_KEYWORDS,
        );
        let preferred_difficulties = top_by_frequency(
            history.iter().map(|item| item.difficulty),
            MAX_PREFERRED_DIFFICULTIES,
        );

        if preferred_keywords.is_empty() {
            return Ok(StrategyOutput::empty());
        }

        tracing::debug!(
            user_id = %user.id,
            preferred_keywords = ?preferred_keywords,
            preferred_difficulties = ?preferred_difficulties,
            "Derived content preferences from history"
        );

        let matches = self
            .catalog
            .by_keywords(ctx.age_group, &preferred_keywords)
            .await?;

        let downloaded_set: HashSet<Uuid> = downloaded_ids.into_iter().collect();
        let keyword_set: HashSet<&String> = preferred_keywords.iter().collect();

        let candidates: Vec<Candidate> = matches
            .into_iter()
            .filter(|item| !downloaded_set.contains(&item.id))
            .map(|item| {
                let keyword_matches = item
                    .keywords
                    .iter()
                    .filter(|keyword| keyword_set.contains(keyword))
                    .count();

                let mut score = KEYWORD_MATCH_WEIGHT * keyword_matches as f64;
                if preferred_difficulties.contains(&item.difficulty) {
                    score += DIFFICULTY_MATCH_WEIGHT;
                }
                score += POPULARITY_WEIGHT * ((item.download_count as f64) + 1.0).log10();

                Candidate { item, score }
            })
            .collect();

        Ok(StrategyOutput {
            candidates,
            confidence: CONFIDENCE,
        })
    }
}
