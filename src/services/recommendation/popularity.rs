use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;

use crate::cached;
use crate::db::{Cache, CacheKey};
use crate::error::AppResult;
use crate::models::{AgeGroup, ContentItem, StrategyUsed};
use crate::services::store::CatalogStore;

use super::{Candidate, GenerationContext, Strategy, StrategyOutput};

/// Raw candidate pool pulled from the download-ranked catalog slice
const MAX_RAW_CANDIDATES: i64 = 40;
/// Popularity dominates the score; jitter perturbs ties and near-ties so
/// repeated calls give catalog breadth some exposure
const DOWNLOAD_WEIGHT: f64 = 0.7;
const JITTER_WEIGHT: f64 = 0.3;
/// Heuristic confidence constants; global popularity carries the least
/// evidence, an age-scoped slice slightly more
const CONFIDENCE_PERSONALIZED_FALLBACK: f64 = 0.6;
const CONFIDENCE_AGE_SCOPED: f64 = 0.7;
const CONFIDENCE_GLOBAL: f64 = 0.5;
const POPULAR_CACHE_TTL: u64 = 300; // 5 minutes

/// Source of uniform draws in [0, 1)
///
/// Injected so tests can pin the jitter and assert on the deterministic
/// popularity component of the score.
pub trait JitterSource: Send + Sync {
    fn draw(&self) -> f64;
}

/// Production jitter backed by the thread-local RNG
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn draw(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Fallback generator blending download popularity with random jitter
///
/// Always available: it only needs the catalog. The download-ranked slice is
/// served through the redis cache when one is configured; jitter is applied
/// per call on top of the cached slice, so caching never freezes the ranking.
pub struct HybridPopularity {
    catalog: Arc<dyn CatalogStore>,
    cache: Option<Cache>,
    jitter: Arc<dyn JitterSource>,
}

impl HybridPopularity {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        cache: Option<Cache>,
        jitter: Arc<dyn JitterSource>,
    ) -> Self {
        Self {
            catalog,
            cache,
            jitter,
        }
    }

    async fn raw_candidates(&self, age_group: Option<AgeGroup>) -> AppResult<Vec<ContentItem>> {
        match &self.cache {
            Some(cache) => {
                let key = CacheKey::Popular(age_group);
                cached!(
                    cache,
                    key,
                    POPULAR_CACHE_TTL,
                    self.catalog.most_downloaded(age_group, MAX_RAW_CANDIDATES)
                )
            }
            None => {
                self.catalog
                    .most_downloaded(age_group, MAX_RAW_CANDIDATES)
                    .await
            }
        }
    }
}

#[async_trait]
impl Strategy for HybridPopularity {
    fn kind(&self) -> StrategyUsed {
        StrategyUsed::Hybrid
    }

    async fn generate(&self, ctx: &GenerationContext) -> AppResult<StrategyOutput> {
        let items = self.raw_candidates(ctx.age_group).await?;

        tracing::debug!(
            age_group = ?ctx.age_group,
            raw_count = items.len(),
            "Popularity candidates fetched"
        );

        let candidates: Vec<Candidate> = items
            .into_iter()
            .map(|item| {
                let score = item.download_count as f64 * DOWNLOAD_WEIGHT
                    + self.jitter.draw() * JITTER_WEIGHT;
                Candidate { item, score }
            })
            .collect();

        let confidence = match (&ctx.user, ctx.age_group) {
            (Some(_), _) => CONFIDENCE_PERSONALIZED_FALLBACK,
            (None, Some(_)) => CONFIDENCE_AGE_SCOPED,
            (None, None) => CONFIDENCE_GLOBAL,
        };

        Ok(StrategyOutput {
            candidates,
            confidence,
        })
    }
}
