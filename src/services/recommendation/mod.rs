use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::Cache;
use crate::error::{AppError, AppResult};
use crate::models::{
    AgeGroup, ContentItem, RecommendationRequest, RecommendationResponse, ResponseMetadata,
    StrategyUsed, User,
};
use crate::services::store::{CatalogStore, InteractionLog, UserStore};

pub mod collaborative;
pub mod content_based;
pub mod filters;
pub mod popularity;
pub mod ranking;

pub use collaborative::CollaborativeFiltering;
pub use content_based::ContentBasedFiltering;
pub use popularity::{HybridPopularity, JitterSource, ThreadRngJitter};

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

/// A content item with its generator-assigned score, pre-filtering
#[derive(Debug, Clone)]
pub struct Candidate {
    pub item: ContentItem,
    pub score: f64,
}

/// What a candidate generator produced for one request
#[derive(Debug, Clone)]
pub struct StrategyOutput {
    pub candidates: Vec<Candidate>,
    pub confidence: f64,
}

impl StrategyOutput {
    /// Zero candidates; the confidence is never surfaced for empty output
    pub fn empty() -> Self {
        Self {
            candidates: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// Per-request inputs shared by every generator
#[derive(Debug, Clone)]
pub struct GenerationContext {
    /// Resolved account record when the request carried a user id
    pub user: Option<User>,
    /// Target age group: the request override, else the user's declared group
    pub age_group: Option<AgeGroup>,
}

/// A candidate generator
///
/// Generators emit their own confidence alongside their candidates; the
/// selector passes the winner's value through unchanged. Returning zero
/// candidates is the signal to fall through to the next strategy, never an
/// error.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyUsed;

    async fn generate(&self, ctx: &GenerationContext) -> AppResult<StrategyOutput>;
}

/// Tiered recommendation pipeline
///
/// Strategies are tried strictly in order; the first one returning at least
/// one candidate wins and its output is filtered, ranked and truncated.
/// Generator failures and timeouts degrade to the next tier instead of
/// failing the request; only a failing popularity fallback surfaces an error.
pub struct RecommendationService {
    users: Arc<dyn UserStore>,
    interactions: Arc<dyn InteractionLog>,
    collaborative: Arc<dyn Strategy>,
    content_based: Arc<dyn Strategy>,
    popularity: Arc<dyn Strategy>,
    generator_timeout: Duration,
}

impl RecommendationService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        interactions: Arc<dyn InteractionLog>,
        users: Arc<dyn UserStore>,
        cache: Option<Cache>,
        jitter: Arc<dyn JitterSource>,
        generator_timeout: Duration,
    ) -> Self {
        let collaborative = Arc::new(CollaborativeFiltering::new(
            Arc::clone(&catalog),
            Arc::clone(&interactions),
        ));
        let content_based = Arc::new(ContentBasedFiltering::new(
            Arc::clone(&catalog),
            Arc::clone(&interactions),
        ));
        let popularity = Arc::new(HybridPopularity::new(catalog, cache, jitter));

        Self {
            users,
            interactions,
            collaborative,
            content_based,
            popularity,
            generator_timeout,
        }
    }

    pub async fn recommend(
        &self,
        request: RecommendationRequest,
    ) -> AppResult<RecommendationResponse> {
        let start = Instant::now();

        let limit = match request.limit {
            None => DEFAULT_LIMIT,
            Some(limit) if (1..=MAX_LIMIT).contains(&limit) => limit,
            Some(limit) => {
                return Err(AppError::InvalidRequest(format!(
                    "limit must be between 1 and {}, got {}",
                    MAX_LIMIT, limit
                )))
            }
        };

        let user = match request.user_id {
            Some(user_id) => Some(
                self.users
                    .by_id(user_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("user {} not found", user_id)))?,
            ),
            None => None,
        };

        let age_group = request
            .age_group
            .or_else(|| user.as_ref().and_then(|u| u.age_group));
        let ctx = GenerationContext { user, age_group };

        let (kind, output) = self.select(&ctx).await?;
        let strategy_used = self.tag_for(kind, &ctx);
        let total_candidates = output.candidates.len();

        let mut candidates = output.candidates;

        if request.exclude_downloaded {
            if let Some(user) = &ctx.user {
                // Fresh lookup: the winning generator may not have needed the
                // full history
                let downloaded: HashSet<Uuid> = self
                    .interactions
                    .downloads_by_user(user.id)
                    .await?
                    .into_iter()
                    .collect();
                candidates = filters::drop_downloaded(candidates, &downloaded);
            }
        }

        if let Some(preferences) = &request.preferences {
            candidates = filters::apply_preferences(candidates, preferences);
        }

        let items = ranking::finalize(candidates, limit);
        let processing_time_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            strategy = %strategy_used,
            total_candidates,
            returned = items.len(),
            confidence = output.confidence,
            processing_time_ms,
            "Recommendation completed"
        );

        Ok(RecommendationResponse {
            items,
            strategy_used,
            confidence: output.confidence,
            metadata: ResponseMetadata {
                total_candidates,
                processing_time_ms,
            },
        })
    }

    /// Runs the try-then-fallback tier list for this request
    ///
    /// Anonymous requests go straight to popularity. Personalized requests
    /// try collaborative, then content-based, then popularity, stopping at
    /// the first non-empty result. A strategy that errors or times out counts
    /// as empty; if nothing wins and the fallback itself failed, the store is
    /// effectively unreachable and the call fails.
    async fn select(&self, ctx: &GenerationContext) -> AppResult<(StrategyUsed, StrategyOutput)> {
        let attempts: Vec<&Arc<dyn Strategy>> = if ctx.user.is_some() {
            vec![&self.collaborative, &self.content_based, &self.popularity]
        } else {
            vec![&self.popularity]
        };

        let mut empty_success: Option<(StrategyUsed, StrategyOutput)> = None;
        let mut fallback_failed = false;

        for strategy in attempts {
            let kind = strategy.kind();

            match tokio::time::timeout(self.generator_timeout, strategy.generate(ctx)).await {
                Ok(Ok(output)) => {
                    if output.candidates.is_empty() {
                        tracing::debug!(strategy = %kind, "Generator produced no candidates");
                        empty_success = Some((kind, output));
                        continue;
                    }
                    return Ok((kind, output));
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        strategy = %kind,
                        error = %e,
                        "Generator failed, treating as zero candidates"
                    );
                    if kind == StrategyUsed::Hybrid {
                        fallback_failed = true;
                    }
                }
                Err(_) => {
                    tracing::warn!(
                        strategy = %kind,
                        timeout_ms = self.generator_timeout.as_millis() as u64,
                        "Generator timed out, treating as zero candidates"
                    );
                    if kind == StrategyUsed::Hybrid {
                        fallback_failed = true;
                    }
                }
            }
        }

        if fallback_failed {
            return Err(AppError::StrategiesExhausted);
        }

        // Every tier ran clean but nothing produced candidates; the last
        // clean output (the fallback, when it ran) carries the tag and
        // confidence for an empty result
        empty_success.ok_or(AppError::StrategiesExhausted)
    }

    /// The popularity engine reports as plain hybrid; anonymous age-scoped
    /// requests are surfaced under their own tag
    fn tag_for(&self, kind: StrategyUsed, ctx: &GenerationContext) -> StrategyUsed {
        if kind == StrategyUsed::Hybrid && ctx.user.is_none() && ctx.age_group.is_some() {
            StrategyUsed::AgeBasedPopularity
        } else {
            kind
        }
    }
}
