use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::StrategyUsed;
use crate::services::store::{CatalogStore, InteractionLog};

use super::{Candidate, GenerationContext, Strategy, StrategyOutput};

/// Minimum shared downloads before another user counts as similar.
/// A single shared item is too weak a signal when that item is broadly
/// popular.
const MIN_SHARED_DOWNLOADS: usize = 2;
/// Cap on similar users contributing candidates; also the denominator of the
/// confidence estimate
const MAX_SIMILAR_USERS: usize = 10;

/// Recommends items downloaded by users with overlapping download history
///
/// Similarity is co-occurrence: how many items two users have both
/// downloaded. Candidates score one point per similar user who downloaded
/// them, so broadly shared items rank first.
pub struct CollaborativeFiltering {
    catalog: Arc<dyn CatalogStore>,
    interactions: Arc<dyn InteractionLog>,
}

impl CollaborativeFiltering {
    pub fn new(catalog: Arc<dyn CatalogStore>, interactions: Arc<dyn InteractionLog>) -> Self {
        Self {
            catalog,
            interactions,
        }
    }

    /// Counts, per other user, how many of `downloaded` they also downloaded
    ///
    /// The per-item downloader lookups are independent reads and are issued
    /// concurrently, then joined before counting.
    async fn co_occurrence_counts(
        &self,
        user_id: Uuid,
        downloaded: &[Uuid],
    ) -> AppResult<HashMap<Uuid, usize>> {
        let mut tasks = Vec::new();

        for item_id in downloaded {
            let interactions = Arc::clone(&self.interactions);
            let item_id = *item_id;
            tasks.push(tokio::spawn(async move {
                interactions.downloaders_of_item(item_id).await
            }));
        }

        let mut counts: HashMap<Uuid, usize> = HashMap::new();
        let mut errors = 0usize;

        for task in tasks {
            match task.await {
                Ok(Ok(downloaders)) => {
                    for other in downloaders {
                        if other != user_id {
                            *counts.entry(other).or_insert(0) += 1;
                        }
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Downloader lookup failed");
                    errors += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Downloader lookup task failed");
                    errors += 1;
                }
            }
        }

        if counts.is_empty() && errors > 0 {
            return Err(AppError::Internal(
                "All downloader lookups failed".to_string(),
            ));
        }

        Ok(counts)
    }

    /// How many similar users downloaded each item outside the requester's
    /// own history; one point per similar user
    async fn occurrence_counts(
        &self,
        similar_users: &[(Uuid, usize)],
        already_downloaded: &HashSet<Uuid>,
    ) -> AppResult<HashMap<Uuid, usize>> {
        let mut tasks = Vec::new();

        for (similar_id, _) in similar_users {
            let interactions = Arc::clone(&self.interactions);
            let similar_id = *similar_id;
            tasks.push(tokio::spawn(async move {
                interactions.downloads_by_user(similar_id).await
            }));
        }

        let mut counts: HashMap<Uuid, usize> = HashMap::new();
        let mut errors = 0usize;

        for task in tasks {
            match task.await {
                Ok(Ok(items)) => {
                    // A user's downloads are distinct, so this is at most one
                    // point per similar user per item
                    for item_id in items {
                        if !already_downloaded.contains(&item_id) {
                            *counts.entry(item_id).or_insert(0) += 1;
                        }
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Similar-user download lookup failed");
                    errors += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Similar-user download lookup task failed");
                    errors += 1;
                }
            }
        }

        if counts.is_empty() && errors > 0 {
            return Err(AppError::Internal(
                "All similar-user download lookups failed".to_string(),
            ));
        }

        Ok(counts)
    }
}

#[async_trait]
impl Strategy for CollaborativeFiltering {
    fn kind(&self) -> StrategyUsed {
        StrategyUsed::CollaborativeFiltering
    }

    async fn generate(&self, ctx: &GenerationContext) -> AppResult<StrategyOutput> {
        let user = match &ctx.user {
            Some(user) => user,
            None => return Ok(StrategyOutput::empty()),
        };

        let downloaded = self.interactions.downloads_by_user(user.id).await?;
        if downloaded.is_empty() {
            // No basis for similarity; the selector decides what runs next
            return Ok(StrategyOutput::empty());
        }

        let co_occurrence = self.co_occurrence_counts(user.id, &downloaded).await?;

        let mut similar_users: Vec<(Uuid, usize)> = co_occurrence
            .into_iter()
            .filter(|(_, count)| *count >= MIN_SHARED_DOWNLOADS)
            .collect();
        similar_users.sort_by(|a, b| b.1.cmp(&a.1));
        similar_users.truncate(MAX_SIMILAR_USERS);

        if similar_users.is_empty() {
            return Ok(StrategyOutput::empty());
        }

        tracing::debug!(
            user_id = %user.id,
            similar_users = similar_users.len(),
            "Found similar users by download overlap"
        );

        let downloaded_set: HashSet<Uuid> = downloaded.into_iter().collect();
        let occurrences = self
            .occurrence_counts(&similar_users, &downloaded_set)
            .await?;

        let confidence = (similar_users.len() as f64 / MAX_SIMILAR_USERS as f64).min(1.0);

        if occurrences.is_empty() {
            return Ok(StrategyOutput::empty());
        }

        let candidate_ids: Vec<Uuid> = occurrences.keys().copied().collect();
        let records = self.catalog.by_ids(&candidate_ids).await?;

        let candidates: Vec<Candidate> = records
            .into_iter()
            .filter(|item| ctx.age_group.map_or(true, |group| item.age_group == group))
            .map(|item| {
                let score = occurrences.get(&item.id).copied().unwrap_or(0) as f64;
                Candidate { item, score }
            })
            .collect();

        Ok(StrategyOutput {
            candidates,
            confidence,
        })
    }
}
