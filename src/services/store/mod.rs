use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{AgeGroup, ContentItem, User};

pub mod postgres;

pub use postgres::PgCatalogStore;
pub use postgres::PgInteractionLog;
pub use postgres::PgUserStore;

/// Read-only queries against the content catalog
///
/// The catalog is an external collaborator: simple equality/range predicates
/// plus a sort, nothing more. Implementations must never leak their own row
/// or driver types to callers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Items ordered by download count descending, optionally scoped to an
    /// age group.
    async fn most_downloaded(
        &self,
        age_group: Option<AgeGroup>,
        limit: i64,
    ) -> AppResult<Vec<ContentItem>>;

    /// Full records for the given item ids. Unknown ids are skipped.
    async fn by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<ContentItem>>;

    /// Items whose keyword set overlaps any of `keywords`, optionally scoped
    /// to an age group.
    async fn by_keywords(
        &self,
        age_group: Option<AgeGroup>,
        keywords: &[String],
    ) -> AppResult<Vec<ContentItem>>;

    /// Case-insensitive character-name search for catalog browsing.
    async fn search(&self, query: &str) -> AppResult<Vec<ContentItem>>;
}

/// Read-only queries against the append-only download log
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InteractionLog: Send + Sync {
    /// Ids of every item the user has downloaded.
    async fn downloads_by_user(&self, user_id: Uuid) -> AppResult<Vec<Uuid>>;

    /// Ids of every user who downloaded the item.
    async fn downloaders_of_item(&self, item_id: Uuid) -> AppResult<Vec<Uuid>>;
}

/// Account lookups, owned by the account subsystem
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn by_id(&self, user_id: Uuid) -> AppResult<Option<User>>;
}
