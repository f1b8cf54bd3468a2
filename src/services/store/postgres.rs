use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{AgeGroup, ContentItem, Preferences, User};

use super::{CatalogStore, InteractionLog, UserStore};

const CONTENT_COLUMNS: &str =
    "id, character_name, keywords, difficulty, age_group, download_count";

/// Raw catalog row; difficulty and age group are stored as text
#[derive(sqlx::FromRow)]
struct ContentRow {
    id: Uuid,
    character_name: String,
    keywords: Vec<String>,
    difficulty: String,
    age_group: String,
    download_count: i64,
}

impl TryFrom<ContentRow> for ContentItem {
    type Error = AppError;

    fn try_from(row: ContentRow) -> Result<Self, Self::Error> {
        Ok(ContentItem {
            id: row.id,
            character_name: row.character_name,
            keywords: row.keywords,
            difficulty: row.difficulty.parse().map_err(AppError::Internal)?,
            age_group: row.age_group.parse().map_err(AppError::Internal)?,
            download_count: row.download_count,
        })
    }
}

fn convert_rows(rows: Vec<ContentRow>) -> AppResult<Vec<ContentItem>> {
    rows.into_iter().map(ContentItem::try_from).collect()
}

/// Catalog accessor backed by the `content_items` table
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn most_downloaded(
        &self,
        age_group: Option<AgeGroup>,
        limit: i64,
    ) -> AppResult<Vec<ContentItem>> {
        let sql = format!(
            "SELECT {CONTENT_COLUMNS} FROM content_items \
             WHERE $1::text IS NULL OR age_group = $1 \
             ORDER BY download_count DESC LIMIT $2"
        );

        let rows: Vec<ContentRow> = sqlx::query_as(&sql)
            .bind(age_group.map(|g| g.as_str()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        convert_rows(rows)
    }

    async fn by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<ContentItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT {CONTENT_COLUMNS} FROM content_items WHERE id = ANY($1)");

        let rows: Vec<ContentRow> = sqlx::query_as(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;

        convert_rows(rows)
    }

    async fn by_keywords(
        &self,
        age_group: Option<AgeGroup>,
        keywords: &[String],
    ) -> AppResult<Vec<ContentItem>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {CONTENT_COLUMNS} FROM content_items \
             WHERE ($1::text IS NULL OR age_group = $1) AND keywords && $2"
        );

        let rows: Vec<ContentRow> = sqlx::query_as(&sql)
            .bind(age_group.map(|g| g.as_str()))
            .bind(keywords.to_vec())
            .fetch_all(&self.pool)
            .await?;

        convert_rows(rows)
    }

    async fn search(&self, query: &str) -> AppResult<Vec<ContentItem>> {
        let sql = format!(
            "SELECT {CONTENT_COLUMNS} FROM content_items \
             WHERE character_name ILIKE $1 \
             ORDER BY download_count DESC LIMIT 50"
        );

        let rows: Vec<ContentRow> = sqlx::query_as(&sql)
            .bind(format!("%{}%", query))
            .fetch_all(&self.pool)
            .await?;

        convert_rows(rows)
    }
}

/// Download-log accessor backed by the `downloads` table
pub struct PgInteractionLog {
    pool: PgPool,
}

impl PgInteractionLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InteractionLog for PgInteractionLog {
    async fn downloads_by_user(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT item_id FROM downloads WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn downloaders_of_item(&self, item_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT user_id FROM downloads WHERE item_id = $1",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

/// Raw account row; preference columns are nullable text arrays
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    age_group: Option<String>,
    preferred_characters: Option<Vec<String>>,
    preferred_difficulties: Option<Vec<String>>,
    preferred_keywords: Option<Vec<String>>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let age_group = row
            .age_group
            .map(|g| g.parse().map_err(AppError::Internal))
            .transpose()?;

        let difficulties = row
            .preferred_difficulties
            .map(|values| {
                values
                    .into_iter()
                    .map(|d| d.parse().map_err(AppError::Internal))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let preferences = if row.preferred_characters.is_none()
            && difficulties.is_none()
            && row.preferred_keywords.is_none()
        {
            None
        } else {
            Some(Preferences {
                characters: row.preferred_characters,
                difficulties,
                keywords: row.preferred_keywords,
            })
        };

        Ok(User {
            id: row.id,
            age_group,
            preferences,
        })
    }
}

/// Account accessor backed by the `users` table
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, age_group, preferred_characters, preferred_difficulties, \
             preferred_keywords FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }
}
