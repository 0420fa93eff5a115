//! Storage contracts for Fightgrid: the `FightStore` trait plus the Postgres
//! and in-memory implementations.
//!
//! The sync pipeline only ever talks to `dyn FightStore`. Unique-key races
//! between overlapping runs surface as [`StoreError::UniqueViolation`] so the
//! orchestrator can treat them as "already exists" instead of failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use fightgrid_core::{
    Event, EventDraft, Fight, FightDraft, Fighter, FighterDraft, Gender, NewOrganization,
    NewRanking, Organization, Ranking, WeightClass,
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const CRATE_NAME: &str = "fightgrid-storage";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("row not found: {0}")]
    NotFound(String),
    #[error("unexpected stored value: {0}")]
    InvalidValue(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Listing filter for the fighter read endpoint.
#[derive(Debug, Clone, Default)]
pub struct FighterFilter {
    pub organization_id: Option<Uuid>,
    pub search: Option<String>,
    pub gender: Option<Gender>,
    pub weight_class: Option<WeightClass>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct EventWithFightCount {
    pub event: Event,
    pub fight_count: i64,
}

/// Relational storage as seen by the sync core: upsert-by-unique-key,
/// find-by-filter, delete-by-filter, and atomic creates that raise a
/// distinguishable unique-violation signal.
#[async_trait]
pub trait FightStore: Send + Sync {
    async fn organization_by_short_name(
        &self,
        short_name: &str,
    ) -> Result<Option<Organization>, StoreError>;

    /// Create-or-fetch by unique name. The stored row wins on conflict.
    async fn upsert_organization(&self, new: &NewOrganization)
        -> Result<Organization, StoreError>;

    async fn fighter_by_external_id(
        &self,
        organization_id: Uuid,
        external_id: &str,
    ) -> Result<Option<Fighter>, StoreError>;

    /// Exact case-insensitive match on the stored first/last name.
    async fn fighter_by_name_ci(
        &self,
        organization_id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<Fighter>, StoreError>;

    /// Cheap candidate pre-filter: stored last name starts with `prefix`,
    /// case-insensitively.
    async fn fighters_by_last_name_prefix(
        &self,
        organization_id: Uuid,
        prefix: &str,
    ) -> Result<Vec<Fighter>, StoreError>;

    async fn fighters_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Fighter>, StoreError>;

    async fn insert_fighter(
        &self,
        organization_id: Uuid,
        draft: &FighterDraft,
    ) -> Result<Fighter, StoreError>;

    /// Refresh the mutable fields of an existing row. The classification is
    /// only overwritten when the draft carries one.
    async fn update_fighter(&self, id: Uuid, draft: &FighterDraft) -> Result<Fighter, StoreError>;

    async fn set_fighter_external_id(
        &self,
        id: Uuid,
        external_id: &str,
        external_uid: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn set_fighters_weight_class(
        &self,
        ids: &[Uuid],
        weight_class: WeightClass,
    ) -> Result<(), StoreError>;

    async fn search_fighters(&self, filter: &FighterFilter) -> Result<Vec<Fighter>, StoreError>;

    async fn event_by_external_id(
        &self,
        organization_id: Uuid,
        external_id: &str,
    ) -> Result<Option<Event>, StoreError>;

    async fn event_by_name(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> Result<Option<Event>, StoreError>;

    async fn insert_event(
        &self,
        organization_id: Uuid,
        draft: &EventDraft,
    ) -> Result<Event, StoreError>;

    async fn update_event(&self, id: Uuid, draft: &EventDraft) -> Result<Event, StoreError>;

    async fn upcoming_events(
        &self,
        after: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<EventWithFightCount>, StoreError>;

    async fn fight_by_external_id(&self, external_id: &str) -> Result<Option<Fight>, StoreError>;

    /// Fallback fight identity: unordered fighter pair within an event.
    async fn fight_by_pair(
        &self,
        event_id: Uuid,
        fighter_a: Uuid,
        fighter_b: Uuid,
    ) -> Result<Option<Fight>, StoreError>;

    async fn insert_fight(&self, draft: &FightDraft) -> Result<Fight, StoreError>;

    async fn update_fight(&self, id: Uuid, draft: &FightDraft) -> Result<Fight, StoreError>;

    async fn fights_for_event(&self, event_id: Uuid) -> Result<Vec<Fight>, StoreError>;

    async fn delete_active_rankings(&self, organization_id: Uuid) -> Result<u64, StoreError>;

    /// At most one active row per (fighter, organization, weight class);
    /// an existing row has its rank and effective date refreshed.
    async fn upsert_ranking(&self, ranking: &NewRanking) -> Result<Ranking, StoreError>;

    async fn active_rankings(&self, organization_id: Uuid) -> Result<Vec<Ranking>, StoreError>;
}
