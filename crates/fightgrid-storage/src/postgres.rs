//! Postgres-backed `FightStore` built on plain `sqlx::query` + `try_get`.
//! Unique-key violations (Postgres error code 23505) are mapped to
//! [`StoreError::UniqueViolation`] so overlapping sync runs can treat the
//! race as benign.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{QueryBuilder, Row};
use uuid::Uuid;

use fightgrid_core::{
    Event, EventDraft, EventKind, Fight, FightDraft, FightRecord, FightStatus, Fighter,
    FighterDraft, Gender, NewOrganization, NewRanking, Organization, Ranking, Stance, WeightClass,
};

use crate::{EventWithFightCount, FightStore, FighterFilter, StoreError};

const FIGHTER_COLS: &str = "id, external_id, external_uid, first_name, last_name, nickname, \
    image_url, nationality, date_of_birth, height_cm, reach_cm, weight_lbs, stance, gender, \
    wins, losses, draws, no_contests, wins_by_ko, wins_by_sub, wins_by_dec, weight_class, \
    active, organization_id";

const EVENT_COLS: &str =
    "id, external_id, external_uid, name, date, venue, city, country, kind, organization_id";

const FIGHT_COLS: &str = "id, external_id, external_uid, event_id, fighter1_id, fighter2_id, \
    weight_class, rounds, card_position, status, winner_id";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(sqlx::Error::Migrate(Box::new(e))))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return StoreError::UniqueViolation(db_err.message().to_string());
        }
    }
    StoreError::Database(err)
}

fn parse_enum<T>(
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
    what: &str,
) -> Result<T, StoreError> {
    parse(raw).ok_or_else(|| StoreError::InvalidValue(format!("{what}: {raw}")))
}

fn organization_from_row(row: &PgRow) -> Result<Organization, StoreError> {
    Ok(Organization {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        short_name: row.try_get("short_name")?,
        website: row.try_get("website")?,
        active: row.try_get("active")?,
    })
}

fn fighter_from_row(row: &PgRow) -> Result<Fighter, StoreError> {
    let stance: String = row.try_get("stance")?;
    let gender: String = row.try_get("gender")?;
    let weight_class: Option<String> = row.try_get("weight_class")?;
    Ok(Fighter {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        external_uid: row.try_get("external_uid")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        nickname: row.try_get("nickname")?,
        image_url: row.try_get("image_url")?,
        nationality: row.try_get("nationality")?,
        date_of_birth: row.try_get("date_of_birth")?,
        height_cm: row.try_get("height_cm")?,
        reach_cm: row.try_get("reach_cm")?,
        weight_lbs: row.try_get("weight_lbs")?,
        stance: parse_enum(&stance, Stance::parse, "stance")?,
        gender: parse_enum(&gender, Gender::parse, "gender")?,
        record: FightRecord {
            wins: row.try_get("wins")?,
            losses: row.try_get("losses")?,
            draws: row.try_get("draws")?,
            no_contests: row.try_get("no_contests")?,
            wins_by_ko: row.try_get("wins_by_ko")?,
            wins_by_sub: row.try_get("wins_by_sub")?,
            wins_by_dec: row.try_get("wins_by_dec")?,
        },
        weight_class: weight_class
            .map(|raw| parse_enum(&raw, WeightClass::parse, "weight class"))
            .transpose()?,
        active: row.try_get("active")?,
        organization_id: row.try_get("organization_id")?,
    })
}

fn event_from_row(row: &PgRow) -> Result<Event, StoreError> {
    let kind: String = row.try_get("kind")?;
    Ok(Event {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        external_uid: row.try_get("external_uid")?,
        name: row.try_get("name")?,
        date: row.try_get("date")?,
        venue: row.try_get("venue")?,
        city: row.try_get("city")?,
        country: row.try_get("country")?,
        kind: parse_enum(&kind, EventKind::parse, "event kind")?,
        organization_id: row.try_get("organization_id")?,
    })
}

fn fight_from_row(row: &PgRow) -> Result<Fight, StoreError> {
    let weight_class: String = row.try_get("weight_class")?;
    let status: String = row.try_get("status")?;
    Ok(Fight {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        external_uid: row.try_get("external_uid")?,
        event_id: row.try_get("event_id")?,
        fighter1_id: row.try_get("fighter1_id")?,
        fighter2_id: row.try_get("fighter2_id")?,
        weight_class: parse_enum(&weight_class, WeightClass::parse, "weight class")?,
        rounds: row.try_get("rounds")?,
        card_position: row.try_get("card_position")?,
        status: parse_enum(&status, FightStatus::parse, "fight status")?,
        winner_id: row.try_get("winner_id")?,
    })
}

fn ranking_from_row(row: &PgRow) -> Result<Ranking, StoreError> {
    let weight_class: String = row.try_get("weight_class")?;
    Ok(Ranking {
        id: row.try_get("id")?,
        fighter_id: row.try_get("fighter_id")?,
        organization_id: row.try_get("organization_id")?,
        weight_class: parse_enum(&weight_class, WeightClass::parse, "weight class")?,
        rank: row.try_get("rank")?,
        active: row.try_get("active")?,
        effective_date: row.try_get("effective_date")?,
    })
}

#[async_trait]
impl FightStore for PgStore {
    async fn organization_by_short_name(
        &self,
        short_name: &str,
    ) -> Result<Option<Organization>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, short_name, website, active FROM organizations \
             WHERE short_name = $1",
        )
        .bind(short_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        row.as_ref().map(organization_from_row).transpose()
    }

    async fn upsert_organization(
        &self,
        new: &NewOrganization,
    ) -> Result<Organization, StoreError> {
        let row = sqlx::query(
            "INSERT INTO organizations (id, name, short_name, website, active) \
             VALUES ($1, $2, $3, $4, TRUE) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id, name, short_name, website, active",
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.short_name)
        .bind(&new.website)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        organization_from_row(&row)
    }

    async fn fighter_by_external_id(
        &self,
        organization_id: Uuid,
        external_id: &str,
    ) -> Result<Option<Fighter>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {FIGHTER_COLS} FROM fighters WHERE organization_id = $1 AND external_id = $2"
        ))
        .bind(organization_id)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        row.as_ref().map(fighter_from_row).transpose()
    }

    async fn fighter_by_name_ci(
        &self,
        organization_id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<Fighter>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {FIGHTER_COLS} FROM fighters \
             WHERE organization_id = $1 AND lower(first_name) = lower($2) \
               AND lower(last_name) = lower($3)"
        ))
        .bind(organization_id)
        .bind(first_name)
        .bind(last_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        row.as_ref().map(fighter_from_row).transpose()
    }

    async fn fighters_by_last_name_prefix(
        &self,
        organization_id: Uuid,
        prefix: &str,
    ) -> Result<Vec<Fighter>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {FIGHTER_COLS} FROM fighters \
             WHERE organization_id = $1 AND last_name ILIKE $2"
        ))
        .bind(organization_id)
        .bind(format!("{prefix}%"))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        rows.iter().map(fighter_from_row).collect()
    }

    async fn fighters_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Fighter>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {FIGHTER_COLS} FROM fighters WHERE organization_id = $1"
        ))
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        rows.iter().map(fighter_from_row).collect()
    }

    async fn insert_fighter(
        &self,
        organization_id: Uuid,
        draft: &FighterDraft,
    ) -> Result<Fighter, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO fighters (id, external_id, external_uid, first_name, last_name, \
             nickname, image_url, nationality, date_of_birth, height_cm, reach_cm, weight_lbs, \
             stance, gender, wins, losses, draws, no_contests, wins_by_ko, wins_by_sub, \
             wins_by_dec, weight_class, active, organization_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, $22, TRUE, $23) \
             RETURNING {FIGHTER_COLS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&draft.external_id)
        .bind(&draft.external_uid)
        .bind(&draft.first_name)
        .bind(&draft.last_name)
        .bind(&draft.nickname)
        .bind(&draft.image_url)
        .bind(&draft.nationality)
        .bind(draft.date_of_birth)
        .bind(draft.height_cm)
        .bind(draft.reach_cm)
        .bind(draft.weight_lbs)
        .bind(draft.stance.as_str())
        .bind(draft.gender.as_str())
        .bind(draft.record.wins)
        .bind(draft.record.losses)
        .bind(draft.record.draws)
        .bind(draft.record.no_contests)
        .bind(draft.record.wins_by_ko)
        .bind(draft.record.wins_by_sub)
        .bind(draft.record.wins_by_dec)
        .bind(draft.weight_class.map(|wc| wc.as_str()))
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        fighter_from_row(&row)
    }

    async fn update_fighter(&self, id: Uuid, draft: &FighterDraft) -> Result<Fighter, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE fighters SET \
             first_name = $2, last_name = $3, nickname = $4, image_url = $5, nationality = $6, \
             date_of_birth = $7, height_cm = $8, reach_cm = $9, weight_lbs = $10, stance = $11, \
             gender = $12, wins = $13, losses = $14, draws = $15, no_contests = $16, \
             wins_by_ko = $17, wins_by_sub = $18, wins_by_dec = $19, \
             weight_class = COALESCE($20, weight_class), \
             external_uid = COALESCE($21, external_uid) \
             WHERE id = $1 RETURNING {FIGHTER_COLS}"
        ))
        .bind(id)
        .bind(&draft.first_name)
        .bind(&draft.last_name)
        .bind(&draft.nickname)
        .bind(&draft.image_url)
        .bind(&draft.nationality)
        .bind(draft.date_of_birth)
        .bind(draft.height_cm)
        .bind(draft.reach_cm)
        .bind(draft.weight_lbs)
        .bind(draft.stance.as_str())
        .bind(draft.gender.as_str())
        .bind(draft.record.wins)
        .bind(draft.record.losses)
        .bind(draft.record.draws)
        .bind(draft.record.no_contests)
        .bind(draft.record.wins_by_ko)
        .bind(draft.record.wins_by_sub)
        .bind(draft.record.wins_by_dec)
        .bind(draft.weight_class.map(|wc| wc.as_str()))
        .bind(&draft.external_uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        let row = row.ok_or_else(|| StoreError::NotFound(format!("fighter {id}")))?;
        fighter_from_row(&row)
    }

    async fn set_fighter_external_id(
        &self,
        id: Uuid,
        external_id: &str,
        external_uid: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE fighters SET external_id = $2, \
             external_uid = COALESCE($3, external_uid) WHERE id = $1",
        )
        .bind(id)
        .bind(external_id)
        .bind(external_uid)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("fighter {id}")));
        }
        Ok(())
    }

    async fn set_fighters_weight_class(
        &self,
        ids: &[Uuid],
        weight_class: WeightClass,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE fighters SET weight_class = $1 WHERE id = ANY($2)")
            .bind(weight_class.as_str())
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn search_fighters(&self, filter: &FighterFilter) -> Result<Vec<Fighter>, StoreError> {
        let mut qb = QueryBuilder::<sqlx::Postgres>::new(format!(
            "SELECT {FIGHTER_COLS} FROM fighters WHERE active = TRUE"
        ));
        if let Some(organization_id) = filter.organization_id {
            qb.push(" AND organization_id = ").push_bind(organization_id);
        }
        if let Some(gender) = filter.gender {
            qb.push(" AND gender = ").push_bind(gender.as_str());
        }
        if let Some(weight_class) = filter.weight_class {
            qb.push(" AND weight_class = ").push_bind(weight_class.as_str());
        }
        if let Some(search) = filter.search.as_deref() {
            let pattern = format!("%{search}%");
            qb.push(" AND (first_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR last_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR nickname ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY lower(last_name), lower(first_name) LIMIT ")
            .push_bind(filter.limit.max(0))
            .push(" OFFSET ")
            .push_bind(filter.offset.max(0));
        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        rows.iter().map(fighter_from_row).collect()
    }

    async fn event_by_external_id(
        &self,
        organization_id: Uuid,
        external_id: &str,
    ) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLS} FROM events WHERE organization_id = $1 AND external_id = $2"
        ))
        .bind(organization_id)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn event_by_name(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLS} FROM events WHERE organization_id = $1 AND name = $2"
        ))
        .bind(organization_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn insert_event(
        &self,
        organization_id: Uuid,
        draft: &EventDraft,
    ) -> Result<Event, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO events (id, external_id, external_uid, name, date, venue, city, \
             country, kind, organization_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {EVENT_COLS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&draft.external_id)
        .bind(&draft.external_uid)
        .bind(&draft.name)
        .bind(draft.date)
        .bind(&draft.venue)
        .bind(&draft.city)
        .bind(&draft.country)
        .bind(draft.kind.as_str())
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        event_from_row(&row)
    }

    async fn update_event(&self, id: Uuid, draft: &EventDraft) -> Result<Event, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE events SET name = $2, date = $3, venue = $4, city = $5, country = $6, \
             kind = $7, external_id = COALESCE($8, external_id), \
             external_uid = COALESCE($9, external_uid) \
             WHERE id = $1 RETURNING {EVENT_COLS}"
        ))
        .bind(id)
        .bind(&draft.name)
        .bind(draft.date)
        .bind(&draft.venue)
        .bind(&draft.city)
        .bind(&draft.country)
        .bind(draft.kind.as_str())
        .bind(&draft.external_id)
        .bind(&draft.external_uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        let row = row.ok_or_else(|| StoreError::NotFound(format!("event {id}")))?;
        event_from_row(&row)
    }

    async fn upcoming_events(
        &self,
        after: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<EventWithFightCount>, StoreError> {
        let rows = sqlx::query(
            "SELECT e.id, e.external_id, e.external_uid, e.name, e.date, e.venue, e.city, \
             e.country, e.kind, e.organization_id, COUNT(f.id)::BIGINT AS fight_count \
             FROM events e LEFT JOIN fights f ON f.event_id = e.id \
             WHERE e.date >= $1 \
             GROUP BY e.id \
             ORDER BY e.date ASC LIMIT $2",
        )
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        rows.iter()
            .map(|row| {
                Ok(EventWithFightCount {
                    event: event_from_row(row)?,
                    fight_count: row.try_get("fight_count")?,
                })
            })
            .collect()
    }

    async fn fight_by_external_id(&self, external_id: &str) -> Result<Option<Fight>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {FIGHT_COLS} FROM fights WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        row.as_ref().map(fight_from_row).transpose()
    }

    async fn fight_by_pair(
        &self,
        event_id: Uuid,
        fighter_a: Uuid,
        fighter_b: Uuid,
    ) -> Result<Option<Fight>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {FIGHT_COLS} FROM fights WHERE event_id = $1 \
             AND ((fighter1_id = $2 AND fighter2_id = $3) \
               OR (fighter1_id = $3 AND fighter2_id = $2))"
        ))
        .bind(event_id)
        .bind(fighter_a)
        .bind(fighter_b)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        row.as_ref().map(fight_from_row).transpose()
    }

    async fn insert_fight(&self, draft: &FightDraft) -> Result<Fight, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO fights (id, external_id, external_uid, event_id, fighter1_id, \
             fighter2_id, weight_class, rounds, card_position, status, winner_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {FIGHT_COLS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&draft.external_id)
        .bind(&draft.external_uid)
        .bind(draft.event_id)
        .bind(draft.fighter1_id)
        .bind(draft.fighter2_id)
        .bind(draft.weight_class.as_str())
        .bind(draft.rounds)
        .bind(draft.card_position)
        .bind(draft.status.as_str())
        .bind(draft.winner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        fight_from_row(&row)
    }

    async fn update_fight(&self, id: Uuid, draft: &FightDraft) -> Result<Fight, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE fights SET weight_class = $2, rounds = $3, card_position = $4, \
             status = $5, winner_id = $6, external_id = COALESCE($7, external_id), \
             external_uid = COALESCE($8, external_uid) \
             WHERE id = $1 RETURNING {FIGHT_COLS}"
        ))
        .bind(id)
        .bind(draft.weight_class.as_str())
        .bind(draft.rounds)
        .bind(draft.card_position)
        .bind(draft.status.as_str())
        .bind(draft.winner_id)
        .bind(&draft.external_id)
        .bind(&draft.external_uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        let row = row.ok_or_else(|| StoreError::NotFound(format!("fight {id}")))?;
        fight_from_row(&row)
    }

    async fn fights_for_event(&self, event_id: Uuid) -> Result<Vec<Fight>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {FIGHT_COLS} FROM fights WHERE event_id = $1 ORDER BY card_position"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        rows.iter().map(fight_from_row).collect()
    }

    async fn delete_active_rankings(&self, organization_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM rankings WHERE organization_id = $1 AND active")
            .bind(organization_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected())
    }

    async fn upsert_ranking(&self, ranking: &NewRanking) -> Result<Ranking, StoreError> {
        let row = sqlx::query(
            "INSERT INTO rankings (id, fighter_id, organization_id, weight_class, rank, \
             active, effective_date) VALUES ($1, $2, $3, $4, $5, TRUE, NOW()) \
             ON CONFLICT (fighter_id, organization_id, weight_class) WHERE active \
             DO UPDATE SET rank = EXCLUDED.rank, effective_date = NOW() \
             RETURNING id, fighter_id, organization_id, weight_class, rank, active, \
             effective_date",
        )
        .bind(Uuid::new_v4())
        .bind(ranking.fighter_id)
        .bind(ranking.organization_id)
        .bind(ranking.weight_class.as_str())
        .bind(ranking.rank)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        ranking_from_row(&row)
    }

    async fn active_rankings(&self, organization_id: Uuid) -> Result<Vec<Ranking>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, fighter_id, organization_id, weight_class, rank, active, \
             effective_date FROM rankings WHERE organization_id = $1 AND active \
             ORDER BY weight_class, rank",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        rows.iter().map(ranking_from_row).collect()
    }
}
