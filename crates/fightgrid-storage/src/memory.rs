//! In-memory `FightStore` used by tests and local experimentation. Mirrors
//! the Postgres implementation's unique-key behavior, including the
//! distinguishable unique-violation signal.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use fightgrid_core::{
    Event, EventDraft, Fight, FightDraft, Fighter, FighterDraft, NewOrganization, NewRanking,
    Organization, Ranking, WeightClass,
};

use crate::{EventWithFightCount, FightStore, FighterFilter, StoreError};

#[derive(Debug, Default)]
struct Inner {
    organizations: Vec<Organization>,
    fighters: Vec<Fighter>,
    events: Vec<Event>,
    fights: Vec<Fight>,
    rankings: Vec<Ranking>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_fighter_draft(fighter: &mut Fighter, draft: &FighterDraft) {
    fighter.first_name = draft.first_name.clone();
    fighter.last_name = draft.last_name.clone();
    fighter.nickname = draft.nickname.clone();
    fighter.image_url = draft.image_url.clone();
    fighter.nationality = draft.nationality.clone();
    fighter.date_of_birth = draft.date_of_birth;
    fighter.height_cm = draft.height_cm;
    fighter.reach_cm = draft.reach_cm;
    fighter.weight_lbs = draft.weight_lbs;
    fighter.stance = draft.stance;
    fighter.gender = draft.gender;
    fighter.record = draft.record;
    if draft.weight_class.is_some() {
        fighter.weight_class = draft.weight_class;
    }
    if draft.external_uid.is_some() {
        fighter.external_uid = draft.external_uid.clone();
    }
}

fn apply_event_draft(event: &mut Event, draft: &EventDraft) {
    event.name = draft.name.clone();
    event.date = draft.date;
    event.venue = draft.venue.clone();
    event.city = draft.city.clone();
    event.country = draft.country.clone();
    event.kind = draft.kind;
    if draft.external_uid.is_some() {
        event.external_uid = draft.external_uid.clone();
    }
    if draft.external_id.is_some() {
        event.external_id = draft.external_id.clone();
    }
}

fn apply_fight_draft(fight: &mut Fight, draft: &FightDraft) {
    fight.weight_class = draft.weight_class;
    fight.rounds = draft.rounds;
    fight.card_position = draft.card_position;
    fight.status = draft.status;
    fight.winner_id = draft.winner_id;
    if draft.external_id.is_some() {
        fight.external_id = draft.external_id.clone();
    }
    if draft.external_uid.is_some() {
        fight.external_uid = draft.external_uid.clone();
    }
}

fn same_pair(fight: &Fight, a: Uuid, b: Uuid) -> bool {
    (fight.fighter1_id == a && fight.fighter2_id == b)
        || (fight.fighter1_id == b && fight.fighter2_id == a)
}

#[async_trait]
impl FightStore for MemoryStore {
    async fn organization_by_short_name(
        &self,
        short_name: &str,
    ) -> Result<Option<Organization>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .organizations
            .iter()
            .find(|o| o.short_name == short_name)
            .cloned())
    }

    async fn upsert_organization(
        &self,
        new: &NewOrganization,
    ) -> Result<Organization, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if let Some(existing) = inner.organizations.iter().find(|o| o.name == new.name) {
            return Ok(existing.clone());
        }
        let organization = Organization {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            short_name: new.short_name.clone(),
            website: new.website.clone(),
            active: true,
        };
        inner.organizations.push(organization.clone());
        Ok(organization)
    }

    async fn fighter_by_external_id(
        &self,
        organization_id: Uuid,
        external_id: &str,
    ) -> Result<Option<Fighter>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .fighters
            .iter()
            .find(|f| {
                f.organization_id == organization_id
                    && f.external_id.as_deref() == Some(external_id)
            })
            .cloned())
    }

    async fn fighter_by_name_ci(
        &self,
        organization_id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<Fighter>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .fighters
            .iter()
            .find(|f| {
                f.organization_id == organization_id
                    && f.first_name.eq_ignore_ascii_case(first_name)
                    && f.last_name.eq_ignore_ascii_case(last_name)
            })
            .cloned())
    }

    async fn fighters_by_last_name_prefix(
        &self,
        organization_id: Uuid,
        prefix: &str,
    ) -> Result<Vec<Fighter>, StoreError> {
        let prefix = prefix.to_lowercase();
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .fighters
            .iter()
            .filter(|f| {
                f.organization_id == organization_id
                    && f.last_name.to_lowercase().starts_with(&prefix)
            })
            .cloned()
            .collect())
    }

    async fn fighters_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Fighter>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .fighters
            .iter()
            .filter(|f| f.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn insert_fighter(
        &self,
        organization_id: Uuid,
        draft: &FighterDraft,
    ) -> Result<Fighter, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if let Some(external_id) = draft.external_id.as_deref() {
            if inner.fighters.iter().any(|f| {
                f.organization_id == organization_id
                    && f.external_id.as_deref() == Some(external_id)
            }) {
                return Err(StoreError::UniqueViolation(format!(
                    "fighter external id {external_id}"
                )));
            }
        }
        let fighter = Fighter {
            id: Uuid::new_v4(),
            external_id: draft.external_id.clone(),
            external_uid: draft.external_uid.clone(),
            first_name: draft.first_name.clone(),
            last_name: draft.last_name.clone(),
            nickname: draft.nickname.clone(),
            image_url: draft.image_url.clone(),
            nationality: draft.nationality.clone(),
            date_of_birth: draft.date_of_birth,
            height_cm: draft.height_cm,
            reach_cm: draft.reach_cm,
            weight_lbs: draft.weight_lbs,
            stance: draft.stance,
            gender: draft.gender,
            record: draft.record,
            weight_class: draft.weight_class,
            active: true,
            organization_id,
        };
        inner.fighters.push(fighter.clone());
        Ok(fighter)
    }

    async fn update_fighter(&self, id: Uuid, draft: &FighterDraft) -> Result<Fighter, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let fighter = inner
            .fighters
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("fighter {id}")))?;
        apply_fighter_draft(fighter, draft);
        Ok(fighter.clone())
    }

    async fn set_fighter_external_id(
        &self,
        id: Uuid,
        external_id: &str,
        external_uid: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let fighter = inner
            .fighters
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("fighter {id}")))?;
        fighter.external_id = Some(external_id.to_string());
        if let Some(uid) = external_uid {
            fighter.external_uid = Some(uid.to_string());
        }
        Ok(())
    }

    async fn set_fighters_weight_class(
        &self,
        ids: &[Uuid],
        weight_class: WeightClass,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        for fighter in inner.fighters.iter_mut() {
            if ids.contains(&fighter.id) {
                fighter.weight_class = Some(weight_class);
            }
        }
        Ok(())
    }

    async fn search_fighters(&self, filter: &FighterFilter) -> Result<Vec<Fighter>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut matches: Vec<Fighter> = inner
            .fighters
            .iter()
            .filter(|f| f.active)
            .filter(|f| filter.organization_id.map_or(true, |org| f.organization_id == org))
            .filter(|f| filter.gender.map_or(true, |g| f.gender == g))
            .filter(|f| filter.weight_class.map_or(true, |wc| f.weight_class == Some(wc)))
            .filter(|f| {
                needle.as_deref().map_or(true, |needle| {
                    f.first_name.to_lowercase().contains(needle)
                        || f.last_name.to_lowercase().contains(needle)
                        || f.nickname
                            .as_deref()
                            .map_or(false, |n| n.to_lowercase().contains(needle))
                })
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            (a.last_name.to_lowercase(), a.first_name.to_lowercase())
                .cmp(&(b.last_name.to_lowercase(), b.first_name.to_lowercase()))
        });
        Ok(matches
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn event_by_external_id(
        &self,
        organization_id: Uuid,
        external_id: &str,
    ) -> Result<Option<Event>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .events
            .iter()
            .find(|e| {
                e.organization_id == organization_id
                    && e.external_id.as_deref() == Some(external_id)
            })
            .cloned())
    }

    async fn event_by_name(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> Result<Option<Event>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .events
            .iter()
            .find(|e| e.organization_id == organization_id && e.name == name)
            .cloned())
    }

    async fn insert_event(
        &self,
        organization_id: Uuid,
        draft: &EventDraft,
    ) -> Result<Event, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if let Some(external_id) = draft.external_id.as_deref() {
            if inner.events.iter().any(|e| {
                e.organization_id == organization_id
                    && e.external_id.as_deref() == Some(external_id)
            }) {
                return Err(StoreError::UniqueViolation(format!(
                    "event external id {external_id}"
                )));
            }
        }
        if inner
            .events
            .iter()
            .any(|e| e.organization_id == organization_id && e.name == draft.name)
        {
            return Err(StoreError::UniqueViolation(format!("event name {}", draft.name)));
        }
        let event = Event {
            id: Uuid::new_v4(),
            external_id: draft.external_id.clone(),
            external_uid: draft.external_uid.clone(),
            name: draft.name.clone(),
            date: draft.date,
            venue: draft.venue.clone(),
            city: draft.city.clone(),
            country: draft.country.clone(),
            kind: draft.kind,
            organization_id,
        };
        inner.events.push(event.clone());
        Ok(event)
    }

    async fn update_event(&self, id: Uuid, draft: &EventDraft) -> Result<Event, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let event = inner
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("event {id}")))?;
        apply_event_draft(event, draft);
        Ok(event.clone())
    }

    async fn upcoming_events(
        &self,
        after: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<EventWithFightCount>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut upcoming: Vec<Event> = inner
            .events
            .iter()
            .filter(|e| e.date >= after)
            .cloned()
            .collect();
        upcoming.sort_by_key(|e| e.date);
        Ok(upcoming
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|event| {
                let fight_count = inner
                    .fights
                    .iter()
                    .filter(|f| f.event_id == event.id)
                    .count() as i64;
                EventWithFightCount { event, fight_count }
            })
            .collect())
    }

    async fn fight_by_external_id(&self, external_id: &str) -> Result<Option<Fight>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .fights
            .iter()
            .find(|f| f.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn fight_by_pair(
        &self,
        event_id: Uuid,
        fighter_a: Uuid,
        fighter_b: Uuid,
    ) -> Result<Option<Fight>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .fights
            .iter()
            .find(|f| f.event_id == event_id && same_pair(f, fighter_a, fighter_b))
            .cloned())
    }

    async fn insert_fight(&self, draft: &FightDraft) -> Result<Fight, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if let Some(external_id) = draft.external_id.as_deref() {
            if inner
                .fights
                .iter()
                .any(|f| f.external_id.as_deref() == Some(external_id))
            {
                return Err(StoreError::UniqueViolation(format!(
                    "fight external id {external_id}"
                )));
            }
        }
        if inner.fights.iter().any(|f| {
            f.event_id == draft.event_id && same_pair(f, draft.fighter1_id, draft.fighter2_id)
        }) {
            return Err(StoreError::UniqueViolation("fight pair".to_string()));
        }
        let fight = Fight {
            id: Uuid::new_v4(),
            external_id: draft.external_id.clone(),
            external_uid: draft.external_uid.clone(),
            event_id: draft.event_id,
            fighter1_id: draft.fighter1_id,
            fighter2_id: draft.fighter2_id,
            weight_class: draft.weight_class,
            rounds: draft.rounds,
            card_position: draft.card_position,
            status: draft.status,
            winner_id: draft.winner_id,
        };
        inner.fights.push(fight.clone());
        Ok(fight)
    }

    async fn update_fight(&self, id: Uuid, draft: &FightDraft) -> Result<Fight, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let fight = inner
            .fights
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("fight {id}")))?;
        apply_fight_draft(fight, draft);
        Ok(fight.clone())
    }

    async fn fights_for_event(&self, event_id: Uuid) -> Result<Vec<Fight>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .fights
            .iter()
            .filter(|f| f.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn delete_active_rankings(&self, organization_id: Uuid) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let before = inner.rankings.len();
        inner
            .rankings
            .retain(|r| !(r.organization_id == organization_id && r.active));
        Ok((before - inner.rankings.len()) as u64)
    }

    async fn upsert_ranking(&self, ranking: &NewRanking) -> Result<Ranking, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if let Some(existing) = inner.rankings.iter_mut().find(|r| {
            r.active
                && r.fighter_id == ranking.fighter_id
                && r.organization_id == ranking.organization_id
                && r.weight_class == ranking.weight_class
        }) {
            existing.rank = ranking.rank;
            existing.effective_date = Utc::now();
            return Ok(existing.clone());
        }
        let row = Ranking {
            id: Uuid::new_v4(),
            fighter_id: ranking.fighter_id,
            organization_id: ranking.organization_id,
            weight_class: ranking.weight_class,
            rank: ranking.rank,
            active: true,
            effective_date: Utc::now(),
        };
        inner.rankings.push(row.clone());
        Ok(row)
    }

    async fn active_rankings(&self, organization_id: Uuid) -> Result<Vec<Ranking>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut rows: Vec<Ranking> = inner
            .rankings
            .iter()
            .filter(|r| r.organization_id == organization_id && r.active)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.weight_class.as_str(), r.rank));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fightgrid_core::{FightRecord, Stance};

    fn draft(first: &str, last: &str, external_id: Option<&str>) -> FighterDraft {
        FighterDraft {
            external_id: external_id.map(str::to_string),
            external_uid: None,
            first_name: first.to_string(),
            last_name: last.to_string(),
            nickname: None,
            image_url: None,
            nationality: None,
            date_of_birth: None,
            height_cm: None,
            reach_cm: None,
            weight_lbs: None,
            stance: Stance::Unknown,
            gender: fightgrid_core::Gender::Male,
            record: FightRecord::default(),
            weight_class: None,
        }
    }

    #[tokio::test]
    async fn duplicate_fighter_external_id_is_a_unique_violation() {
        let store = MemoryStore::new();
        let org = store
            .upsert_organization(&NewOrganization {
                name: "Test Org".into(),
                short_name: "TO".into(),
                website: None,
            })
            .await
            .expect("org");
        store
            .insert_fighter(org.id, &draft("Jon", "Jones", Some("1")))
            .await
            .expect("first insert");
        let err = store
            .insert_fighter(org.id, &draft("Jon", "Jones", Some("1")))
            .await
            .expect_err("second insert must fail");
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn update_keeps_existing_weight_class_when_draft_has_none() {
        let store = MemoryStore::new();
        let org = store
            .upsert_organization(&NewOrganization {
                name: "Test Org".into(),
                short_name: "TO".into(),
                website: None,
            })
            .await
            .expect("org");
        let mut d = draft("Tom", "Aspinall", Some("2"));
        d.weight_class = Some(WeightClass::Heavyweight);
        let fighter = store.insert_fighter(org.id, &d).await.expect("insert");

        d.weight_class = None;
        let updated = store.update_fighter(fighter.id, &d).await.expect("update");
        assert_eq!(updated.weight_class, Some(WeightClass::Heavyweight));
    }

    #[tokio::test]
    async fn fight_pair_is_unordered_identity() {
        let store = MemoryStore::new();
        let org = store
            .upsert_organization(&NewOrganization {
                name: "Test Org".into(),
                short_name: "TO".into(),
                website: None,
            })
            .await
            .expect("org");
        let a = store
            .insert_fighter(org.id, &draft("A", "Alpha", None))
            .await
            .expect("a");
        let b = store
            .insert_fighter(org.id, &draft("B", "Beta", None))
            .await
            .expect("b");
        let event = store
            .insert_event(
                org.id,
                &EventDraft {
                    external_id: None,
                    external_uid: None,
                    name: "TO 1".into(),
                    date: Utc::now(),
                    venue: "Arena".into(),
                    city: "Vegas".into(),
                    country: "USA".into(),
                    kind: fightgrid_core::EventKind::Ppv,
                },
            )
            .await
            .expect("event");
        let fight = FightDraft {
            external_id: None,
            external_uid: None,
            event_id: event.id,
            fighter1_id: a.id,
            fighter2_id: b.id,
            weight_class: WeightClass::Heavyweight,
            rounds: 3,
            card_position: 1,
            status: fightgrid_core::FightStatus::Scheduled,
            winner_id: None,
        };
        store.insert_fight(&fight).await.expect("insert");

        let mut reversed = fight.clone();
        reversed.fighter1_id = b.id;
        reversed.fighter2_id = a.id;
        let err = store.insert_fight(&reversed).await.expect_err("reversed pair");
        assert!(matches!(err, StoreError::UniqueViolation(_)));
        assert!(store
            .fight_by_pair(event.id, b.id, a.id)
            .await
            .expect("lookup")
            .is_some());
    }
}
