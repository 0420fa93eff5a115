//! The sync orchestrator: full-backfill and incremental runs over the
//! upstream source with idempotent upserts.
//!
//! Per-item failures never unwind a run. Each event and bout produces an
//! explicit [`ItemOutcome`] that is folded into the run's [`SyncStats`], so
//! control flow stays visible as data instead of disappearing into suppressed
//! errors. Only a missing organization row aborts, since nothing downstream
//! can be anchored without it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use fightgrid_client::{
    parse_birth_date, parse_event_date, CompetitionDoc, DateRange, EventDoc, FightSource,
    RecordItemDoc, RecordsDoc, RequestPacer,
};
use fightgrid_core::classify::{
    classify_event_kind, classify_fight_status, classify_gender, classify_stance,
    detect_weight_class, inches_to_cm, parse_record_summary, weight_class_from_label,
    win_method_for_label, WinMethod,
};
use fightgrid_core::{
    Event, EventDraft, FightDraft, FightRecord, Fighter, FighterDraft, Organization, WeightClass,
};
use fightgrid_storage::{FightStore, StoreError};

use crate::resolve::{resolve_event, resolve_fighter, IncomingFighter};
use crate::{SyncConfig, SyncError};

/// Counters returned from every run and surfaced through the HTTP layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub events: u64,
    pub fights: u64,
    pub fights_skipped: u64,
    pub fighters: u64,
    pub errors: u64,
}

/// Tagged per-item result. Skips carry a reason for the log; failures carry
/// the rendered error and count toward `errors`.
#[derive(Debug)]
enum ItemOutcome {
    Synced,
    Skipped(&'static str),
    Failed(String),
}

/// Run-scoped cache keyed by the competitor's athlete reference, so a fighter
/// appearing on several bouts within one run is fetched and classified at
/// most once. Dropped with the run; never shared across overlapping runs.
#[derive(Default)]
struct FighterCache(HashMap<String, Fighter>);

impl FighterCache {
    fn get(&self, href: &str) -> Option<&Fighter> {
        self.0.get(href)
    }

    fn insert(&mut self, href: &str, fighter: Fighter) {
        self.0.insert(href.to_string(), fighter);
    }
}

pub struct SyncEngine {
    store: Arc<dyn FightStore>,
    source: Arc<dyn FightSource>,
    config: SyncConfig,
    pacer: RequestPacer,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn FightStore>,
        source: Arc<dyn FightSource>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            source,
            config,
            pacer: RequestPacer::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &dyn FightStore {
        self.store.as_ref()
    }

    pub(crate) fn source(&self) -> &dyn FightSource {
        self.source.as_ref()
    }

    pub(crate) fn pacer(&self) -> &RequestPacer {
        &self.pacer
    }

    pub(crate) async fn required_organization(&self) -> Result<Organization, SyncError> {
        self.store
            .organization_by_short_name(&self.config.organization_short_name)
            .await?
            .ok_or_else(|| {
                SyncError::OrganizationMissing(self.config.organization_short_name.clone())
            })
    }

    /// Historical backfill: create the organization on first run, collect
    /// event ids over the configured span in yearly windows, process each.
    pub async fn run_full(&self) -> Result<SyncStats, SyncError> {
        let organization = self
            .store
            .upsert_organization(&fightgrid_core::NewOrganization {
                name: self.config.organization_name.clone(),
                short_name: self.config.organization_short_name.clone(),
                website: self.config.organization_website.clone(),
            })
            .await?;

        let current_year = Utc::now().year();
        let mut event_ids = Vec::new();
        for year in (current_year - self.config.backfill_years)..=current_year {
            let Some(range) = DateRange::year(year) else {
                continue;
            };
            self.pacer.pace(self.config.scoreboard_pace).await;
            match self.source.event_ids(range).await {
                Ok(ids) => {
                    debug!(year, events = ids.len(), "scoreboard window fetched");
                    event_ids.extend(ids);
                }
                Err(err) => warn!(year, error = %err, "scoreboard window failed"),
            }
        }
        info!(total = event_ids.len(), "processing backfill events");

        let stats = self.process_events(&organization, &event_ids).await;
        info!(
            events = stats.events,
            fights = stats.fights,
            fighters = stats.fighters,
            skipped = stats.fights_skipped,
            errors = stats.errors,
            "full sync finished"
        );
        Ok(stats)
    }

    /// Incremental run over the rolling window. Fatal only when the
    /// organization row is absent or the single scoreboard fetch fails.
    pub async fn run_incremental(&self) -> Result<SyncStats, SyncError> {
        let organization = self.required_organization().await?;

        let now = Utc::now();
        let range = DateRange::new(
            (now - ChronoDuration::days(self.config.window_back_days)).date_naive(),
            (now + ChronoDuration::days(self.config.window_forward_days)).date_naive(),
        );
        self.pacer.pace(self.config.scoreboard_pace).await;
        let event_ids = self.source.event_ids(range).await?;
        info!(total = event_ids.len(), "processing recent events");

        let stats = self.process_events(&organization, &event_ids).await;
        info!(
            events = stats.events,
            fights = stats.fights,
            fighters = stats.fighters,
            skipped = stats.fights_skipped,
            errors = stats.errors,
            "incremental sync finished"
        );
        Ok(stats)
    }

    async fn process_events(&self, organization: &Organization, event_ids: &[String]) -> SyncStats {
        let mut stats = SyncStats::default();
        let mut cache = FighterCache::default();
        for event_id in event_ids {
            let outcome = self
                .process_event(organization, event_id, &mut cache, &mut stats)
                .await;
            match outcome {
                ItemOutcome::Synced => stats.events += 1,
                ItemOutcome::Skipped(reason) => debug!(event_id, reason, "event skipped"),
                ItemOutcome::Failed(err) => {
                    warn!(event_id, error = %err, "event failed");
                    stats.errors += 1;
                }
            }
        }
        stats
    }

    async fn process_event(
        &self,
        organization: &Organization,
        event_id: &str,
        cache: &mut FighterCache,
        stats: &mut SyncStats,
    ) -> ItemOutcome {
        self.pacer.pace(self.config.event_pace).await;
        let doc = match self.source.event(event_id).await {
            Ok(doc) => doc,
            Err(err) => return ItemOutcome::Failed(err.to_string()),
        };

        let Some(name) = doc.name.clone().filter(|n| !n.trim().is_empty()) else {
            return ItemOutcome::Skipped("event without a name");
        };
        let Some(competitions) = doc.competitions.as_deref() else {
            return ItemOutcome::Skipped("event without competitions");
        };
        let Some(date) = doc.date.as_deref().and_then(parse_event_date) else {
            return ItemOutcome::Skipped("event without a parsable date");
        };

        let event = match self.upsert_event(organization, &doc, &name, date).await {
            Ok(Some(event)) => event,
            Ok(None) => return ItemOutcome::Skipped("duplicate event with no surviving row"),
            Err(err) => return ItemOutcome::Failed(err.to_string()),
        };

        for (index, competition) in competitions.iter().enumerate() {
            let outcome = self
                .process_fight(organization, &event, &name, date, competition, index, cache, stats)
                .await;
            match outcome {
                ItemOutcome::Synced => stats.fights += 1,
                ItemOutcome::Skipped(reason) => {
                    debug!(competition_id = competition.id.as_str(), reason, "bout skipped");
                    stats.fights_skipped += 1;
                }
                ItemOutcome::Failed(err) => {
                    warn!(competition_id = competition.id.as_str(), error = %err, "bout failed");
                    stats.errors += 1;
                }
            }
        }
        ItemOutcome::Synced
    }

    async fn upsert_event(
        &self,
        organization: &Organization,
        doc: &EventDoc,
        name: &str,
        date: DateTime<Utc>,
    ) -> Result<Option<Event>, StoreError> {
        let draft = EventDraft {
            external_id: Some(doc.id.clone()),
            external_uid: doc.uid.clone(),
            name: name.to_string(),
            date,
            venue: doc
                .venue
                .as_ref()
                .and_then(|v| v.full_name.clone())
                .unwrap_or_else(|| "TBA".to_string()),
            city: doc
                .venue
                .as_ref()
                .and_then(|v| v.address.as_ref())
                .and_then(|a| a.city.clone())
                .unwrap_or_else(|| "TBA".to_string()),
            country: doc
                .venue
                .as_ref()
                .and_then(|v| v.address.as_ref())
                .and_then(|a| a.country.clone())
                .unwrap_or_else(|| "USA".to_string()),
            kind: classify_event_kind(name, &organization.short_name),
        };

        match resolve_event(self.store.as_ref(), organization.id, Some(&doc.id), name).await? {
            Some(existing) => Ok(Some(self.store.update_event(existing.id, &draft).await?)),
            None => match self.store.insert_event(organization.id, &draft).await {
                Ok(event) => Ok(Some(event)),
                Err(StoreError::UniqueViolation(_)) => {
                    // Lost the creation race to a concurrent run; the row is
                    // there now, reuse it.
                    self.store.event_by_name(organization.id, name).await
                }
                Err(err) => Err(err),
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_fight(
        &self,
        organization: &Organization,
        event: &Event,
        event_name: &str,
        event_date: DateTime<Utc>,
        competition: &CompetitionDoc,
        index: usize,
        cache: &mut FighterCache,
        stats: &mut SyncStats,
    ) -> ItemOutcome {
        if competition.competitors.len() != 2 {
            return ItemOutcome::Skipped("bout without exactly two competitors");
        }

        let context = bout_context_texts(competition, event_name);

        let mut fighters = Vec::with_capacity(2);
        let mut winner_flags = Vec::with_capacity(2);
        for competitor in &competition.competitors {
            let Some(athlete) = competitor.athlete.as_ref() else {
                continue;
            };
            match self
                .sync_fighter(organization, &athlete.href, &context, cache, stats)
                .await
            {
                Ok(fighter) => {
                    fighters.push(fighter);
                    winner_flags.push(competitor.winner);
                }
                Err(err) => {
                    warn!(href = athlete.href.as_str(), error = %err, "fighter sync failed");
                    stats.errors += 1;
                }
            }
        }
        if fighters.len() != 2 {
            return ItemOutcome::Skipped("bout with an unresolved fighter");
        }
        if fighters[0].id == fighters[1].id {
            return ItemOutcome::Skipped("bout whose competitors resolved to one fighter");
        }

        // Bout division: fighter classifications first, then free-text
        // detection over the bout notes and event name, then the
        // catch-weight sentinel.
        let weight_class = fighters[0]
            .weight_class
            .or(fighters[1].weight_class)
            .or_else(|| {
                detect_weight_class(
                    competition
                        .notes
                        .iter()
                        .filter_map(|n| n.headline.as_deref()),
                    event_name,
                )
            })
            .unwrap_or(WeightClass::Catchweight);

        let status_kind = competition.status.as_ref().and_then(|s| s.kind.as_ref());
        let status = classify_fight_status(
            status_kind
                .and_then(|k| k.state.as_deref().or(k.name.as_deref())),
            status_kind.map(|k| k.completed).unwrap_or(false),
            Some(event_date),
            Utc::now(),
        );

        let winner_id = if winner_flags[0] {
            Some(fighters[0].id)
        } else if winner_flags[1] {
            Some(fighters[1].id)
        } else {
            None
        };

        let draft = FightDraft {
            external_id: Some(competition.id.clone()),
            external_uid: competition.uid.clone(),
            event_id: event.id,
            fighter1_id: fighters[0].id,
            fighter2_id: fighters[1].id,
            weight_class,
            rounds: competition
                .format
                .as_ref()
                .and_then(|f| f.regulation.as_ref())
                .and_then(|r| r.periods)
                .unwrap_or(3),
            card_position: (index + 1) as i32,
            status,
            winner_id,
        };

        let outcome = match self.upsert_fight(&draft).await {
            Ok(true) => ItemOutcome::Synced,
            Ok(false) => ItemOutcome::Skipped("already created by a concurrent run"),
            Err(err) => return ItemOutcome::Failed(err.to_string()),
        };

        // A resolved division feeds back onto both fighters; the sentinel
        // never does.
        if weight_class != WeightClass::Catchweight {
            if let Err(err) = self
                .store
                .set_fighters_weight_class(&[fighters[0].id, fighters[1].id], weight_class)
                .await
            {
                warn!(error = %err, "updating fighter divisions failed");
                stats.errors += 1;
            }
        }
        outcome
    }

    /// External id first, fallback pair identity second, insert last. A
    /// unique violation on insert means a concurrent run won the race;
    /// reported as `Ok(false)` and counted as skipped, not failed.
    async fn upsert_fight(&self, draft: &FightDraft) -> Result<bool, StoreError> {
        if let Some(external_id) = draft.external_id.as_deref() {
            if let Some(existing) = self.store.fight_by_external_id(external_id).await? {
                self.store.update_fight(existing.id, draft).await?;
                return Ok(true);
            }
        }
        if let Some(existing) = self
            .store
            .fight_by_pair(draft.event_id, draft.fighter1_id, draft.fighter2_id)
            .await?
        {
            self.store.update_fight(existing.id, draft).await?;
            return Ok(true);
        }
        match self.store.insert_fight(draft).await {
            Ok(_) => Ok(true),
            Err(StoreError::UniqueViolation(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn sync_fighter(
        &self,
        organization: &Organization,
        href: &str,
        context: &[String],
        cache: &mut FighterCache,
        stats: &mut SyncStats,
    ) -> Result<Fighter, SyncError> {
        if let Some(fighter) = cache.get(href) {
            return Ok(fighter.clone());
        }

        self.pacer.pace(self.config.athlete_pace).await;
        let athlete = self.source.athlete(href).await?;

        let first_name = athlete
            .first_name
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        let last_name = athlete
            .last_name
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "Fighter".to_string());

        let incoming = IncomingFighter {
            external_id: Some(&athlete.id),
            external_uid: athlete.uid.as_deref(),
            first_name: &first_name,
            last_name: &last_name,
        };
        let existing = resolve_fighter(self.store.as_ref(), organization.id, &incoming).await?;

        let record = self.fetch_record(&athlete.id).await;

        let declared = athlete
            .weight_class
            .as_ref()
            .and_then(|wc| wc.label())
            .and_then(weight_class_from_label);
        let gender = classify_gender(
            athlete.gender.as_ref().and_then(|g| g.value()),
            context.iter().map(String::as_str),
            declared,
        );

        let draft = FighterDraft {
            external_id: Some(athlete.id.clone()),
            external_uid: athlete.uid.clone(),
            first_name,
            last_name,
            nickname: athlete.nickname.clone(),
            image_url: athlete.headshot.as_ref().and_then(|h| h.href.clone()),
            nationality: athlete.citizenship.clone(),
            date_of_birth: athlete.date_of_birth.as_deref().and_then(parse_birth_date),
            height_cm: athlete.height.map(inches_to_cm),
            reach_cm: athlete.reach.map(inches_to_cm),
            weight_lbs: athlete.weight,
            stance: classify_stance(athlete.stance.as_ref().and_then(|s| s.value())),
            gender,
            record,
            weight_class: declared,
        };

        let fighter = match existing {
            Some(found) => self.store.update_fighter(found.id, &draft).await?,
            None => match self.store.insert_fighter(organization.id, &draft).await {
                Ok(created) => created,
                Err(StoreError::UniqueViolation(_)) => {
                    // A concurrent run created the row between the resolver
                    // miss and this insert; fetch and reuse it.
                    self.store
                        .fighter_by_external_id(organization.id, &athlete.id)
                        .await?
                        .ok_or_else(|| {
                            StoreError::NotFound(format!("fighter external id {}", athlete.id))
                        })?
                }
                Err(err) => return Err(err.into()),
            },
        };
        stats.fighters += 1;
        cache.insert(href, fighter.clone());
        Ok(fighter)
    }

    /// Record-breakdown failures degrade to zero tallies rather than
    /// aborting the fighter upsert.
    async fn fetch_record(&self, athlete_id: &str) -> FightRecord {
        self.pacer.pace(self.config.athlete_pace).await;
        match self.source.athlete_records(athlete_id).await {
            Ok(doc) => record_from_doc(&doc),
            Err(err) => {
                debug!(athlete_id, error = %err, "record fetch failed, using zero tallies");
                FightRecord::default()
            }
        }
    }
}

/// Text surfaces that can carry a feminine-division marker for the bout.
fn bout_context_texts(competition: &CompetitionDoc, event_name: &str) -> Vec<String> {
    let mut texts = Vec::new();
    if let Some(name) = &competition.name {
        texts.push(name.clone());
    }
    texts.push(event_name.to_string());
    texts.extend(competition.notes.iter().filter_map(|n| n.headline.clone()));
    texts
}

fn is_overall_item(item: &RecordItemDoc) -> bool {
    item.name
        .as_deref()
        .map_or(false, |n| n.eq_ignore_ascii_case("overall"))
        || item.kind.as_deref() == Some("total")
}

fn record_from_doc(doc: &RecordsDoc) -> FightRecord {
    let mut record = FightRecord::default();
    for item in &doc.items {
        if is_overall_item(item) {
            if let Some(summary) = item.summary.as_deref() {
                let (wins, losses, draws, no_contests) = parse_record_summary(summary);
                record.wins = wins;
                record.losses = losses;
                record.draws = draws;
                record.no_contests = no_contests;
            }
            continue;
        }
        let Some(wins) = item.wins else {
            continue;
        };
        match win_method_for_label(item.name.as_deref(), item.display_name.as_deref()) {
            Some(WinMethod::Knockout) => record.wins_by_ko = wins,
            Some(WinMethod::Submission) => record.wins_by_sub = wins,
            Some(WinMethod::Decision) => record.wins_by_dec = wins,
            None => {}
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, summary: Option<&str>, wins: Option<i32>) -> RecordItemDoc {
        RecordItemDoc {
            name: Some(name.to_string()),
            display_name: None,
            kind: None,
            summary: summary.map(str::to_string),
            wins,
        }
    }

    #[test]
    fn record_doc_maps_overall_and_method_tallies() {
        let doc = RecordsDoc {
            items: vec![
                item("overall", Some("27-1-0"), None),
                item("KO/TKO", None, Some(10)),
                item("Submissions", None, Some(7)),
                item("Decisions", None, Some(10)),
            ],
        };
        let record = record_from_doc(&doc);
        assert_eq!(record.wins, 27);
        assert_eq!(record.losses, 1);
        assert_eq!(record.wins_by_ko, 10);
        assert_eq!(record.wins_by_sub, 7);
        assert_eq!(record.wins_by_dec, 10);
    }

    #[test]
    fn empty_record_doc_yields_zero_tallies() {
        let record = record_from_doc(&RecordsDoc { items: vec![] });
        assert_eq!(record, FightRecord::default());
    }
}
