//! Core domain model, name normalization, and field classification for Fightgrid.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod classify;
pub mod normalize;

pub const CRATE_NAME: &str = "fightgrid-core";

/// A sanctioning body (promotion). Created once at setup, rarely mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub short_name: String,
    pub website: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrganization {
    pub name: String,
    pub short_name: String,
    pub website: Option<String>,
}

/// Weight divisions. Catchweight is a sentinel for bouts with no resolvable
/// division, never a division a fighter is classified into by label lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeightClass {
    Strawweight,
    Flyweight,
    Bantamweight,
    Featherweight,
    Lightweight,
    Welterweight,
    Middleweight,
    LightHeavyweight,
    Heavyweight,
    SuperHeavyweight,
    Catchweight,
}

impl WeightClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightClass::Strawweight => "STRAWWEIGHT",
            WeightClass::Flyweight => "FLYWEIGHT",
            WeightClass::Bantamweight => "BANTAMWEIGHT",
            WeightClass::Featherweight => "FEATHERWEIGHT",
            WeightClass::Lightweight => "LIGHTWEIGHT",
            WeightClass::Welterweight => "WELTERWEIGHT",
            WeightClass::Middleweight => "MIDDLEWEIGHT",
            WeightClass::LightHeavyweight => "LIGHT_HEAVYWEIGHT",
            WeightClass::Heavyweight => "HEAVYWEIGHT",
            WeightClass::SuperHeavyweight => "SUPER_HEAVYWEIGHT",
            WeightClass::Catchweight => "CATCHWEIGHT",
        }
    }

    pub fn parse(raw: &str) -> Option<WeightClass> {
        match raw {
            "STRAWWEIGHT" => Some(WeightClass::Strawweight),
            "FLYWEIGHT" => Some(WeightClass::Flyweight),
            "BANTAMWEIGHT" => Some(WeightClass::Bantamweight),
            "FEATHERWEIGHT" => Some(WeightClass::Featherweight),
            "LIGHTWEIGHT" => Some(WeightClass::Lightweight),
            "WELTERWEIGHT" => Some(WeightClass::Welterweight),
            "MIDDLEWEIGHT" => Some(WeightClass::Middleweight),
            "LIGHT_HEAVYWEIGHT" => Some(WeightClass::LightHeavyweight),
            "HEAVYWEIGHT" => Some(WeightClass::Heavyweight),
            "SUPER_HEAVYWEIGHT" => Some(WeightClass::SuperHeavyweight),
            "CATCHWEIGHT" => Some(WeightClass::Catchweight),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WeightClass::Strawweight => "Strawweight",
            WeightClass::Flyweight => "Flyweight",
            WeightClass::Bantamweight => "Bantamweight",
            WeightClass::Featherweight => "Featherweight",
            WeightClass::Lightweight => "Lightweight",
            WeightClass::Welterweight => "Welterweight",
            WeightClass::Middleweight => "Middleweight",
            WeightClass::LightHeavyweight => "Light Heavyweight",
            WeightClass::Heavyweight => "Heavyweight",
            WeightClass::SuperHeavyweight => "Super Heavyweight",
            WeightClass::Catchweight => "Catchweight",
        }
    }

    /// Upper weight limit in pounds. None for the open-ended and sentinel buckets.
    pub fn limit_lbs(&self) -> Option<u32> {
        match self {
            WeightClass::Strawweight => Some(115),
            WeightClass::Flyweight => Some(125),
            WeightClass::Bantamweight => Some(135),
            WeightClass::Featherweight => Some(145),
            WeightClass::Lightweight => Some(155),
            WeightClass::Welterweight => Some(170),
            WeightClass::Middleweight => Some(185),
            WeightClass::LightHeavyweight => Some(205),
            WeightClass::Heavyweight => Some(265),
            WeightClass::SuperHeavyweight | WeightClass::Catchweight => None,
        }
    }

    /// Divisions contested only by women under this rule set.
    pub fn women_only(&self) -> bool {
        matches!(self, WeightClass::Strawweight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }

    pub fn parse(raw: &str) -> Option<Gender> {
        match raw {
            "MALE" => Some(Gender::Male),
            "FEMALE" => Some(Gender::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stance {
    Orthodox,
    Southpaw,
    Switch,
    Unknown,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Orthodox => "ORTHODOX",
            Stance::Southpaw => "SOUTHPAW",
            Stance::Switch => "SWITCH",
            Stance::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(raw: &str) -> Option<Stance> {
        match raw {
            "ORTHODOX" => Some(Stance::Orthodox),
            "SOUTHPAW" => Some(Stance::Southpaw),
            "SWITCH" => Some(Stance::Switch),
            "UNKNOWN" => Some(Stance::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FightStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl FightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FightStatus::Scheduled => "SCHEDULED",
            FightStatus::Completed => "COMPLETED",
            FightStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(raw: &str) -> Option<FightStatus> {
        match raw {
            "SCHEDULED" => Some(FightStatus::Scheduled),
            "COMPLETED" => Some(FightStatus::Completed),
            "CANCELLED" => Some(FightStatus::Cancelled),
            _ => None,
        }
    }
}

/// Title-series pay-per-view card vs a regular card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Ppv,
    FightNight,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Ppv => "PPV",
            EventKind::FightNight => "FIGHT_NIGHT",
        }
    }

    pub fn parse(raw: &str) -> Option<EventKind> {
        match raw {
            "PPV" => Some(EventKind::Ppv),
            "FIGHT_NIGHT" => Some(EventKind::FightNight),
            _ => None,
        }
    }
}

/// Win/loss tallies with the win-method breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FightRecord {
    pub wins: i32,
    pub losses: i32,
    pub draws: i32,
    pub no_contests: i32,
    pub wins_by_ko: i32,
    pub wins_by_sub: i32,
    pub wins_by_dec: i32,
}

/// A competitor as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fighter {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub external_uid: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub nickname: Option<String>,
    pub image_url: Option<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub height_cm: Option<i32>,
    pub reach_cm: Option<i32>,
    pub weight_lbs: Option<f64>,
    pub stance: Stance,
    pub gender: Gender,
    pub record: FightRecord,
    pub weight_class: Option<WeightClass>,
    pub active: bool,
    pub organization_id: Uuid,
}

/// Everything the sync pipeline derives about a fighter before the upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FighterDraft {
    pub external_id: Option<String>,
    pub external_uid: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub nickname: Option<String>,
    pub image_url: Option<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub height_cm: Option<i32>,
    pub reach_cm: Option<i32>,
    pub weight_lbs: Option<f64>,
    pub stance: Stance,
    pub gender: Gender,
    pub record: FightRecord,
    pub weight_class: Option<WeightClass>,
}

/// A fight card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub external_uid: Option<String>,
    pub name: String,
    pub date: DateTime<Utc>,
    pub venue: String,
    pub city: String,
    pub country: String,
    pub kind: EventKind,
    pub organization_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub external_id: Option<String>,
    pub external_uid: Option<String>,
    pub name: String,
    pub date: DateTime<Utc>,
    pub venue: String,
    pub city: String,
    pub country: String,
    pub kind: EventKind,
}

/// One bout within an event. Exactly two distinct fighters; the winner, when
/// set, is one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fight {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub external_uid: Option<String>,
    pub event_id: Uuid,
    pub fighter1_id: Uuid,
    pub fighter2_id: Uuid,
    pub weight_class: WeightClass,
    pub rounds: i32,
    pub card_position: i32,
    pub status: FightStatus,
    pub winner_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FightDraft {
    pub external_id: Option<String>,
    pub external_uid: Option<String>,
    pub event_id: Uuid,
    pub fighter1_id: Uuid,
    pub fighter2_id: Uuid,
    pub weight_class: WeightClass,
    pub rounds: i32,
    pub card_position: i32,
    pub status: FightStatus,
    pub winner_id: Option<Uuid>,
}

/// A fighter's position in a division at a point in time. The active set per
/// organization is replaced wholesale on each rankings sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub id: Uuid,
    pub fighter_id: Uuid,
    pub organization_id: Uuid,
    pub weight_class: WeightClass,
    pub rank: i32,
    pub active: bool,
    pub effective_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRanking {
    pub fighter_id: Uuid,
    pub organization_id: Uuid,
    pub weight_class: WeightClass,
    pub rank: i32,
}
