//! Typed documents for the upstream sports API and the `FightSource` seam
//! between the sync pipeline and the network.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::http::{FetchError, HttpFetcher};

/// Inclusive date range for scoreboard queries, encoded as
/// `YYYYMMDD-YYYYMMDD` upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The whole of one calendar year.
    pub fn year(year: i32) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }

    pub fn query_param(&self) -> String {
        format!(
            "{}-{}",
            self.start.format("%Y%m%d"),
            self.end.format("%Y%m%d")
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreboardDoc {
    #[serde(default)]
    pub events: Vec<ScoreboardEventDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreboardEventDoc {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDoc {
    pub id: String,
    pub uid: Option<String>,
    pub name: Option<String>,
    pub date: Option<String>,
    pub venue: Option<VenueDoc>,
    pub competitions: Option<Vec<CompetitionDoc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueDoc {
    pub full_name: Option<String>,
    pub address: Option<AddressDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDoc {
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionDoc {
    pub id: String,
    pub uid: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub notes: Vec<NoteDoc>,
    pub status: Option<StatusDoc>,
    #[serde(default)]
    pub competitors: Vec<CompetitorDoc>,
    pub format: Option<FormatDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDoc {
    pub headline: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDoc {
    #[serde(rename = "type")]
    pub kind: Option<StatusTypeDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTypeDoc {
    pub state: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorDoc {
    #[serde(default)]
    pub winner: bool,
    pub athlete: Option<AthleteRefDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AthleteRefDoc {
    #[serde(rename = "$ref")]
    pub href: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatDoc {
    pub regulation: Option<RegulationDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegulationDoc {
    pub periods: Option<i32>,
}

/// Some athlete fields arrive as a bare string in one document and as a
/// `{name, displayName, type}` object in another.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextOrObject {
    Text(String),
    Object {
        name: Option<String>,
        #[serde(rename = "displayName")]
        display_name: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
    },
}

impl TextOrObject {
    pub fn value(&self) -> Option<&str> {
        match self {
            TextOrObject::Text(s) => Some(s.as_str()),
            TextOrObject::Object {
                name,
                display_name,
                kind,
            } => name
                .as_deref()
                .or(display_name.as_deref())
                .or(kind.as_deref()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AthleteDoc {
    pub id: String,
    pub uid: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
    pub headshot: Option<HeadshotDoc>,
    pub citizenship: Option<String>,
    pub date_of_birth: Option<String>,
    pub height: Option<f64>,
    pub reach: Option<f64>,
    pub weight: Option<f64>,
    pub stance: Option<TextOrObject>,
    pub gender: Option<TextOrObject>,
    pub weight_class: Option<WeightClassDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadshotDoc {
    pub href: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightClassDoc {
    pub text: Option<String>,
    pub short_name: Option<String>,
}

impl WeightClassDoc {
    /// The profile-declared division label, preferring the long form.
    pub fn label(&self) -> Option<&str> {
        self.text.as_deref().or(self.short_name.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsDoc {
    #[serde(default)]
    pub items: Vec<RecordItemDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordItemDoc {
    pub name: Option<String>,
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub summary: Option<String>,
    pub wins: Option<i32>,
}

/// Event dates arrive either as RFC 3339 or as the upstream's
/// seconds-free `YYYY-MM-DDTHH:MMZ` shorthand.
pub fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Birth dates arrive as RFC 3339 or plain `YYYY-MM-DD`; only the calendar
/// date is kept.
pub fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// The orchestrator's view of the upstream source. The live implementation
/// goes over HTTP; tests substitute fixtures.
#[async_trait]
pub trait FightSource: Send + Sync {
    /// Event ids with cards inside the date range.
    async fn event_ids(&self, range: DateRange) -> Result<Vec<String>, FetchError>;

    async fn event(&self, event_id: &str) -> Result<EventDoc, FetchError>;

    /// Fetch an athlete profile by the `$ref` URL embedded in a competition.
    async fn athlete(&self, href: &str) -> Result<AthleteDoc, FetchError>;

    async fn athlete_records(&self, athlete_id: &str) -> Result<RecordsDoc, FetchError>;

    /// Raw HTML of the rankings page.
    async fn rankings_page(&self) -> Result<String, FetchError>;
}

#[derive(Debug, Clone)]
pub struct SourceUrls {
    pub scoreboard_base: String,
    pub core_base: String,
    pub league: String,
    pub rankings_url: String,
}

#[derive(Debug)]
pub struct ApiClient {
    fetcher: HttpFetcher,
    urls: SourceUrls,
}

impl ApiClient {
    pub fn new(fetcher: HttpFetcher, urls: SourceUrls) -> Self {
        Self { fetcher, urls }
    }

    fn with_locale(url: &str) -> String {
        if url.contains('?') {
            format!("{url}&lang=en&region=us")
        } else {
            format!("{url}?lang=en&region=us")
        }
    }
}

#[async_trait]
impl FightSource for ApiClient {
    async fn event_ids(&self, range: DateRange) -> Result<Vec<String>, FetchError> {
        let url = format!(
            "{}/scoreboard?dates={}",
            self.urls.scoreboard_base,
            range.query_param()
        );
        let doc: ScoreboardDoc = self.fetcher.fetch_json(&url).await?;
        Ok(doc.events.into_iter().filter_map(|e| e.id).collect())
    }

    async fn event(&self, event_id: &str) -> Result<EventDoc, FetchError> {
        let url = Self::with_locale(&format!(
            "{}/leagues/{}/events/{}",
            self.urls.core_base, self.urls.league, event_id
        ));
        self.fetcher.fetch_json(&url).await
    }

    async fn athlete(&self, href: &str) -> Result<AthleteDoc, FetchError> {
        let url = Self::with_locale(href);
        self.fetcher.fetch_json(&url).await
    }

    async fn athlete_records(&self, athlete_id: &str) -> Result<RecordsDoc, FetchError> {
        let url = Self::with_locale(&format!(
            "{}/athletes/{}/records",
            self.urls.core_base, athlete_id
        ));
        self.fetcher.fetch_json(&url).await
    }

    async fn rankings_page(&self) -> Result<String, FetchError> {
        self.fetcher.fetch_text(&self.urls.rankings_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_document_deserializes_with_nested_refs() {
        let json = r#"{
            "id": "600040536",
            "uid": "s:3301~l:3320~e:600040536",
            "name": "FG 309: Jones vs Miocic",
            "date": "2024-11-17T03:00Z",
            "venue": {"fullName": "Madison Square Garden", "address": {"city": "New York"}},
            "competitions": [{
                "id": "401718110",
                "notes": [{"headline": "Heavyweight Title Bout"}],
                "status": {"type": {"state": "post", "completed": true}},
                "competitors": [
                    {"winner": true, "athlete": {"$ref": "http://example.test/athletes/1"}},
                    {"winner": false, "athlete": {"$ref": "http://example.test/athletes/2"}}
                ],
                "format": {"regulation": {"periods": 5}}
            }]
        }"#;
        let doc: EventDoc = serde_json::from_str(json).expect("event doc");
        assert_eq!(doc.name.as_deref(), Some("FG 309: Jones vs Miocic"));
        let comps = doc.competitions.expect("competitions");
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].competitors.len(), 2);
        assert!(comps[0].competitors[0].winner);
        assert_eq!(
            comps[0].competitors[0]
                .athlete
                .as_ref()
                .map(|a| a.href.as_str()),
            Some("http://example.test/athletes/1")
        );
        assert_eq!(
            comps[0]
                .format
                .as_ref()
                .and_then(|f| f.regulation.as_ref())
                .and_then(|r| r.periods),
            Some(5)
        );
    }

    #[test]
    fn athlete_stance_accepts_string_or_object() {
        let as_text: AthleteDoc = serde_json::from_str(
            r#"{"id": "1", "firstName": "Jon", "lastName": "Jones", "stance": "Orthodox"}"#,
        )
        .expect("text stance");
        assert_eq!(as_text.stance.as_ref().and_then(|s| s.value()), Some("Orthodox"));

        let as_object: AthleteDoc = serde_json::from_str(
            r#"{"id": "1", "firstName": "Jon", "lastName": "Jones",
                "stance": {"name": "Southpaw", "displayName": "Southpaw"}}"#,
        )
        .expect("object stance");
        assert_eq!(
            as_object.stance.as_ref().and_then(|s| s.value()),
            Some("Southpaw")
        );
    }

    #[test]
    fn event_dates_parse_in_both_upstream_shapes() {
        assert!(parse_event_date("2024-11-17T03:00Z").is_some());
        assert!(parse_event_date("2024-11-17T03:00:00Z").is_some());
        assert!(parse_event_date("not a date").is_none());
        assert_eq!(
            parse_birth_date("1987-07-19T07:00Z"),
            NaiveDate::from_ymd_opt(1987, 7, 19)
        );
        assert_eq!(
            parse_birth_date("1987-07-19"),
            NaiveDate::from_ymd_opt(1987, 7, 19)
        );
    }

    #[test]
    fn scoreboard_without_events_key_is_empty() {
        let doc: ScoreboardDoc = serde_json::from_str("{}").expect("scoreboard");
        assert!(doc.events.is_empty());
    }

    #[test]
    fn date_range_encodes_as_compact_pair() {
        let range = DateRange::year(2024).expect("range");
        assert_eq!(range.query_param(), "20240101-20241231");
    }
}
