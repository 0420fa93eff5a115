//! Upstream source access for Fightgrid: the retrying HTTP fetcher, typed
//! API documents, and the rankings page parser.

pub mod api;
pub mod http;
pub mod rankings;

pub use api::{
    parse_birth_date, parse_event_date, AddressDoc, ApiClient, AthleteDoc, AthleteRefDoc,
    CompetitionDoc, CompetitorDoc, DateRange, EventDoc, FightSource, NoteDoc, RecordItemDoc,
    RecordsDoc, ScoreboardDoc, SourceUrls, StatusDoc, StatusTypeDoc, VenueDoc, WeightClassDoc,
};
pub use http::{FetchError, HttpFetcher, HttpFetcherConfig, RequestPacer, RetryPolicy};
pub use rankings::{parse_rankings, RankedEntry, RankingsParseError};

pub const CRATE_NAME: &str = "fightgrid-client";
