//! Axum JSON API over the sync engine and store: sync triggers, the guarded
//! cron entry point, and the read endpoints the dashboard consumes.
//!
//! Sync routes always answer with a structured body carrying a `success`
//! flag and counts or an error string, never a bare error.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use fightgrid_core::{Gender, WeightClass};
use fightgrid_storage::{FightStore, FighterFilter};
use fightgrid_sync::{RankingsReport, SyncEngine, SyncError, SyncStats};

pub const CRATE_NAME: &str = "fightgrid-web";

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const UPCOMING_LIMIT: i64 = 5;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
    pub store: Arc<dyn FightStore>,
    pub cron_secret: Option<String>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/sync/full", post(sync_full_handler))
        .route("/api/sync/recent", post(sync_recent_handler))
        .route("/api/sync/rankings", post(sync_rankings_handler))
        .route("/api/cron/sync", get(cron_sync_handler))
        .route("/api/events/upcoming", get(upcoming_events_handler))
        .route("/api/fighters", get(fighters_handler))
        .with_state(Arc::new(state))
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct SyncResponse {
    success: bool,
    events_processed: u64,
    fights_processed: u64,
    fights_skipped: u64,
    fighters_processed: u64,
    errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SyncResponse {
    fn from_result(result: Result<SyncStats, SyncError>) -> Self {
        match result {
            Ok(stats) => Self {
                success: true,
                events_processed: stats.events,
                fights_processed: stats.fights,
                fights_skipped: stats.fights_skipped,
                fighters_processed: stats.fighters,
                errors: stats.errors,
                error: None,
            },
            Err(err) => Self {
                success: false,
                events_processed: 0,
                fights_processed: 0,
                fights_skipped: 0,
                fighters_processed: 0,
                errors: 0,
                error: Some(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct RankingsResponse {
    success: bool,
    rankings_processed: u64,
    not_found: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl RankingsResponse {
    fn from_result(result: Result<RankingsReport, SyncError>) -> Self {
        match result {
            Ok(report) => Self {
                success: true,
                rankings_processed: report.rankings_processed,
                not_found: report.not_found,
                error: None,
            },
            Err(err) => Self {
                success: false,
                rankings_processed: 0,
                not_found: 0,
                error: Some(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct CronResponse {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    sync: SyncResponse,
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn sync_full_handler(State(state): State<Arc<AppState>>) -> Json<SyncResponse> {
    Json(SyncResponse::from_result(state.engine.run_full().await))
}

async fn sync_recent_handler(State(state): State<Arc<AppState>>) -> Json<SyncResponse> {
    Json(SyncResponse::from_result(
        state.engine.run_incremental().await,
    ))
}

async fn sync_rankings_handler(State(state): State<Arc<AppState>>) -> Json<RankingsResponse> {
    Json(RankingsResponse::from_result(
        state.engine.run_rankings().await,
    ))
}

/// The production sync trigger for an external scheduler. When a cron secret
/// is configured the request must carry it as a bearer token.
async fn cron_sync_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Some(secret) = &state.cron_secret {
        let expected = format!("Bearer {secret}");
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "unauthorized"})),
            )
                .into_response();
        }
    }
    Json(CronResponse {
        timestamp: Utc::now(),
        sync: SyncResponse::from_result(state.engine.run_incremental().await),
    })
    .into_response()
}

#[derive(Debug, Serialize)]
struct UpcomingEventRow {
    id: String,
    name: String,
    date: DateTime<Utc>,
    venue: String,
    location: String,
    kind: String,
    fight_count: i64,
}

async fn upcoming_events_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.store.upcoming_events(Utc::now(), UPCOMING_LIMIT).await {
        Ok(rows) => {
            let events: Vec<UpcomingEventRow> = rows
                .into_iter()
                .map(|row| {
                    let location = [row.event.city.as_str(), row.event.country.as_str()]
                        .iter()
                        .filter(|part| !part.is_empty())
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ");
                    UpcomingEventRow {
                        id: row.event.id.to_string(),
                        name: row.event.name,
                        date: row.event.date,
                        venue: row.event.venue,
                        location,
                        kind: row.event.kind.as_str().to_string(),
                        fight_count: row.fight_count,
                    }
                })
                .collect();
            Json(serde_json::json!({ "events": events })).into_response()
        }
        Err(err) => server_error(err.to_string()),
    }
}

#[derive(Debug, Deserialize, Default)]
struct FightersQuery {
    search: Option<String>,
    weight_class: Option<String>,
    gender: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn fighters_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FightersQuery>,
) -> Response {
    let weight_class = match query.weight_class.as_deref() {
        Some(raw) => match WeightClass::parse(&raw.to_uppercase()) {
            Some(wc) => Some(wc),
            None => return bad_request(format!("unknown weight class {raw:?}")),
        },
        None => None,
    };
    let gender = match query.gender.as_deref() {
        Some(raw) => match Gender::parse(&raw.to_uppercase()) {
            Some(gender) => Some(gender),
            None => return bad_request(format!("unknown gender {raw:?}")),
        },
        None => None,
    };

    let filter = FighterFilter {
        organization_id: None,
        search: query.search.clone().filter(|s| !s.trim().is_empty()),
        gender,
        weight_class,
        limit: query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE),
        offset: query.offset.unwrap_or(0).max(0),
    };
    match state.store.search_fighters(&filter).await {
        Ok(fighters) => Json(serde_json::json!({ "fighters": fighters })).into_response(),
        Err(err) => server_error(err.to_string()),
    }
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message})),
    )
        .into_response()
}

fn server_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": message})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use chrono::Duration;
    use fightgrid_client::{
        AthleteDoc, DateRange, EventDoc, FetchError, FightSource, RecordsDoc,
    };
    use fightgrid_core::{
        EventDraft, EventKind, FightRecord, FighterDraft, NewOrganization, Stance,
    };
    use fightgrid_storage::MemoryStore;
    use fightgrid_sync::SyncConfig;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct EmptySource;

    #[async_trait]
    impl FightSource for EmptySource {
        async fn event_ids(&self, _range: DateRange) -> Result<Vec<String>, FetchError> {
            Ok(vec![])
        }

        async fn event(&self, event_id: &str) -> Result<EventDoc, FetchError> {
            Err(FetchError::HttpStatus {
                status: 404,
                url: event_id.to_string(),
            })
        }

        async fn athlete(&self, href: &str) -> Result<AthleteDoc, FetchError> {
            Err(FetchError::HttpStatus {
                status: 404,
                url: href.to_string(),
            })
        }

        async fn athlete_records(&self, athlete_id: &str) -> Result<RecordsDoc, FetchError> {
            Err(FetchError::HttpStatus {
                status: 404,
                url: athlete_id.to_string(),
            })
        }

        async fn rankings_page(&self) -> Result<String, FetchError> {
            Ok(String::new())
        }
    }

    fn test_state(store: Arc<MemoryStore>, cron_secret: Option<String>) -> AppState {
        let mut config = SyncConfig::from_env();
        config.organization_short_name = "FG".to_string();
        AppState {
            engine: Arc::new(SyncEngine::new(
                store.clone(),
                Arc::new(EmptySource),
                config,
            )),
            store,
            cron_secret,
        }
    }

    async fn seed_store(store: &MemoryStore) {
        let org = store
            .upsert_organization(&NewOrganization {
                name: "Fightgrid Championship".into(),
                short_name: "FG".into(),
                website: None,
            })
            .await
            .expect("org");
        store
            .insert_fighter(
                org.id,
                &FighterDraft {
                    external_id: Some("1".into()),
                    external_uid: None,
                    first_name: "Jon".into(),
                    last_name: "Jones".into(),
                    nickname: Some("Bones".into()),
                    image_url: None,
                    nationality: None,
                    date_of_birth: None,
                    height_cm: None,
                    reach_cm: None,
                    weight_lbs: None,
                    stance: Stance::Orthodox,
                    gender: Gender::Male,
                    record: FightRecord::default(),
                    weight_class: Some(WeightClass::Heavyweight),
                },
            )
            .await
            .expect("fighter");
        store
            .insert_event(
                org.id,
                &EventDraft {
                    external_id: Some("600".into()),
                    external_uid: None,
                    name: "FG 311".into(),
                    date: Utc::now() + Duration::days(14),
                    venue: "Arena".into(),
                    city: "Las Vegas".into(),
                    country: "USA".into(),
                    kind: EventKind::Ppv,
                },
            )
            .await
            .expect("event");
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let app = app(test_state(Arc::new(MemoryStore::new()), None));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn recent_sync_without_org_reports_structured_failure() {
        // Empty store: the run aborts, but the route still answers 200 with
        // a success flag and error string.
        let app = app(test_state(Arc::new(MemoryStore::new()), None));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/sync/recent")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().expect("error string").contains("FG"));
    }

    #[tokio::test]
    async fn upcoming_events_lists_seeded_card() {
        let store = Arc::new(MemoryStore::new());
        seed_store(&store).await;
        let app = app(test_state(store, None));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/events/upcoming")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let events = body["events"].as_array().expect("events array");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["name"], "FG 311");
        assert_eq!(events[0]["location"], "Las Vegas, USA");
        assert_eq!(events[0]["fight_count"], 0);
    }

    #[tokio::test]
    async fn fighters_search_filters_by_name_and_rejects_bad_enums() {
        let store = Arc::new(MemoryStore::new());
        seed_store(&store).await;
        let app = app(test_state(store, None));

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/fighters?search=jon&weight_class=heavyweight")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let fighters = body["fighters"].as_array().expect("fighters array");
        assert_eq!(fighters.len(), 1);
        assert_eq!(fighters[0]["last_name"], "Jones");

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/fighters?weight_class=openweight")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cron_route_requires_the_bearer_secret_when_configured() {
        let app = app(test_state(
            Arc::new(MemoryStore::new()),
            Some("hunter2".to_string()),
        ));

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/cron/sync")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/cron/sync")
                    .header(header::AUTHORIZATION, "Bearer hunter2")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        // Authorized but the store is empty, so the run itself fails.
        assert_eq!(body["success"], false);
        assert!(body["timestamp"].is_string());
    }
}
