//! Rankings sync: a separable state machine that replaces the organization's
//! active ranking set wholesale on each run. Ranking rows are not long-lived
//! entities, so there is no incremental patching.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use fightgrid_client::parse_rankings;
use fightgrid_core::{NewRanking, WeightClass};

use crate::pipeline::SyncEngine;
use crate::resolve::resolve_fighter_by_name;
use crate::SyncError;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RankingsReport {
    pub rankings_processed: u64,
    pub not_found: u64,
}

impl SyncEngine {
    /// Fetch the rankings page, resolve each listed name, then delete the
    /// active set and recreate it from the parse. Names that resolve to no
    /// stored fighter are counted and reported, never fatal.
    pub async fn run_rankings(&self) -> Result<RankingsReport, SyncError> {
        let organization = self.required_organization().await?;

        self.pacer().pace(self.config().event_pace).await;
        let html = self.source().rankings_page().await?;
        let entries = parse_rankings(&html)?;
        info!(entries = entries.len(), "rankings page parsed");

        let mut resolved: Vec<(Uuid, WeightClass, i32)> = Vec::new();
        let mut not_found = 0u64;
        for entry in &entries {
            match resolve_fighter_by_name(self.store(), organization.id, &entry.name).await? {
                Some(fighter) => resolved.push((fighter.id, entry.weight_class, entry.rank)),
                None => {
                    warn!(
                        name = entry.name.as_str(),
                        division = entry.weight_class.as_str(),
                        rank = entry.rank,
                        "ranked fighter not found"
                    );
                    not_found += 1;
                }
            }
        }

        self.store().delete_active_rankings(organization.id).await?;
        let mut processed = 0u64;
        for (fighter_id, weight_class, rank) in resolved {
            self.store()
                .upsert_ranking(&NewRanking {
                    fighter_id,
                    organization_id: organization.id,
                    weight_class,
                    rank,
                })
                .await?;
            processed += 1;
        }

        info!(processed, not_found, "rankings sync finished");
        Ok(RankingsReport {
            rankings_processed: processed,
            not_found,
        })
    }
}
