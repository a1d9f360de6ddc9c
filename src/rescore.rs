//! Repair of persisted score fields.
//!
//! Rows written by older clients, or edited directly in the store, can carry a
//! `final_score`/`score_color` that no longer matches their metrics. This pass
//! recomputes every score and patches only the rows that disagree.

use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::Company;
use crate::record_store::{Record, RecordStore};
use crate::scoring::ScoringEngine;

/// Counts reported by [`rescore_collection`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RescoreSummary {
    pub scanned: usize,
    pub consistent: usize,
    /// Rows whose score was (or, in a dry run, would be) rewritten.
    pub rescored: usize,
    /// Rows that could not be decoded.
    pub skipped: usize,
    /// Rows whose patch failed.
    pub failed: Vec<Uuid>,
}

/// Recomputes the score of every record in `collection`.
///
/// Per-record failures are logged and counted; only a failure to read the
/// collection aborts the pass.
pub async fn rescore_collection(
    records: &dyn RecordStore,
    collection: &str,
    dry_run: bool,
) -> Result<RescoreSummary, AppError> {
    let rows = records.select_all(collection).await?;
    let mut summary = RescoreSummary::default();

    for row in rows {
        summary.scanned += 1;

        let company = match Company::from_record(row) {
            Ok(company) => company,
            Err(e) => {
                tracing::warn!("Skipping undecodable record: {}", e);
                summary.skipped += 1;
                continue;
            }
        };

        let expected = ScoringEngine::score(&company);
        if expected.matches(&company.score()) {
            summary.consistent += 1;
            continue;
        }

        tracing::info!(
            "Company {} ({}): stored {:.2} {} != computed {:.2} {}",
            company.id,
            company.name,
            company.final_score,
            company.score_color,
            expected.final_score,
            expected.score_color
        );

        if dry_run {
            summary.rescored += 1;
            continue;
        }

        let mut fields = Record::new();
        expected.write_into(&mut fields);
        match records.update_partial(collection, company.id, fields).await {
            Ok(_) => summary.rescored += 1,
            Err(e) => {
                tracing::error!("Failed to rescore company {}: {}", company.id, e);
                summary.failed.push(company.id);
            }
        }
    }

    Ok(summary)
}
