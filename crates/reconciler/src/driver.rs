//! JSON-lines driver: one delivery claim per input line, one response per
//! output line.

use common::InventoryRecordId;
use entity_store::EntityStore;
use reconciliation::{DeliveryClaim, ReconciliationError, ReconciliationService};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// Response written for each non-blank input line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Reconciled {
        inventory_record_id: InventoryRecordId,
    },
    Rejected {
        error: String,
        kind: &'static str,
        retryable: bool,
    },
}

impl Response {
    /// Response for a line that is not a well-formed claim.
    pub fn malformed(err: &serde_json::Error) -> Self {
        Response::Rejected {
            error: format!("Malformed claim: {err}"),
            kind: "malformed_input",
            retryable: false,
        }
    }
}

impl From<std::result::Result<InventoryRecordId, ReconciliationError>> for Response {
    fn from(result: std::result::Result<InventoryRecordId, ReconciliationError>) -> Self {
        match result {
            Ok(inventory_record_id) => Response::Reconciled {
                inventory_record_id,
            },
            Err(err) => Response::Rejected {
                error: err.to_string(),
                kind: err.kind(),
                retryable: err.is_retryable(),
            },
        }
    }
}

/// Counts of what a driver run processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub processed: u64,
    pub reconciled: u64,
    pub rejected: u64,
}

impl Summary {
    fn record(&mut self, response: &Response) {
        self.processed += 1;
        match response {
            Response::Reconciled { .. } => self.reconciled += 1,
            Response::Rejected { .. } => self.rejected += 1,
        }
    }
}

/// Reconciles every claim read from `reader`, in order, writing one JSON
/// response per claim to `writer`.
///
/// Blank lines are skipped. Claim failures are reported in the output and do
/// not stop the run; only I/O failures do.
pub async fn run<S, R, W>(
    service: &ReconciliationService<S>,
    reader: R,
    mut writer: W,
) -> Result<Summary>
where
    S: EntityStore,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut summary = Summary::default();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<DeliveryClaim>(line) {
            Ok(claim) => Response::from(service.reconcile(claim).await),
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed claim");
                Response::malformed(&err)
            }
        };
        summary.record(&response);

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
    }

    tracing::info!(
        processed = summary.processed,
        reconciled = summary.reconciled,
        rejected = summary.rejected,
        "input exhausted"
    );
    Ok(summary)
}
