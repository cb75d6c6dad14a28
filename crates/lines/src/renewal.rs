//! Periodic renewal of auto-renew lines whose notice date has passed.

use std::sync::Arc;

use chrono::NaiveDate;
use contract_core::LineResult;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::LineEngine;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenewalReport {
    /// `(line, last renewed)` pairs; equal ids mean an in-place extension.
    pub renewed: Vec<(Uuid, Uuid)>,
    /// Lines whose renewal was rejected, with the reason.
    pub failed: Vec<(Uuid, String)>,
}

impl RenewalReport {
    pub fn is_empty(&self) -> bool {
        self.renewed.is_empty() && self.failed.is_empty()
    }
}

pub struct RenewalJob {
    engine: Arc<LineEngine>,
}

impl RenewalJob {
    pub fn new(engine: Arc<LineEngine>) -> Self {
        Self { engine }
    }

    /// Renew every due line in its own transaction, adding terms until the
    /// line is no longer due on `today`. A rejected line is reported and
    /// does not stop the sweep.
    pub fn run(&self, today: NaiveDate) -> LineResult<RenewalReport> {
        let due = self.engine.lines_due_for_renewal(today)?;
        info!(today = %today, due = due.len(), "Renewal sweep started");

        let mut report = RenewalReport::default();
        for line in due {
            match self.engine.renew_due(line.id, today) {
                Ok(pair) => report.renewed.push(pair),
                Err(e) => {
                    warn!(line_id = %line.id, contract_id = %line.contract_id, error = %e, "Renewal failed");
                    report.failed.push((line.id, e.to_string()));
                }
            }
        }

        info!(
            today = %today,
            renewed = report.renewed.len(),
            failed = report.failed.len(),
            "Renewal sweep finished"
        );
        Ok(report)
    }
}
