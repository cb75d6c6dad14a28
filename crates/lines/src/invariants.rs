//! Constraints every committed line must satisfy. Checked on each staged
//! line before a transaction commits; the first violation aborts it.

use contract_core::{LineError, LineResult};
use uuid::Uuid;

use crate::types::ContractLine;

/// Resolves neighbouring lines (successor / predecessor) as they will be
/// after the commit.
pub trait LineLookup {
    fn lookup(&self, id: Uuid) -> Option<ContractLine>;
}

pub fn validate(line: &ContractLine, lookup: &dyn LineLookup) -> LineResult<()> {
    check_dates(line)?;
    check_auto_renew(line)?;
    check_chain(line, lookup)?;
    check_invoicing(line)?;
    Ok(())
}

fn violation(line: &ContractLine, reason: &str) -> LineError {
    LineError::invariant(line.id, format!("'{}': {reason}", line.name))
}

fn check_dates(line: &ContractLine) -> LineResult<()> {
    if matches!(line.date_end, Some(end) if line.date_start > end) {
        return Err(violation(line, "start date can't be later than end date"));
    }
    Ok(())
}

fn check_auto_renew(line: &ContractLine) -> LineResult<()> {
    if !line.is_auto_renew {
        return Ok(());
    }
    if line.is_canceled {
        return Err(violation(line, "a canceled line can't be set to auto-renew"));
    }
    if line.date_end.is_none() {
        return Err(violation(line, "an auto-renew line must have an end date"));
    }
    if line.successor_line_id.is_some() {
        return Err(violation(line, "a line with a successor can't be set to auto-renew"));
    }
    Ok(())
}

fn check_chain(line: &ContractLine, lookup: &dyn LineLookup) -> LineResult<()> {
    if let Some(successor_id) = line.successor_line_id {
        let Some(end) = line.date_end else {
            return Err(violation(line, "a line with a successor must have an end date"));
        };
        let successor = lookup
            .lookup(successor_id)
            .ok_or_else(|| violation(line, "successor line does not exist"))?;
        if end >= successor.date_start {
            return Err(violation(line, "line and its successor overlap"));
        }
        if successor.predecessor_line_id != Some(line.id) {
            return Err(violation(line, "successor does not point back to this line"));
        }
    }
    // Canceled lines may keep a stale predecessor link.
    if let Some(predecessor_id) = line.predecessor_line_id.filter(|_| !line.is_canceled) {
        if let Some(predecessor) = lookup.lookup(predecessor_id) {
            if matches!(predecessor.date_end, Some(end) if line.date_start <= end) {
                return Err(violation(line, "line and its predecessor overlap"));
            }
            if matches!(predecessor.successor_line_id, Some(other) if other != line.id) {
                return Err(violation(line, "predecessor is chained to another line"));
            }
        }
    }
    Ok(())
}

fn check_invoicing(line: &ContractLine) -> LineResult<()> {
    if !line.is_billable() {
        return Ok(());
    }
    if let Some(last) = line.last_date_invoiced {
        if matches!(line.date_end, Some(end) if end < last) {
            return Err(violation(line, "end date is before the date of last invoice"));
        }
        if line.date_start > last {
            return Err(violation(line, "start date is after the date of last invoice"));
        }
        if matches!(line.next_invoice_date, Some(next) if next <= last) {
            return Err(violation(
                line,
                "next invoice date is not after the date of last invoice",
            ));
        }
    }
    match line.next_invoice_date {
        Some(next) if next < line.date_start => Err(violation(
            line,
            "next invoice date is before the start of the line",
        )),
        Some(_) => Ok(()),
        None => {
            let fully_invoiced = matches!(
                (line.date_end, line.last_date_invoiced),
                (Some(end), Some(last)) if last >= end
            );
            if fully_invoiced {
                Ok(())
            } else {
                Err(violation(line, "a next invoice date must be supplied"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rule;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Lines(HashMap<Uuid, ContractLine>);

    impl LineLookup for Lines {
        fn lookup(&self, id: Uuid) -> Option<ContractLine> {
            self.0.get(&id).cloned()
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn line() -> ContractLine {
        let mut line =
            ContractLine::new(Uuid::new_v4(), "Licence", d(2025, 1, 1)).with_end(d(2025, 12, 31));
        line.next_invoice_date = Some(d(2025, 1, 1));
        line
    }

    fn reason(err: LineError) -> String {
        match err {
            LineError::InvariantViolation { reason, .. } => reason,
            other => panic!("expected invariant violation, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_line_passes() {
        assert!(validate(&line(), &Lines::default()).is_ok());
    }

    #[test]
    fn test_start_after_end() {
        let mut l = line();
        l.date_end = Some(d(2024, 12, 31));
        assert!(reason(validate(&l, &Lines::default()).unwrap_err()).contains("later than"));
    }

    #[test]
    fn test_auto_renew_needs_end_date() {
        let mut l = line();
        l.date_end = None;
        l.is_auto_renew = true;
        assert!(reason(validate(&l, &Lines::default()).unwrap_err()).contains("end date"));
    }

    #[test]
    fn test_canceled_auto_renew() {
        let mut l = line().with_auto_renew(Rule::yearly(1));
        l.is_canceled = true;
        assert!(reason(validate(&l, &Lines::default()).unwrap_err()).contains("canceled"));
    }

    #[test]
    fn test_successor_overlap_is_strict() {
        let mut pred = line();
        let mut succ = line();
        succ.date_start = d(2025, 12, 31);
        succ.date_end = Some(d(2026, 12, 31));
        succ.next_invoice_date = Some(d(2025, 12, 31));
        succ.predecessor_line_id = Some(pred.id);
        pred.successor_line_id = Some(succ.id);

        let mut lines = Lines::default();
        lines.0.insert(pred.id, pred.clone());
        lines.0.insert(succ.id, succ.clone());
        assert!(reason(validate(&pred, &lines).unwrap_err()).contains("overlap"));
        assert!(reason(validate(&succ, &lines).unwrap_err()).contains("overlap"));

        succ.date_start = d(2026, 1, 1);
        succ.next_invoice_date = Some(d(2026, 1, 1));
        lines.0.insert(succ.id, succ.clone());
        assert!(validate(&pred, &lines).is_ok());
        assert!(validate(&succ, &lines).is_ok());
    }

    #[test]
    fn test_successor_excludes_auto_renew() {
        let mut l = line().with_auto_renew(Rule::yearly(1));
        l.successor_line_id = Some(Uuid::new_v4());
        assert!(reason(validate(&l, &Lines::default()).unwrap_err()).contains("successor"));
    }

    #[test]
    fn test_pairing_must_be_mutual() {
        let mut pred = line();
        let mut succ = line();
        succ.date_start = d(2026, 1, 1);
        succ.date_end = Some(d(2026, 12, 31));
        succ.next_invoice_date = Some(d(2026, 1, 1));
        pred.successor_line_id = Some(succ.id);

        let mut lines = Lines::default();
        lines.0.insert(succ.id, succ.clone());
        assert!(reason(validate(&pred, &lines).unwrap_err()).contains("point back"));
    }

    #[test]
    fn test_canceled_line_skips_predecessor_pairing() {
        let mut pred = line();
        let mut stale = line();
        stale.date_start = d(2026, 1, 1);
        stale.date_end = Some(d(2026, 12, 31));
        stale.next_invoice_date = Some(d(2026, 1, 1));
        stale.is_canceled = true;
        stale.predecessor_line_id = Some(pred.id);
        pred.successor_line_id = Some(Uuid::new_v4());

        let mut lines = Lines::default();
        lines.0.insert(pred.id, pred.clone());
        assert!(validate(&stale, &lines).is_ok());

        stale.is_canceled = false;
        assert!(reason(validate(&stale, &lines).unwrap_err()).contains("chained to another"));
    }

    #[test]
    fn test_invoicing_consistency() {
        let mut l = line();
        l.last_date_invoiced = Some(d(2025, 1, 31));
        l.next_invoice_date = Some(d(2025, 1, 31));
        assert!(reason(validate(&l, &Lines::default()).unwrap_err()).contains("next invoice"));

        l.next_invoice_date = Some(d(2025, 2, 1));
        assert!(validate(&l, &Lines::default()).is_ok());

        l.date_end = Some(d(2025, 1, 15));
        assert!(reason(validate(&l, &Lines::default()).unwrap_err()).contains("last invoice"));
    }

    #[test]
    fn test_missing_next_invoice_date_only_when_fully_invoiced() {
        let mut l = line();
        l.next_invoice_date = None;
        assert!(validate(&l, &Lines::default()).is_err());
        l.last_date_invoiced = Some(d(2025, 12, 31));
        assert!(validate(&l, &Lines::default()).is_ok());
    }
}
