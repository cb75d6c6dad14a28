//! What the invoice generator reads from, and writes back to, a line.

use chrono::NaiveDate;
use contract_core::{LineError, LineResult};
use serde::{Deserialize, Serialize};

use crate::recurrence::plus_days;
use crate::temporal::{classify, Position};
use crate::types::{ContractLine, DisplayType};

pub const START_MARKER: &str = "#START#";
pub const END_MARKER: &str = "#END#";

/// One period ready to be invoiced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub invoice_date: NaiveDate,
}

/// First day not yet invoiced, `None` once the line is fully invoiced.
pub fn next_period_date_start(line: &ContractLine) -> Option<NaiveDate> {
    let start = match line.last_date_invoiced {
        Some(last) => plus_days(last, 1),
        None => line.date_start,
    };
    match line.date_end {
        Some(end) if start > end => None,
        _ => Some(start),
    }
}

pub fn next_period_to_invoice(line: &ContractLine) -> Option<InvoicePeriod> {
    let invoice_date = line.next_invoice_date?;
    let start = next_period_date_start(line)?;
    let end = line
        .recurrence
        .next_period_date_end(start, line.date_end, Some(invoice_date))?;
    Some(InvoicePeriod {
        start,
        end,
        invoice_date,
    })
}

pub fn quantity_to_invoice(line: &ContractLine, _period: &InvoicePeriod) -> f64 {
    if line.is_billable() {
        line.quantity
    } else {
        0.0
    }
}

pub fn insert_markers(name: &str, start: NaiveDate, end: NaiveDate, date_format: &str) -> String {
    name.replace(START_MARKER, &start.format(date_format).to_string())
        .replace(END_MARKER, &end.format(date_format).to_string())
}

pub fn invoice_description(line: &ContractLine, period: &InvoicePeriod, date_format: &str) -> String {
    insert_markers(&line.name, period.start, period.end, date_format)
}

/// Whether the line should be offered to the invoice generator today.
pub fn is_invoice_creation_visible(line: &ContractLine, today: NaiveDate) -> bool {
    let carried = line.is_billable()
        || (line.display_type == Some(DisplayType::Note) && line.is_recurring_note);
    carried
        && !line.is_canceled
        && line.next_invoice_date.is_some()
        && classify(today, line.date_start, None) != Position::Before
}

/// Mark everything up to `through` as invoiced and move the next invoice
/// date to the following period.
pub fn advance(line: &mut ContractLine, through: NaiveDate) -> LineResult<()> {
    if through < line.date_start {
        return Err(LineError::InvalidArgument(format!(
            "cannot invoice line {} through {through}, before its start {}",
            line.id, line.date_start
        )));
    }
    if matches!(line.last_date_invoiced, Some(last) if through <= last) {
        return Err(LineError::InvalidArgument(format!(
            "line {} is already invoiced through {through}",
            line.id
        )));
    }
    if matches!(line.date_end, Some(end) if through > end) {
        return Err(LineError::InvalidArgument(format!(
            "cannot invoice line {} past its end",
            line.id
        )));
    }
    line.last_date_invoiced = Some(through);
    line.next_invoice_date = line
        .recurrence
        .next_invoice_date(next_period_date_start(line), line.date_end);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InvoicingType, Recurrence, Rule};
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn monthly_line() -> ContractLine {
        let mut line = ContractLine::new(Uuid::new_v4(), "Hosting #START# - #END#", d(2025, 1, 1))
            .with_end(d(2025, 3, 15));
        line.next_invoice_date = Some(d(2025, 1, 1));
        line.quantity = 3.0;
        line
    }

    #[test]
    fn test_period_walk_to_completion() {
        let mut line = monthly_line();
        let first = next_period_to_invoice(&line).unwrap();
        assert_eq!(first.start, d(2025, 1, 1));
        assert_eq!(first.end, d(2025, 1, 31));

        advance(&mut line, first.end).unwrap();
        assert_eq!(line.next_invoice_date, Some(d(2025, 2, 1)));
        let second = next_period_to_invoice(&line).unwrap();
        assert_eq!((second.start, second.end), (d(2025, 2, 1), d(2025, 2, 28)));

        advance(&mut line, second.end).unwrap();
        let last = next_period_to_invoice(&line).unwrap();
        assert_eq!(last.end, d(2025, 3, 15));

        advance(&mut line, last.end).unwrap();
        assert_eq!(line.next_invoice_date, None);
        assert_eq!(next_period_date_start(&line), None);
        assert!(next_period_to_invoice(&line).is_none());
    }

    #[test]
    fn test_post_paid_invoice_date_follows_period_end() {
        let mut line = monthly_line()
            .with_recurrence(Recurrence::new(Rule::monthly(1), InvoicingType::PostPaid));
        line.next_invoice_date = line
            .recurrence
            .next_invoice_date(Some(line.date_start), line.date_end);
        assert_eq!(line.next_invoice_date, Some(d(2025, 2, 1)));
        let period = next_period_to_invoice(&line).unwrap();
        assert_eq!((period.start, period.end), (d(2025, 1, 1), d(2025, 1, 31)));
    }

    #[test]
    fn test_advance_rejects_going_backwards() {
        let mut line = monthly_line();
        advance(&mut line, d(2025, 1, 31)).unwrap();
        assert!(advance(&mut line, d(2025, 1, 15)).is_err());
        assert!(advance(&mut line, d(2025, 4, 1)).is_err());
    }

    #[test]
    fn test_description_markers() {
        let line = monthly_line();
        let period = next_period_to_invoice(&line).unwrap();
        assert_eq!(
            invoice_description(&line, &period, "%m/%d/%Y"),
            "Hosting 01/01/2025 - 01/31/2025"
        );
        assert_eq!(quantity_to_invoice(&line, &period), 3.0);
    }

    #[test]
    fn test_invoice_creation_visibility() {
        let line = monthly_line();
        assert!(!is_invoice_creation_visible(&line, d(2024, 12, 31)));
        assert!(is_invoice_creation_visible(&line, d(2025, 1, 1)));

        let mut note = monthly_line().with_display_type(DisplayType::Note);
        assert!(!is_invoice_creation_visible(&note, d(2025, 1, 1)));
        note.is_recurring_note = true;
        assert!(is_invoice_creation_visible(&note, d(2025, 1, 1)));
    }
}
