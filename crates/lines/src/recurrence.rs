//! Calendar arithmetic for recurrence, renewal and notice rules.
//!
//! Month-based rules clamp to the end of the target month (Jan 31 + 1
//! month = Feb 28/29). `MonthlyLastDay` first moves to the 1st of the month.

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::types::{InvoicingType, Recurrence, Rule, RuleType};

enum Step {
    Days(u64),
    Months(u32),
}

/// `None` when the interval overflows; callers saturate.
fn step(rule: Rule) -> Option<Step> {
    let n = rule.interval;
    Some(match rule.rule_type {
        RuleType::Daily => Step::Days(u64::from(n)),
        RuleType::Weekly => Step::Days(u64::from(n).checked_mul(7)?),
        RuleType::Monthly | RuleType::MonthlyLastDay => Step::Months(n),
        RuleType::Quarterly => Step::Months(n.checked_mul(3)?),
        RuleType::Semesterly => Step::Months(n.checked_mul(6)?),
        RuleType::Yearly => Step::Months(n.checked_mul(12)?),
    })
}

fn anchor(date: NaiveDate, rule: Rule) -> NaiveDate {
    match rule.rule_type {
        RuleType::MonthlyLastDay => date.with_day(1).unwrap_or(date),
        _ => date,
    }
}

/// `date + rule`.
pub fn add(date: NaiveDate, rule: Rule) -> NaiveDate {
    let date = anchor(date, rule);
    let shifted = step(rule).and_then(|step| match step {
        Step::Days(d) => date.checked_add_days(Days::new(d)),
        Step::Months(m) => date.checked_add_months(Months::new(m)),
    });
    shifted.unwrap_or(NaiveDate::MAX)
}

/// `date - rule`.
pub fn subtract(date: NaiveDate, rule: Rule) -> NaiveDate {
    let date = anchor(date, rule);
    let shifted = step(rule).and_then(|step| match step {
        Step::Days(d) => date.checked_sub_days(Days::new(d)),
        Step::Months(m) => date.checked_sub_months(Months::new(m)),
    });
    shifted.unwrap_or(NaiveDate::MIN)
}

/// Shift by a signed number of days, saturating at the calendar bounds.
pub fn plus_days(date: NaiveDate, days: i64) -> NaiveDate {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(magnitude).unwrap_or(NaiveDate::MAX)
    } else {
        date.checked_sub_days(magnitude).unwrap_or(NaiveDate::MIN)
    }
}

/// Last day of a period of length `rule` starting at `date_start`. Used for
/// the initial end of an auto-renew line and for every renewal term.
pub fn first_date_end(date_start: NaiveDate, rule: Rule) -> NaiveDate {
    plus_days(add(date_start, rule), -1)
}

impl Recurrence {
    /// End of the invoicing period starting at `period_start`, clamped to
    /// `max_date_end`. When the line already has a next invoice date the
    /// period is derived from it instead of from `period_start`.
    pub fn next_period_date_end(
        &self,
        period_start: NaiveDate,
        max_date_end: Option<NaiveDate>,
        next_invoice_date: Option<NaiveDate>,
    ) -> Option<NaiveDate> {
        if matches!(max_date_end, Some(max) if period_start > max) {
            return None;
        }
        let end = match next_invoice_date {
            None => first_date_end(period_start, self.rule),
            Some(invoice_date) => {
                let boundary = plus_days(invoice_date, -self.invoicing_offset);
                match self.invoicing_type {
                    InvoicingType::PrePaid => first_date_end(boundary, self.rule),
                    InvoicingType::PostPaid => boundary,
                }
            }
        };
        Some(match max_date_end {
            Some(max) if end > max => max,
            _ => end,
        })
    }

    /// Invoice date of the period starting at `period_start`; `None` when
    /// there is nothing left to invoice.
    pub fn next_invoice_date(
        &self,
        period_start: Option<NaiveDate>,
        max_date_end: Option<NaiveDate>,
    ) -> Option<NaiveDate> {
        let period_start = period_start?;
        let period_end = self.next_period_date_end(period_start, max_date_end, None)?;
        Some(match self.invoicing_type {
            InvoicingType::PrePaid => plus_days(period_start, self.invoicing_offset),
            InvoicingType::PostPaid => plus_days(period_end, self.invoicing_offset),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_month_rules_clamp_to_month_end() {
        assert_eq!(add(d(2024, 1, 31), Rule::monthly(1)), d(2024, 2, 29));
        assert_eq!(add(d(2023, 1, 31), Rule::monthly(1)), d(2023, 2, 28));
        assert_eq!(add(d(2024, 2, 29), Rule::yearly(1)), d(2025, 2, 28));
        assert_eq!(subtract(d(2024, 3, 31), Rule::monthly(1)), d(2024, 2, 29));
        assert_eq!(
            add(d(2024, 1, 15), Rule::new(RuleType::Quarterly, 1)),
            d(2024, 4, 15)
        );
        assert_eq!(
            add(d(2024, 1, 15), Rule::new(RuleType::Semesterly, 1)),
            d(2024, 7, 15)
        );
    }

    #[test]
    fn test_day_rules() {
        assert_eq!(add(d(2024, 12, 30), Rule::daily(3)), d(2025, 1, 2));
        assert_eq!(
            add(d(2024, 12, 30), Rule::new(RuleType::Weekly, 2)),
            d(2025, 1, 13)
        );
        assert_eq!(plus_days(d(2025, 1, 1), -1), d(2024, 12, 31));
    }

    #[test]
    fn test_monthly_last_day_anchors_on_first() {
        let rule = Rule::new(RuleType::MonthlyLastDay, 1);
        assert_eq!(first_date_end(d(2024, 1, 17), rule), d(2024, 1, 31));
        assert_eq!(first_date_end(d(2024, 2, 1), rule), d(2024, 2, 29));
    }

    #[test]
    fn test_first_date_end_yearly() {
        assert_eq!(first_date_end(d(2025, 1, 1), Rule::yearly(1)), d(2025, 12, 31));
        assert_eq!(first_date_end(d(2024, 3, 15), Rule::yearly(2)), d(2026, 3, 14));
    }

    #[test]
    fn test_prepaid_invoice_date_is_period_start() {
        let recurrence = Recurrence::new(Rule::monthly(1), InvoicingType::PrePaid);
        assert_eq!(recurrence.invoicing_offset, 0);
        assert_eq!(
            recurrence.next_invoice_date(Some(d(2025, 1, 1)), None),
            Some(d(2025, 1, 1))
        );
    }

    #[test]
    fn test_postpaid_invoice_date_follows_period_end() {
        let recurrence = Recurrence::new(Rule::monthly(1), InvoicingType::PostPaid);
        assert_eq!(recurrence.invoicing_offset, 1);
        assert_eq!(
            recurrence.next_invoice_date(Some(d(2025, 1, 1)), None),
            Some(d(2025, 2, 1))
        );
        // clamped period
        assert_eq!(
            recurrence.next_invoice_date(Some(d(2025, 1, 1)), Some(d(2025, 1, 10))),
            Some(d(2025, 1, 11))
        );
    }

    #[test]
    fn test_nothing_to_invoice_past_max_end() {
        let recurrence = Recurrence::default();
        assert_eq!(
            recurrence.next_invoice_date(Some(d(2025, 2, 1)), Some(d(2025, 1, 31))),
            None
        );
        assert_eq!(recurrence.next_invoice_date(None, None), None);
    }

    #[test]
    fn test_period_end_from_next_invoice_date() {
        let prepaid = Recurrence::default();
        assert_eq!(
            prepaid.next_period_date_end(d(2025, 1, 1), None, Some(d(2025, 1, 1))),
            Some(d(2025, 1, 31))
        );
        let postpaid = Recurrence::new(Rule::monthly(1), InvoicingType::PostPaid);
        assert_eq!(
            postpaid.next_period_date_end(d(2025, 1, 1), None, Some(d(2025, 2, 1))),
            Some(d(2025, 1, 31))
        );
        assert_eq!(
            prepaid.next_period_date_end(d(2025, 1, 1), Some(d(2025, 1, 20)), None),
            Some(d(2025, 1, 20))
        );
    }

    #[test]
    fn test_huge_intervals_saturate() {
        let start = d(2025, 1, 1);
        assert_eq!(add(start, Rule::yearly(400_000_000)), NaiveDate::MAX);
        assert_eq!(subtract(start, Rule::yearly(400_000_000)), NaiveDate::MIN);
        assert_eq!(add(start, Rule::new(RuleType::Quarterly, u32::MAX)), NaiveDate::MAX);
        assert_eq!(add(start, Rule::new(RuleType::Weekly, u32::MAX)), NaiveDate::MAX);
    }
}
