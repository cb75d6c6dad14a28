//! Display-state resolution, per record and as filters.
//!
//! Every billable line resolves to exactly one [`LineState`]; markers
//! resolve to `None`. [`state_domain`] returns, for each state, a filter
//! that selects exactly the lines [`resolve_state`] puts in that state, so
//! the seven domains (six states plus markers) partition every collection.

use chrono::NaiveDate;

use crate::domain::{Domain, Field};
use crate::temporal::{classify, Position};
use crate::types::{ContractLine, LineState};

/// Precedence, first match wins:
///
/// | # | condition | state |
/// |---|-----------|-------|
/// | 1 | display marker | none |
/// | 2 | canceled | canceled |
/// | 3 | BEFORE | upcoming |
/// | 4 | IN, not auto-renew, no manual renewal, notice date passed | upcoming-close |
/// | 5 | IN otherwise | in-progress |
/// | 6 | AFTER, (manual renewal and no successor) or auto-renew | to-renew |
/// | 7 | AFTER otherwise | closed |
pub fn resolve_state(line: &ContractLine, today: NaiveDate) -> Option<LineState> {
    if !line.is_billable() {
        return None;
    }
    if line.is_canceled {
        return Some(LineState::Canceled);
    }
    let state = match classify(today, line.date_start, line.date_end) {
        Position::Before => LineState::Upcoming,
        Position::In => {
            let notice_passed = line
                .termination_notice_date()
                .is_some_and(|notice| notice < today);
            if notice_passed && !line.is_auto_renew && !line.manual_renew_needed {
                LineState::UpcomingClose
            } else {
                LineState::InProgress
            }
        }
        Position::After => {
            let awaiting_manual = line.manual_renew_needed && line.successor_line_id.is_none();
            if awaiting_manual || line.is_auto_renew {
                LineState::ToRenew
            } else {
                LineState::Closed
            }
        }
    };
    Some(state)
}

/// Filter equivalent to `resolve_state(line, today) == state`.
pub fn state_domain(state: Option<LineState>, today: NaiveDate) -> Domain {
    let Some(state) = state else {
        return Domain::is_set(Field::DisplayType);
    };
    let billable = Domain::is_null(Field::DisplayType);
    let live = Domain::eq(Field::IsCanceled, false);
    let started = Domain::le(Field::DateStart, today);
    let not_ended = Domain::or(vec![
        Domain::ge(Field::DateEnd, today),
        Domain::is_null(Field::DateEnd),
    ]);
    let ended = Domain::lt(Field::DateEnd, today);

    let parts = match state {
        LineState::Canceled => vec![billable, Domain::eq(Field::IsCanceled, true)],
        LineState::Upcoming => vec![billable, live, Domain::gt(Field::DateStart, today)],
        LineState::InProgress => vec![
            billable,
            live,
            started,
            not_ended,
            Domain::or(vec![
                Domain::eq(Field::IsAutoRenew, true),
                Domain::eq(Field::ManualRenewNeeded, true),
                Domain::is_null(Field::TerminationNoticeDate),
                Domain::ge(Field::TerminationNoticeDate, today),
            ]),
        ],
        LineState::UpcomingClose => vec![
            billable,
            live,
            started,
            Domain::ge(Field::DateEnd, today),
            Domain::eq(Field::IsAutoRenew, false),
            Domain::eq(Field::ManualRenewNeeded, false),
            Domain::lt(Field::TerminationNoticeDate, today),
        ],
        LineState::ToRenew => vec![
            billable,
            live,
            ended,
            Domain::or(vec![
                Domain::and(vec![
                    Domain::eq(Field::ManualRenewNeeded, true),
                    Domain::is_null(Field::SuccessorLine),
                ]),
                Domain::eq(Field::IsAutoRenew, true),
            ]),
        ],
        LineState::Closed => vec![
            billable,
            live,
            ended,
            Domain::eq(Field::IsAutoRenew, false),
            Domain::or(vec![
                Domain::eq(Field::ManualRenewNeeded, false),
                Domain::is_set(Field::SuccessorLine),
            ]),
        ],
    };
    Domain::and(parts)
}

/// A state search as issued by a caller: `=`, `!=`, `in`, `not in`.
/// `None` stands for the blank state of display markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateFilter {
    Is(Option<LineState>),
    IsNot(Option<LineState>),
    In(Vec<Option<LineState>>),
    NotIn(Vec<Option<LineState>>),
}

fn all_states() -> impl Iterator<Item = Option<LineState>> {
    LineState::ALL.into_iter().map(Some).chain(std::iter::once(None))
}

impl StateFilter {
    /// Negated forms are rewritten as the union of the complementary
    /// states; the partition makes that equal to the negation.
    pub fn domain(&self, today: NaiveDate) -> Domain {
        match self {
            StateFilter::Is(state) => state_domain(*state, today),
            StateFilter::IsNot(state) => Self::union(all_states().filter(|s| s != state), today),
            StateFilter::In(states) => Self::union(states.iter().copied(), today),
            StateFilter::NotIn(states) => {
                Self::union(all_states().filter(|s| !states.contains(s)), today)
            }
        }
    }

    fn union(states: impl Iterator<Item = Option<LineState>>, today: NaiveDate) -> Domain {
        let parts: Vec<Domain> = states.map(|s| state_domain(s, today)).collect();
        if parts.is_empty() {
            Domain::False
        } else {
            Domain::or(parts)
        }
    }
}
