use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Calendar unit of a recurrence, renewal or notice rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Daily,
    Weekly,
    Monthly,
    /// Monthly periods anchored on the first day of the month.
    MonthlyLastDay,
    Quarterly,
    Semesterly,
    Yearly,
}

/// A rule type with its interval, e.g. "every 3 months".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub rule_type: RuleType,
    pub interval: u32,
}

impl Rule {
    pub const fn new(rule_type: RuleType, interval: u32) -> Self {
        Self {
            rule_type,
            interval,
        }
    }

    pub const fn yearly(interval: u32) -> Self {
        Self::new(RuleType::Yearly, interval)
    }

    pub const fn monthly(interval: u32) -> Self {
        Self::new(RuleType::Monthly, interval)
    }

    pub const fn daily(interval: u32) -> Self {
        Self::new(RuleType::Daily, interval)
    }
}

/// Whether a period is invoiced at its start or after its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvoicingType {
    PrePaid,
    PostPaid,
}

/// Invoice period cadence of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub rule: Rule,
    pub invoicing_type: InvoicingType,
    /// Days between the period boundary and the invoice date.
    pub invoicing_offset: i64,
}

impl Recurrence {
    /// Build a recurrence with the default invoicing offset for its type.
    pub fn new(rule: Rule, invoicing_type: InvoicingType) -> Self {
        Self {
            rule,
            invoicing_type,
            invoicing_offset: Self::default_offset(invoicing_type, rule.rule_type),
        }
    }

    pub fn default_offset(invoicing_type: InvoicingType, rule_type: RuleType) -> i64 {
        if invoicing_type == InvoicingType::PrePaid || rule_type == RuleType::MonthlyLastDay {
            0
        } else {
            1
        }
    }
}

impl Default for Recurrence {
    fn default() -> Self {
        Self::new(Rule::monthly(1), InvoicingType::PrePaid)
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Owner of a set of contract lines. Only the termination flag matters to
/// the line lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub is_terminated: bool,
}

impl Contract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_terminated: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Contract line
// ---------------------------------------------------------------------------

/// Non-billable placeholder rows kept in the line list for layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayType {
    Section,
    Note,
}

impl DisplayType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::Note => "note",
        }
    }
}

/// A billable, time-bounded period of a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractLine {
    pub id: Uuid,
    pub contract_id: Uuid,
    #[serde(default)]
    pub sequence: u32,
    pub name: String,
    #[serde(default)]
    pub display_type: Option<DisplayType>,
    /// A note that is still carried onto every invoice.
    #[serde(default)]
    pub is_recurring_note: bool,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    pub date_start: NaiveDate,
    #[serde(default)]
    pub date_end: Option<NaiveDate>,
    #[serde(default)]
    pub is_canceled: bool,
    #[serde(default)]
    pub is_auto_renew: bool,
    /// Set on a temporary stop so the closed period surfaces as to-renew.
    #[serde(default)]
    pub manual_renew_needed: bool,
    #[serde(default)]
    pub last_date_invoiced: Option<NaiveDate>,
    #[serde(default)]
    pub next_invoice_date: Option<NaiveDate>,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default = "default_termination_notice")]
    pub termination_notice: Rule,
    #[serde(default = "default_auto_renew_rule")]
    pub auto_renew_rule: Rule,
    #[serde(default)]
    pub successor_line_id: Option<Uuid>,
    #[serde(default)]
    pub predecessor_line_id: Option<Uuid>,
}

fn default_quantity() -> f64 {
    1.0
}
fn default_termination_notice() -> Rule {
    Rule::monthly(1)
}
fn default_auto_renew_rule() -> Rule {
    Rule::yearly(1)
}

impl ContractLine {
    /// A fresh, open-ended, billable line with default rules.
    pub fn new(contract_id: Uuid, name: impl Into<String>, date_start: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            contract_id,
            sequence: 0,
            name: name.into(),
            display_type: None,
            is_recurring_note: false,
            quantity: default_quantity(),
            date_start,
            date_end: None,
            is_canceled: false,
            is_auto_renew: false,
            manual_renew_needed: false,
            last_date_invoiced: None,
            next_invoice_date: None,
            recurrence: Recurrence::default(),
            termination_notice: default_termination_notice(),
            auto_renew_rule: default_auto_renew_rule(),
            successor_line_id: None,
            predecessor_line_id: None,
        }
    }

    pub fn with_end(mut self, date_end: NaiveDate) -> Self {
        self.date_end = Some(date_end);
        self
    }

    pub fn with_auto_renew(mut self, rule: Rule) -> Self {
        self.is_auto_renew = true;
        self.auto_renew_rule = rule;
        self
    }

    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    pub fn with_termination_notice(mut self, rule: Rule) -> Self {
        self.termination_notice = rule;
        self
    }

    pub fn with_display_type(mut self, display_type: DisplayType) -> Self {
        self.display_type = Some(display_type);
        self
    }

    /// Cutoff after which a line that is not renewed shows as upcoming-close.
    pub fn termination_notice_date(&self) -> Option<NaiveDate> {
        self.date_end
            .map(|end| crate::recurrence::subtract(end, self.termination_notice))
    }

    pub fn is_billable(&self) -> bool {
        self.display_type.is_none()
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Display state of a line relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineState {
    Upcoming,
    InProgress,
    UpcomingClose,
    Closed,
    ToRenew,
    Canceled,
}

impl LineState {
    pub const ALL: [LineState; 6] = [
        LineState::Upcoming,
        LineState::InProgress,
        LineState::UpcomingClose,
        LineState::Closed,
        LineState::ToRenew,
        LineState::Canceled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::InProgress => "in-progress",
            Self::UpcomingClose => "upcoming-close",
            Self::Closed => "closed",
            Self::ToRenew => "to-renew",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for LineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
