//! Boolean filter expressions over contract-line fields.
//!
//! A [`Domain`] is evaluated against a [`LineRow`], a line joined with its
//! owning contract. Absent values are `Value::Null`: equality treats two
//! nulls as equal, ordering comparisons against null are always false.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Contract, ContractLine};

/// Queryable line fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Id,
    ContractId,
    ContractTerminated,
    DisplayType,
    DateStart,
    DateEnd,
    TerminationNoticeDate,
    LastDateInvoiced,
    NextInvoiceDate,
    IsCanceled,
    IsAutoRenew,
    ManualRenewNeeded,
    SuccessorLine,
    PredecessorLine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Date(NaiveDate),
    Id(Uuid),
    Text(String),
    List(Vec<Value>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Id(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    True,
    False,
    Cmp { field: Field, op: Op, value: Value },
    And(Vec<Domain>),
    Or(Vec<Domain>),
    Not(Box<Domain>),
}

/// A line as seen by filters: its own fields plus its contract's.
#[derive(Debug, Clone, Copy)]
pub struct LineRow<'a> {
    pub line: &'a ContractLine,
    pub contract: Option<&'a Contract>,
}

impl<'a> LineRow<'a> {
    pub fn new(line: &'a ContractLine, contract: Option<&'a Contract>) -> Self {
        Self { line, contract }
    }

    pub fn value(&self, field: Field) -> Value {
        let line = self.line;
        match field {
            Field::Id => line.id.into(),
            Field::ContractId => line.contract_id.into(),
            Field::ContractTerminated => {
                Value::Bool(self.contract.is_some_and(|c| c.is_terminated))
            }
            Field::DisplayType => line
                .display_type
                .map_or(Value::Null, |t| Value::Text(t.as_str().to_string())),
            Field::DateStart => line.date_start.into(),
            Field::DateEnd => line.date_end.into(),
            Field::TerminationNoticeDate => line.termination_notice_date().into(),
            Field::LastDateInvoiced => line.last_date_invoiced.into(),
            Field::NextInvoiceDate => line.next_invoice_date.into(),
            Field::IsCanceled => line.is_canceled.into(),
            Field::IsAutoRenew => line.is_auto_renew.into(),
            Field::ManualRenewNeeded => line.manual_renew_needed.into(),
            Field::SuccessorLine => line.successor_line_id.into(),
            Field::PredecessorLine => line.predecessor_line_id.into(),
        }
    }
}

impl Domain {
    pub fn cmp(field: Field, op: Op, value: impl Into<Value>) -> Self {
        Domain::Cmp {
            field,
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: Field, value: impl Into<Value>) -> Self {
        Self::cmp(field, Op::Eq, value)
    }

    pub fn ne(field: Field, value: impl Into<Value>) -> Self {
        Self::cmp(field, Op::Ne, value)
    }

    pub fn lt(field: Field, value: impl Into<Value>) -> Self {
        Self::cmp(field, Op::Lt, value)
    }

    pub fn le(field: Field, value: impl Into<Value>) -> Self {
        Self::cmp(field, Op::Le, value)
    }

    pub fn gt(field: Field, value: impl Into<Value>) -> Self {
        Self::cmp(field, Op::Gt, value)
    }

    pub fn ge(field: Field, value: impl Into<Value>) -> Self {
        Self::cmp(field, Op::Ge, value)
    }

    pub fn is_in(field: Field, values: Vec<Value>) -> Self {
        Self::cmp(field, Op::In, Value::List(values))
    }

    pub fn not_in(field: Field, values: Vec<Value>) -> Self {
        Self::cmp(field, Op::NotIn, Value::List(values))
    }

    pub fn is_null(field: Field) -> Self {
        Self::eq(field, Value::Null)
    }

    pub fn is_set(field: Field) -> Self {
        Self::ne(field, Value::Null)
    }

    pub fn and(parts: Vec<Domain>) -> Self {
        Domain::And(parts)
    }

    pub fn or(parts: Vec<Domain>) -> Self {
        Domain::Or(parts)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Domain) -> Self {
        Domain::Not(Box::new(inner))
    }

    pub fn matches(&self, row: &LineRow<'_>) -> bool {
        match self {
            Domain::True => true,
            Domain::False => false,
            Domain::Cmp { field, op, value } => compare(&row.value(*field), *op, value),
            Domain::And(parts) => parts.iter().all(|p| p.matches(row)),
            Domain::Or(parts) => parts.iter().any(|p| p.matches(row)),
            Domain::Not(inner) => !inner.matches(row),
        }
    }
}

fn compare(actual: &Value, op: Op, expected: &Value) -> bool {
    match op {
        Op::Eq => actual == expected,
        Op::Ne => actual != expected,
        Op::In => match expected {
            Value::List(values) => values.contains(actual),
            other => actual == other,
        },
        Op::NotIn => !compare(actual, Op::In, expected),
        Op::Lt | Op::Le | Op::Gt | Op::Ge => {
            let ordering = match (actual, expected) {
                (Value::Date(a), Value::Date(b)) => a.cmp(b),
                (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
                (Value::Text(a), Value::Text(b)) => a.cmp(b),
                _ => return false,
            };
            match op {
                Op::Lt => ordering.is_lt(),
                Op::Le => ordering.is_le(),
                Op::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }
        }
    }
}
