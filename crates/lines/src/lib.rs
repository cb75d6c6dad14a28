//! Contract-line lifecycle engine. Resolves the display state of recurring
//! billing lines and applies the gated stop / cancel / suspend / renew
//! transitions that move them through their lifecycle.
//!
//! Lines live in a [`LineStore`]; every transition runs inside a
//! [`Transaction`] that stages writes, validates invariants, and commits
//! atomically.

pub mod domain;
pub mod engine;
pub mod invariants;
pub mod invoicing;
pub mod permissions;
pub mod recurrence;
pub mod renewal;
pub mod state;
pub mod store;
pub mod temporal;
pub mod transaction;
pub mod types;

pub use domain::{Domain, Field, Op, Value};
pub use engine::{EngineSettings, LineEngine, LinePatch};
pub use permissions::{LineFacts, Permissions};
pub use renewal::{RenewalJob, RenewalReport};
pub use state::{resolve_state, StateFilter};
pub use store::{ChangeSet, LineStore, MemoryStore, StoreSnapshot};
pub use temporal::{classify, Clock, FixedClock, Position, SystemClock};
pub use transaction::Transaction;
pub use types::{
    Contract, ContractLine, DisplayType, InvoicingType, LineState, Recurrence, Rule, RuleType,
};
