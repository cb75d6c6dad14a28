//! Line engine: the stop / cancel / un-cancel / delay / successor /
//! suspend / renew transitions, plus creation, edits and the invoicing
//! write-back.
//!
//! Every public operation takes a batch of line ids, checks the permission
//! gate for all of them first, then stages its writes in one
//! [`Transaction`]. Events are published only after the commit succeeds.

use std::sync::Arc;

use chrono::NaiveDate;
use contract_core::config::AppConfig;
use contract_core::event_bus::{make_event, noop_sink, EventSink};
use contract_core::types::EventType;
use contract_core::{LineError, LineResult};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{Domain, Field, Value};
use crate::invoicing::{self, InvoicePeriod};
use crate::permissions::{permissions_for, Permission, Permissions};
use crate::recurrence::{first_date_end, plus_days};
use crate::state::{resolve_state, StateFilter};
use crate::store::LineStore;
use crate::temporal::{Clock, SystemClock};
use crate::transaction::Transaction;
use crate::types::{ContractLine, LineState, Recurrence, Rule};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Renew by closing the line and planning a successor instead of
    /// extending it in place.
    pub create_new_line_on_renew: bool,
    pub date_format: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for EngineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            create_new_line_on_renew: config.renewal.create_new_line_on_renew,
            date_format: config.invoicing.date_format.clone(),
        }
    }
}

/// Field edits accepted by [`LineEngine::update`]. `None` leaves a field
/// alone; the nested options of nullable fields clear them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinePatch {
    pub name: Option<String>,
    pub sequence: Option<u32>,
    pub quantity: Option<f64>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<Option<NaiveDate>>,
    pub is_auto_renew: Option<bool>,
    pub manual_renew_needed: Option<bool>,
    pub next_invoice_date: Option<Option<NaiveDate>>,
    pub recurrence: Option<Recurrence>,
    pub termination_notice: Option<Rule>,
    pub auto_renew_rule: Option<Rule>,
}

impl LinePatch {
    fn apply(self, line: &mut ContractLine) {
        if let Some(v) = self.name {
            line.name = v;
        }
        if let Some(v) = self.sequence {
            line.sequence = v;
        }
        if let Some(v) = self.quantity {
            line.quantity = v;
        }
        if let Some(v) = self.date_start {
            line.date_start = v;
        }
        if let Some(v) = self.date_end {
            line.date_end = v;
        }
        if let Some(v) = self.is_auto_renew {
            line.is_auto_renew = v;
        }
        if let Some(v) = self.manual_renew_needed {
            line.manual_renew_needed = v;
        }
        if let Some(v) = self.next_invoice_date {
            line.next_invoice_date = v;
        }
        if let Some(v) = self.recurrence {
            line.recurrence = v;
        }
        if let Some(v) = self.termination_notice {
            line.termination_notice = v;
        }
        if let Some(v) = self.auto_renew_rule {
            line.auto_renew_rule = v;
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct LineEngine {
    store: Arc<dyn LineStore>,
    clock: Arc<dyn Clock>,
    event_sink: Arc<dyn EventSink>,
    settings: EngineSettings,
}

impl LineEngine {
    pub fn new(store: Arc<dyn LineStore>, settings: EngineSettings) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            event_sink: noop_sink(),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn LineStore> {
        &self.store
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Run `op` in a fresh transaction, commit, then publish its events.
    fn run<T>(
        &self,
        operation: &'static str,
        op: impl FnOnce(&mut Transaction<'_>, NaiveDate) -> LineResult<T>,
    ) -> LineResult<T> {
        let today = self.today();
        let mut tx = Transaction::begin(self.store.as_ref());
        let output = op(&mut tx, today).map_err(|e| log_rejection(operation, e))?;
        let events = tx.commit().map_err(|e| log_rejection(operation, e))?;
        for event in events {
            info!(
                operation,
                event_type = ?event.event_type,
                line_id = %event.line_id,
                contract_id = %event.contract_id,
                date_start = ?event.date_start,
                date_end = ?event.date_end,
                "{}",
                event.message
            );
            self.event_sink.emit(event);
        }
        Ok(output)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn line(&self, line_id: Uuid) -> LineResult<ContractLine> {
        self.store.read(line_id)
    }

    pub fn state(&self, line_id: Uuid) -> LineResult<Option<LineState>> {
        Ok(resolve_state(&self.store.read(line_id)?, self.today()))
    }

    pub fn permissions(&self, line_id: Uuid) -> LineResult<Permissions> {
        let line = self.store.read(line_id)?;
        let terminated = self
            .store
            .contract(line.contract_id)?
            .is_some_and(|c| c.is_terminated);
        Ok(permissions_for(&line, terminated, self.today()))
    }

    pub fn search(&self, domain: &Domain) -> LineResult<Vec<ContractLine>> {
        self.store.find(domain)
    }

    pub fn search_state(&self, filter: &StateFilter) -> LineResult<Vec<ContractLine>> {
        self.store.find(&filter.domain(self.today()))
    }

    /// Lines the renewal sweep picks up on `today`.
    pub fn lines_due_for_renewal(&self, today: NaiveDate) -> LineResult<Vec<ContractLine>> {
        self.store.find(&renewal_due_domain(today))
    }

    // -----------------------------------------------------------------------
    // Creation and edits
    // -----------------------------------------------------------------------

    pub fn create_line(&self, draft: ContractLine) -> LineResult<ContractLine> {
        self.run("create", |tx, _| {
            if tx.contract(draft.contract_id)?.is_none() {
                return Err(LineError::NotFound(format!("contract {}", draft.contract_id)));
            }
            let mut line = draft;
            if line.is_auto_renew && line.date_end.is_none() {
                line.date_end = Some(first_date_end(line.date_start, line.auto_renew_rule));
            }
            if line.is_billable() && line.next_invoice_date.is_none() {
                line.next_invoice_date = line
                    .recurrence
                    .next_invoice_date(invoicing::next_period_date_start(&line), line.date_end);
            }
            tx.record(make_event(
                EventType::LineCreated,
                line.contract_id,
                line.id,
                (Some(line.date_start), line.date_end),
                format!("Contract line '{}' created", line.name),
            ));
            tx.create(line.clone());
            Ok(line)
        })
    }

    pub fn update(&self, line_id: Uuid, patch: LinePatch) -> LineResult<ContractLine> {
        self.run("update", |tx, _| {
            let mut line = tx.line(line_id)?;
            patch.apply(&mut line);
            tx.record(make_event(
                EventType::LineUpdated,
                line.contract_id,
                line.id,
                (Some(line.date_start), line.date_end),
                format!("Contract line '{}' updated", line.name),
            ));
            tx.put(line.clone());
            Ok(line)
        })
    }

    /// Turn auto-renew on and reset the end to one renewal term after the
    /// start.
    pub fn enable_auto_renew(&self, line_id: Uuid) -> LineResult<ContractLine> {
        self.run("enable auto-renew", |tx, _| {
            let mut line = tx.line(line_id)?;
            line.is_auto_renew = true;
            line.date_end = Some(first_date_end(line.date_start, line.auto_renew_rule));
            tx.record(make_event(
                EventType::LineUpdated,
                line.contract_id,
                line.id,
                (Some(line.date_start), line.date_end),
                format!("Auto-renew enabled on '{}'", line.name),
            ));
            tx.put(line.clone());
            Ok(line)
        })
    }

    /// Only canceled lines and display markers can be removed.
    pub fn delete(&self, line_ids: &[Uuid]) -> LineResult<()> {
        self.run("delete", |tx, _| {
            let lines = tx.lines(line_ids)?;
            let blocked: Vec<Uuid> = lines
                .iter()
                .filter(|l| l.is_billable() && !l.is_canceled)
                .map(|l| l.id)
                .collect();
            if !blocked.is_empty() {
                return Err(LineError::permission_denied("delete", blocked));
            }
            for line in &lines {
                tx.delete(line.id);
            }
            let ids: Vec<Value> = line_ids.iter().map(|id| Value::Id(*id)).collect();
            let linked = self.store.find(&Domain::or(vec![
                Domain::is_in(Field::SuccessorLine, ids.clone()),
                Domain::is_in(Field::PredecessorLine, ids),
            ]))?;
            for neighbour in linked {
                if line_ids.contains(&neighbour.id) {
                    continue;
                }
                let mut neighbour = tx.line(neighbour.id)?;
                if neighbour.successor_line_id.is_some_and(|id| line_ids.contains(&id)) {
                    neighbour.successor_line_id = None;
                }
                if neighbour.predecessor_line_id.is_some_and(|id| line_ids.contains(&id)) {
                    neighbour.predecessor_line_id = None;
                }
                tx.put(neighbour);
            }
            for line in lines {
                tx.record(make_event(
                    EventType::LineDeleted,
                    line.contract_id,
                    line.id,
                    (Some(line.date_start), line.date_end),
                    format!("Contract line '{}' deleted", line.name),
                ));
            }
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Set `date_end` on every line. A date before a line's start cancels
    /// it; lines already ending on or before `date_end` keep their end.
    pub fn stop(
        &self,
        line_ids: &[Uuid],
        date_end: NaiveDate,
        manual_renew_needed: bool,
    ) -> LineResult<()> {
        self.run("stop", |tx, today| {
            ensure_allowed(tx, line_ids, Permission::Stop, today)?;
            for id in line_ids {
                stop_line(tx, *id, date_end, manual_renew_needed, today)?;
            }
            Ok(())
        })
    }

    pub fn cancel(&self, line_ids: &[Uuid]) -> LineResult<()> {
        self.run("cancel", |tx, today| {
            ensure_allowed(tx, line_ids, Permission::Cancel, today)?;
            for id in line_ids {
                cancel_line(tx, *id)?;
            }
            Ok(())
        })
    }

    pub fn uncancel(&self, line_ids: &[Uuid], next_invoice_date: Option<NaiveDate>) -> LineResult<()> {
        self.run("un-cancel", |tx, today| {
            ensure_allowed(tx, line_ids, Permission::Uncancel, today)?;
            for id in line_ids {
                uncancel_line(tx, *id, next_invoice_date)?;
            }
            Ok(())
        })
    }

    /// Shift lines by `delta_days`. Refused once a line has been invoiced.
    pub fn delay(&self, line_ids: &[Uuid], delta_days: i64) -> LineResult<()> {
        self.run("delay", |tx, _| {
            for id in line_ids {
                delay_line(tx, *id, delta_days)?;
            }
            Ok(())
        })
    }

    /// Plan a successor for each line; returns the new line ids in input
    /// order.
    pub fn plan_successor(
        &self,
        line_ids: &[Uuid],
        date_start: NaiveDate,
        date_end: Option<NaiveDate>,
        is_auto_renew: bool,
        next_invoice_date: Option<NaiveDate>,
    ) -> LineResult<Vec<Uuid>> {
        self.run("plan successor", |tx, today| {
            ensure_allowed(tx, line_ids, Permission::PlanSuccessor, today)?;
            line_ids
                .iter()
                .map(|id| {
                    plan_successor_line(
                        tx,
                        *id,
                        date_start,
                        date_end,
                        is_auto_renew,
                        next_invoice_date,
                        today,
                    )
                })
                .collect()
        })
    }

    /// Suspend lines over `[date_start, date_end]`. Returns the lines that
    /// carry on after the window: delayed lines and planned successors.
    pub fn stop_plan_successor(
        &self,
        line_ids: &[Uuid],
        date_start: NaiveDate,
        date_end: NaiveDate,
        is_auto_renew: bool,
    ) -> LineResult<Vec<Uuid>> {
        if date_start > date_end {
            return Err(log_rejection(
                "stop/plan successor",
                LineError::InvalidArgument(format!(
                    "suspension starts {date_start} after it ends {date_end}"
                )),
            ));
        }
        self.run("stop/plan successor", |tx, today| {
            ensure_allowed(tx, line_ids, Permission::StopPlanSuccessor, today)?;
            let mut resumed = Vec::new();
            for id in line_ids {
                let resumed_line =
                    suspend_line(tx, *id, (date_start, date_end), is_auto_renew, today)?;
                resumed.extend(resumed_line);
            }
            Ok(resumed)
        })
    }

    /// Renew each line by one auto-renew term. Returns `(line, renewed)`
    /// pairs; `renewed` is the line itself when extended in place.
    pub fn renew(&self, line_ids: &[Uuid]) -> LineResult<Vec<(Uuid, Uuid)>> {
        let create_new_line = self.settings.create_new_line_on_renew;
        self.run("renew", |tx, today| {
            line_ids
                .iter()
                .map(|id| renew_line(tx, *id, create_new_line, today).map(|new| (*id, new)))
                .collect()
        })
    }

    /// Renew a due line by as many auto-renew terms as it takes to move its
    /// notice date past `today`, all in one transaction. Returns the line
    /// and the last line renewed.
    pub fn renew_due(&self, line_id: Uuid, today: NaiveDate) -> LineResult<(Uuid, Uuid)> {
        let create_new_line = self.settings.create_new_line_on_renew;
        self.run("renew", |tx, clock_today| {
            let mut current = line_id;
            loop {
                let previous_end = tx.line(current)?.date_end;
                current = renew_line(tx, current, create_new_line, clock_today)?;
                let renewed = tx.line(current)?;
                if renewed.date_end <= previous_end {
                    return Err(LineError::InvalidArgument(format!(
                        "renewal of line {line_id} does not extend past {}",
                        previous_end.map_or_else(|| "none".to_string(), |d| d.to_string()),
                    )));
                }
                match renewed.termination_notice_date() {
                    Some(notice) if notice <= today => continue,
                    _ => return Ok((line_id, current)),
                }
            }
        })
    }

    // -----------------------------------------------------------------------
    // Invoicing
    // -----------------------------------------------------------------------

    pub fn next_period_to_invoice(&self, line_id: Uuid) -> LineResult<Option<InvoicePeriod>> {
        Ok(invoicing::next_period_to_invoice(&self.store.read(line_id)?))
    }

    pub fn invoice_description(&self, line_id: Uuid) -> LineResult<Option<String>> {
        let line = self.store.read(line_id)?;
        Ok(invoicing::next_period_to_invoice(&line)
            .map(|p| invoicing::invoice_description(&line, &p, &self.settings.date_format)))
    }

    pub fn advance_invoiced_through(
        &self,
        line_id: Uuid,
        through: NaiveDate,
    ) -> LineResult<ContractLine> {
        self.run("invoice", |tx, _| {
            let mut line = tx.line(line_id)?;
            invoicing::advance(&mut line, through)?;
            tx.record(make_event(
                EventType::LineInvoiced,
                line.contract_id,
                line.id,
                (line.last_date_invoiced, line.next_invoice_date),
                format!("Contract line '{}' invoiced through {through}", line.name),
            ));
            tx.put(line.clone());
            Ok(line)
        })
    }

    /// Invoice the next pending period of a line.
    pub fn mark_period_invoiced(&self, line_id: Uuid) -> LineResult<InvoicePeriod> {
        let period = self.next_period_to_invoice(line_id)?.ok_or_else(|| {
            LineError::InvalidArgument(format!("line {line_id} has nothing left to invoice"))
        })?;
        self.advance_invoiced_through(line_id, period.end)?;
        Ok(period)
    }
}

impl std::fmt::Debug for LineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineEngine")
            .field("today", &self.today())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Contract live, auto-renew, not canceled, notice date reached.
pub fn renewal_due_domain(today: NaiveDate) -> Domain {
    Domain::and(vec![
        Domain::eq(Field::ContractTerminated, false),
        Domain::eq(Field::IsAutoRenew, true),
        Domain::eq(Field::IsCanceled, false),
        Domain::le(Field::TerminationNoticeDate, today),
    ])
}

fn log_rejection(operation: &'static str, err: LineError) -> LineError {
    match &err {
        LineError::IllegalChainState { line_id, detail } => {
            error!(operation, line_id = %line_id, detail = %detail, "Contract line chain corrupted");
        }
        _ => warn!(operation, error = %err, "Contract line operation rejected"),
    }
    err
}

// ---------------------------------------------------------------------------
// Per-line steps
//
// These run inside an open transaction. Steps that other steps reuse check
// their own permission where the composed operation relies on it.
// ---------------------------------------------------------------------------

fn ensure_allowed(
    tx: &mut Transaction<'_>,
    line_ids: &[Uuid],
    permission: Permission,
    today: NaiveDate,
) -> LineResult<()> {
    let mut denied = Vec::new();
    for id in line_ids {
        let line = tx.line(*id)?;
        let terminated = tx.contract_terminated(line.contract_id)?;
        if !permissions_for(&line, terminated, today).get(permission) {
            denied.push(line.id);
        }
    }
    if denied.is_empty() {
        Ok(())
    } else {
        Err(LineError::permission_denied(permission.as_str(), denied))
    }
}

fn stop_line(
    tx: &mut Transaction<'_>,
    line_id: Uuid,
    date_end: NaiveDate,
    manual_renew_needed: bool,
    today: NaiveDate,
) -> LineResult<()> {
    let mut line = tx.line(line_id)?;
    if date_end < line.date_start {
        ensure_allowed(tx, &[line_id], Permission::Cancel, today)?;
        return cancel_line(tx, line_id);
    }
    match line.date_end {
        Some(end) if end <= date_end => {
            line.is_auto_renew = false;
            line.manual_renew_needed = manual_renew_needed;
            tx.put(line);
        }
        old_end => {
            line.next_invoice_date = line
                .recurrence
                .next_invoice_date(invoicing::next_period_date_start(&line), Some(date_end));
            line.date_end = Some(date_end);
            line.is_auto_renew = false;
            if manual_renew_needed {
                line.manual_renew_needed = true;
            }
            tx.record(make_event(
                EventType::LineStopped,
                line.contract_id,
                line.id,
                (Some(line.date_start), line.date_end),
                format!(
                    "Contract line '{}' stopped, end {} -> {date_end}",
                    line.name,
                    old_end.map_or_else(|| "none".to_string(), |d| d.to_string()),
                ),
            ));
            tx.put(line);
        }
    }
    Ok(())
}

fn cancel_line(tx: &mut Transaction<'_>, line_id: Uuid) -> LineResult<()> {
    let mut line = tx.line(line_id)?;
    line.is_canceled = true;
    line.is_auto_renew = false;
    if let Some(predecessor_id) = line.predecessor_line_id {
        let mut predecessor = tx.line(predecessor_id)?;
        if predecessor.successor_line_id == Some(line.id) {
            predecessor.successor_line_id = None;
            tx.put(predecessor);
        }
    }
    tx.record(make_event(
        EventType::LineCanceled,
        line.contract_id,
        line.id,
        (Some(line.date_start), line.date_end),
        format!("Contract line '{}' canceled", line.name),
    ));
    tx.put(line);
    Ok(())
}

fn uncancel_line(
    tx: &mut Transaction<'_>,
    line_id: Uuid,
    next_invoice_date: Option<NaiveDate>,
) -> LineResult<()> {
    let mut line = tx.line(line_id)?;
    line.is_canceled = false;
    line.next_invoice_date = next_invoice_date;
    if let Some(predecessor_id) = line.predecessor_line_id {
        let mut predecessor = tx.line(predecessor_id)?;
        match predecessor.successor_line_id {
            Some(other) if other != line.id => {
                return Err(LineError::IllegalChainState {
                    line_id: line.id,
                    detail: format!(
                        "predecessor {predecessor_id} already continues with line {other}"
                    ),
                });
            }
            Some(_) => {}
            None => {
                predecessor.successor_line_id = Some(line.id);
                tx.put(predecessor);
            }
        }
    }
    tx.record(make_event(
        EventType::LineUncanceled,
        line.contract_id,
        line.id,
        (Some(line.date_start), line.date_end),
        format!("Contract line '{}' un-canceled", line.name),
    ));
    tx.put(line);
    Ok(())
}

fn delay_line(tx: &mut Transaction<'_>, line_id: Uuid, delta_days: i64) -> LineResult<()> {
    let mut line = tx.line(line_id)?;
    if line.last_date_invoiced.is_some() {
        return Err(LineError::permission_denied("delay", vec![line.id]));
    }
    line.date_start = plus_days(line.date_start, delta_days);
    line.date_end = line.date_end.map(|end| plus_days(end, delta_days));
    line.next_invoice_date = line
        .recurrence
        .next_invoice_date(Some(line.date_start), line.date_end);
    tx.record(make_event(
        EventType::LineDelayed,
        line.contract_id,
        line.id,
        (Some(line.date_start), line.date_end),
        format!("Contract line '{}' delayed by {delta_days} day(s)", line.name),
    ));
    tx.put(line);
    Ok(())
}

fn plan_successor_line(
    tx: &mut Transaction<'_>,
    line_id: Uuid,
    date_start: NaiveDate,
    date_end: Option<NaiveDate>,
    is_auto_renew: bool,
    next_invoice_date: Option<NaiveDate>,
    today: NaiveDate,
) -> LineResult<Uuid> {
    ensure_allowed(tx, &[line_id], Permission::PlanSuccessor, today)?;
    let mut source = tx.line(line_id)?;
    source.is_auto_renew = false;

    let mut successor = source.clone();
    successor.id = Uuid::new_v4();
    successor.date_start = date_start;
    successor.date_end = date_end;
    successor.is_auto_renew = is_auto_renew;
    successor.last_date_invoiced = None;
    successor.successor_line_id = None;
    successor.predecessor_line_id = Some(source.id);
    successor.next_invoice_date = next_invoice_date.or_else(|| {
        successor
            .recurrence
            .next_invoice_date(Some(date_start), date_end)
    });
    source.successor_line_id = Some(successor.id);

    let mut event = make_event(
        EventType::SuccessorPlanned,
        source.contract_id,
        source.id,
        (Some(successor.date_start), successor.date_end),
        format!("Contract line '{}' planned a successor", source.name),
    );
    event.related_line_id = Some(successor.id);
    tx.record(event);

    let successor_id = successor.id;
    tx.put(source);
    tx.create(successor);
    Ok(successor_id)
}

/// One line of a suspension over `window`. Returns the line that resumes
/// after the window, if any.
fn suspend_line(
    tx: &mut Transaction<'_>,
    line_id: Uuid,
    window: (NaiveDate, NaiveDate),
    is_auto_renew: bool,
    today: NaiveDate,
) -> LineResult<Option<Uuid>> {
    let (window_start, window_end) = window;
    let line = tx.line(line_id)?;
    let day_after_window = plus_days(window_end, 1);
    let window_days = (window_end - window_start).num_days();

    let resumed = if line.date_start >= window_start {
        let delta = if line.date_start < window_end {
            (window_end - line.date_start).num_days() + 1
        } else {
            window_days + 1
        };
        delay_line(tx, line_id, delta)?;
        Some(line_id)
    } else {
        match line.date_end {
            Some(end) if end < window_start => {
                stop_line(tx, line_id, window_start, false, today)?;
                None
            }
            Some(end) if end > window_start && end < window_end => {
                let successor_end = plus_days(window_end, (end - window_start).num_days() + 1);
                stop_line(tx, line_id, plus_days(window_start, -1), true, today)?;
                Some(plan_successor_line(
                    tx,
                    line_id,
                    day_after_window,
                    Some(successor_end),
                    is_auto_renew,
                    None,
                    today,
                )?)
            }
            end => {
                let successor_end = end.map(|e| plus_days(e, window_days + 1));
                stop_line(tx, line_id, plus_days(window_start, -1), true, today)?;
                Some(plan_successor_line(
                    tx,
                    line_id,
                    day_after_window,
                    successor_end,
                    is_auto_renew,
                    None,
                    today,
                )?)
            }
        }
    };

    tx.record(make_event(
        EventType::LineSuspended,
        line.contract_id,
        line.id,
        (Some(window_start), Some(window_end)),
        format!("Contract line '{}' suspended {window_start} - {window_end}", line.name),
    ));
    Ok(resumed)
}

fn renew_line(
    tx: &mut Transaction<'_>,
    line_id: Uuid,
    create_new_line: bool,
    today: NaiveDate,
) -> LineResult<Uuid> {
    let mut line = tx.line(line_id)?;
    if line.auto_renew_rule.interval == 0 {
        return Err(LineError::InvalidArgument(format!(
            "line {line_id} has a zero-length auto-renew rule"
        )));
    }
    let Some(current_end) = line.date_end else {
        return Err(LineError::InvalidArgument(format!(
            "line {line_id} has no end date to renew from"
        )));
    };
    let new_start = plus_days(current_end, 1);
    let new_end = first_date_end(new_start, line.auto_renew_rule);

    let renewed = if create_new_line {
        let is_auto_renew = line.is_auto_renew;
        ensure_allowed(tx, &[line_id], Permission::Stop, today)?;
        stop_line(tx, line_id, current_end, false, today)?;
        plan_successor_line(tx, line_id, new_start, Some(new_end), is_auto_renew, None, today)?
    } else {
        line.date_end = Some(new_end);
        if line.next_invoice_date.is_none() {
            line.next_invoice_date = line
                .recurrence
                .next_invoice_date(invoicing::next_period_date_start(&line), line.date_end);
        }
        tx.put(line.clone());
        line_id
    };

    let mut event = make_event(
        EventType::LineRenewed,
        line.contract_id,
        line_id,
        (Some(new_start), Some(new_end)),
        format!("Contract line '{}' renewed until {new_end}", line.name),
    );
    event.related_line_id = Some(renewed);
    tx.record(event);
    Ok(renewed)
}
