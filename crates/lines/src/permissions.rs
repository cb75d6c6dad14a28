//! Permission gate for line transitions.
//!
//! Permissions are derived by an ordered pipeline of rule tables over a
//! shared [`Permissions`] value. Each permission starts `false`; its rules
//! run in table order, every stage seeing the value left by the previous
//! one. Un-cancel depends on the final stop and cancel values, so the
//! permissions are evaluated in [`EVALUATION_ORDER`].
//!
//! Nothing is allowed on a line whose contract is terminated.
//!
//! | permission | stage | when | guard | sets |
//! |---|---|---|---|---|
//! | stop | base | BEFORE | not (invoiced and canceled) | true |
//! | stop | base | AFTER | always | true |
//! | stop | base | IN | not canceled | true |
//! | stop | renewal | AFTER | allowed, not canceled, has end, not auto-renew | false |
//! | stop | successor | AFTER | denied, not canceled, has end, no successor | true |
//! | stop | successor | AFTER | allowed, not canceled, has end, not auto-renew, successor | false |
//! | cancel | base | BEFORE, IN | not canceled, not invoiced | true |
//! | un-cancel | base | any | canceled, stop denied, cancel denied | true |
//! | un-cancel | successor | any | allowed, has predecessor | false |
//! | plan successor | successor | any | not canceled, no successor, not auto-renew, has end | true |
//! | suspend | successor | BEFORE | not canceled, no successor, (not auto-renew and has end) or no end or not invoiced | true |
//! | suspend | successor | IN | not canceled, no successor, (auto-renew and has end) or not auto-renew | true |

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::temporal::{classify, Position};
use crate::types::ContractLine;

/// The inputs every permission is a pure function of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineFacts {
    pub position: Position,
    pub contract_terminated: bool,
    pub is_canceled: bool,
    pub is_auto_renew: bool,
    pub has_end: bool,
    pub invoiced: bool,
    pub has_successor: bool,
    pub has_predecessor: bool,
}

impl LineFacts {
    pub fn of(line: &ContractLine, contract_terminated: bool, today: NaiveDate) -> Self {
        Self {
            position: classify(today, line.date_start, line.date_end),
            contract_terminated,
            is_canceled: line.is_canceled,
            is_auto_renew: line.is_auto_renew,
            has_end: line.date_end.is_some(),
            invoiced: line.last_date_invoiced.is_some(),
            has_successor: line.successor_line_id.is_some(),
            has_predecessor: line.predecessor_line_id.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permissions {
    pub stop: bool,
    pub cancel: bool,
    pub uncancel: bool,
    pub plan_successor: bool,
    pub stop_plan_successor: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Stop,
    Cancel,
    Uncancel,
    PlanSuccessor,
    StopPlanSuccessor,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Cancel => "cancel",
            Self::Uncancel => "un-cancel",
            Self::PlanSuccessor => "plan successor",
            Self::StopPlanSuccessor => "stop/plan successor",
        }
    }
}

impl Permissions {
    pub fn get(&self, permission: Permission) -> bool {
        match permission {
            Permission::Stop => self.stop,
            Permission::Cancel => self.cancel,
            Permission::Uncancel => self.uncancel,
            Permission::PlanSuccessor => self.plan_successor,
            Permission::StopPlanSuccessor => self.stop_plan_successor,
        }
    }

    fn set(&mut self, permission: Permission, value: bool) {
        match permission {
            Permission::Stop => self.stop = value,
            Permission::Cancel => self.cancel = value,
            Permission::Uncancel => self.uncancel = value,
            Permission::PlanSuccessor => self.plan_successor = value,
            Permission::StopPlanSuccessor => self.stop_plan_successor = value,
        }
    }
}

/// Rule module a rule belongs to, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Base,
    Renewal,
    Successor,
}

pub struct PermissionRule {
    pub permission: Permission,
    pub stage: Stage,
    /// Positions the rule applies to; empty means every position.
    pub when: &'static [Position],
    pub guard: fn(&LineFacts, &Permissions) -> bool,
    pub sets: bool,
}

impl PermissionRule {
    fn applies(&self, facts: &LineFacts, current: &Permissions) -> bool {
        (self.when.is_empty() || self.when.contains(&facts.position))
            && (self.guard)(facts, current)
    }
}

use Position::{After, Before, In};

pub const EVALUATION_ORDER: [Permission; 5] = [
    Permission::Stop,
    Permission::Cancel,
    Permission::Uncancel,
    Permission::PlanSuccessor,
    Permission::StopPlanSuccessor,
];

pub static RULES: &[PermissionRule] = &[
    // stop
    PermissionRule {
        permission: Permission::Stop,
        stage: Stage::Base,
        when: &[Before],
        guard: |f, _| !(f.invoiced && f.is_canceled),
        sets: true,
    },
    PermissionRule {
        permission: Permission::Stop,
        stage: Stage::Base,
        when: &[After],
        guard: |_, _| true,
        sets: true,
    },
    PermissionRule {
        permission: Permission::Stop,
        stage: Stage::Base,
        when: &[In],
        guard: |f, _| !f.is_canceled,
        sets: true,
    },
    PermissionRule {
        permission: Permission::Stop,
        stage: Stage::Renewal,
        when: &[After],
        guard: |f, p| p.stop && !f.is_canceled && f.has_end && !f.is_auto_renew,
        sets: false,
    },
    PermissionRule {
        permission: Permission::Stop,
        stage: Stage::Successor,
        when: &[After],
        guard: |f, p| !p.stop && !f.is_canceled && f.has_end && !f.has_successor,
        sets: true,
    },
    PermissionRule {
        permission: Permission::Stop,
        stage: Stage::Successor,
        when: &[After],
        guard: |f, p| {
            p.stop && !f.is_canceled && f.has_end && !f.is_auto_renew && f.has_successor
        },
        sets: false,
    },
    // cancel
    PermissionRule {
        permission: Permission::Cancel,
        stage: Stage::Base,
        when: &[Before, In],
        guard: |f, _| !f.is_canceled && !f.invoiced,
        sets: true,
    },
    // un-cancel
    PermissionRule {
        permission: Permission::Uncancel,
        stage: Stage::Base,
        when: &[],
        guard: |f, p| f.is_canceled && !p.stop && !p.cancel,
        sets: true,
    },
    PermissionRule {
        permission: Permission::Uncancel,
        stage: Stage::Successor,
        when: &[],
        guard: |f, p| p.uncancel && f.has_predecessor,
        sets: false,
    },
    // plan successor
    PermissionRule {
        permission: Permission::PlanSuccessor,
        stage: Stage::Successor,
        when: &[],
        guard: |f, _| !f.is_canceled && !f.has_successor && !f.is_auto_renew && f.has_end,
        sets: true,
    },
    // stop / plan successor
    PermissionRule {
        permission: Permission::StopPlanSuccessor,
        stage: Stage::Successor,
        when: &[Before],
        guard: |f, _| {
            !f.is_canceled
                && !f.has_successor
                && ((!f.is_auto_renew && f.has_end) || !f.has_end || !f.invoiced)
        },
        sets: true,
    },
    PermissionRule {
        permission: Permission::StopPlanSuccessor,
        stage: Stage::Successor,
        when: &[In],
        guard: |f, _| {
            !f.is_canceled
                && !f.has_successor
                && ((f.is_auto_renew && f.has_end) || !f.is_auto_renew)
        },
        sets: true,
    },
];

/// Run the pipeline for one line.
pub fn evaluate(facts: &LineFacts) -> Permissions {
    let mut permissions = Permissions::default();
    if facts.contract_terminated {
        return permissions;
    }
    for permission in EVALUATION_ORDER {
        for rule in RULES.iter().filter(|r| r.permission == permission) {
            if rule.applies(facts, &permissions) {
                permissions.set(permission, rule.sets);
            }
        }
    }
    permissions
}

pub fn permissions_for(line: &ContractLine, contract_terminated: bool, today: NaiveDate) -> Permissions {
    evaluate(&LineFacts::of(line, contract_terminated, today))
}
