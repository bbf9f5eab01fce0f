use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::domain::{ApplicationId, WorkflowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    SlaViolation,
    Bottleneck,
    Error,
    Performance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub const fn ordered() -> [Self; 4] {
        [Self::Low, Self::Medium, Self::High, Self::Critical]
    }

    pub const fn escalate(self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High | Self::Critical => Self::Critical,
        }
    }
}

/// Monitoring alert owned by the SLA monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub application_id: Option<ApplicationId>,
    pub state: Option<WorkflowState>,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn key(&self) -> AlertKey {
        AlertKey {
            kind: self.kind,
            application_id: self.application_id.clone(),
            state: self.state,
        }
    }
}

/// De-duplication key: at most one open alert exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub kind: AlertKind,
    pub application_id: Option<ApplicationId>,
    pub state: Option<WorkflowState>,
}

/// Fields needed to raise an alert for a key that has none open.
#[derive(Debug, Clone)]
pub struct AlertDraft {
    pub severity: AlertSeverity,
    pub message: String,
}

/// Query filters accepted by `get_alerts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertFilter {
    pub resolved: Option<bool>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlertError {
    #[error("alert {0} not found")]
    NotFound(String),
}

/// Resolved alerts retained when no explicit history size is configured.
pub const DEFAULT_RESOLVED_HISTORY: usize = 256;

/// Alerts keyed by raise order, with an index over the open ones and a bounded tail of
/// resolved history.
#[derive(Debug)]
struct Ledger {
    alerts: BTreeMap<u64, Alert>,
    ids: HashMap<String, u64>,
    open: HashMap<AlertKey, u64>,
    resolved: VecDeque<u64>,
    history: usize,
    sequence: u64,
}

impl Ledger {
    fn new(history: usize) -> Self {
        Self {
            alerts: BTreeMap::new(),
            ids: HashMap::new(),
            open: HashMap::new(),
            resolved: VecDeque::new(),
            history,
            sequence: 0,
        }
    }

    fn close(&mut self, seq: u64, now: DateTime<Utc>) -> Option<Alert> {
        let alert = self.alerts.get_mut(&seq)?;
        if alert.resolved {
            return None;
        }
        alert.resolved = true;
        alert.resolved_at = Some(now);
        let alert = alert.clone();
        self.open.remove(&alert.key());
        self.resolved.push_back(seq);
        Some(alert)
    }

    fn prune(&mut self) {
        while self.resolved.len() > self.history {
            let Some(seq) = self.resolved.pop_front() else {
                break;
            };
            if let Some(alert) = self.alerts.remove(&seq) {
                self.ids.remove(&alert.id);
            }
        }
    }
}

/// Shared alert ledger. Cloning yields another handle onto the same alerts.
#[derive(Debug, Clone)]
pub struct AlertBook {
    ledger: Arc<Mutex<Ledger>>,
}

impl Default for AlertBook {
    fn default() -> Self {
        Self::with_history(DEFAULT_RESOLVED_HISTORY)
    }
}

impl AlertBook {
    /// Keep at most `history` resolved alerts; open alerts are never dropped.
    pub fn with_history(history: usize) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::new(history))),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raise an alert for `key` unless one is already open. Returns the alert only when created.
    pub fn ensure_open(&self, key: AlertKey, draft: AlertDraft, now: DateTime<Utc>) -> Option<Alert> {
        let mut ledger = self.ledger();
        if ledger.open.contains_key(&key) {
            return None;
        }

        ledger.sequence += 1;
        let seq = ledger.sequence;
        let alert = Alert {
            id: format!("alert-{seq:06}"),
            kind: key.kind,
            severity: draft.severity,
            message: draft.message,
            application_id: key.application_id.clone(),
            state: key.state,
            created_at: now,
            resolved: false,
            resolved_at: None,
        };
        ledger.ids.insert(alert.id.clone(), seq);
        ledger.open.insert(key, seq);
        ledger.alerts.insert(seq, alert.clone());
        Some(alert)
    }

    /// Resolve one alert, reporting whether this call closed it. Resolving an already resolved
    /// alert returns it unchanged.
    pub fn resolve(&self, alert_id: &str, now: DateTime<Utc>) -> Result<(Alert, bool), AlertError> {
        let mut ledger = self.ledger();
        let seq = *ledger
            .ids
            .get(alert_id)
            .ok_or_else(|| AlertError::NotFound(alert_id.to_string()))?;
        let outcome = match ledger.close(seq, now) {
            Some(alert) => (alert, true),
            None => {
                let alert = ledger
                    .alerts
                    .get(&seq)
                    .cloned()
                    .ok_or_else(|| AlertError::NotFound(alert_id.to_string()))?;
                (alert, false)
            }
        };
        ledger.prune();
        Ok(outcome)
    }

    /// Resolve every open alert matching `predicate`, returning the ones that changed.
    pub fn resolve_where<F>(&self, now: DateTime<Utc>, predicate: F) -> Vec<Alert>
    where
        F: Fn(&Alert) -> bool,
    {
        let mut ledger = self.ledger();
        let mut matching: Vec<u64> = ledger
            .open
            .values()
            .copied()
            .filter(|seq| ledger.alerts.get(seq).map_or(false, |alert| predicate(alert)))
            .collect();
        matching.sort_unstable();

        let resolved: Vec<Alert> = matching
            .into_iter()
            .filter_map(|seq| ledger.close(seq, now))
            .collect();
        ledger.prune();
        resolved
    }

    pub fn resolve_all(&self, now: DateTime<Utc>) -> Vec<Alert> {
        self.resolve_where(now, |_| true)
    }

    /// Newest first.
    pub fn list(&self, filter: &AlertFilter) -> Vec<Alert> {
        let ledger = self.ledger();
        let limit = filter.limit.unwrap_or(usize::MAX);
        ledger
            .alerts
            .values()
            .rev()
            .filter(|alert| filter.resolved.map_or(true, |resolved| alert.resolved == resolved))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn open(&self) -> Vec<Alert> {
        self.list(&AlertFilter {
            resolved: Some(false),
            limit: None,
        })
    }

    /// Alerts currently held, open and retained history together.
    pub fn len(&self) -> usize {
        self.ledger().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
