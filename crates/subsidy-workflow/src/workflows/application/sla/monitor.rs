use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::super::domain::{Application, ApplicationId, WorkflowState};
use super::super::repository::{
    Clock, DispatchError, EventDispatcher, StoreError, SystemClock, WorkflowEvent, WorkflowStore,
};
use super::alerts::{
    Alert, AlertBook, AlertDraft, AlertError, AlertFilter, AlertKey, AlertKind, AlertSeverity,
};
use super::policy::SlaPolicy;
use crate::config::WorkflowConfig;

/// Thresholds the monitor applies on each scan.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub storage_timeout: Duration,
    pub bottleneck_threshold: usize,
    pub sla_compliance_target: f64,
    pub scan_failure_alert_after: u32,
    pub resolved_alert_history: usize,
}

impl From<&WorkflowConfig> for MonitorSettings {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            storage_timeout: config.storage_timeout,
            bottleneck_threshold: config.bottleneck_threshold,
            sla_compliance_target: config.sla_compliance_target,
            scan_failure_alert_after: config.scan_failure_alert_after,
            resolved_alert_history: config.resolved_alert_history,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("store did not answer within {0:?}")]
    StorageTimeout(Duration),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-state slice of the performance dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateMetrics {
    pub state: WorkflowState,
    pub state_label: &'static str,
    pub applications: usize,
    pub average_hours_in_state: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_hours: Option<i64>,
    pub sla_violations: usize,
}

/// SLA and throughput figures for in-flight applications.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub generated_at: DateTime<Utc>,
    pub active_applications: usize,
    pub sla_compliance_rate: f64,
    pub states: Vec<StateMetrics>,
    pub open_alerts: BTreeMap<AlertSeverity, usize>,
}

struct Violation<'a> {
    application: &'a Application,
    elapsed: chrono::Duration,
    limit: chrono::Duration,
}

#[derive(Default)]
struct StateTally {
    applications: usize,
    seconds_in_state: i64,
    violations: usize,
}

struct Survey<'a> {
    tallies: BTreeMap<WorkflowState, StateTally>,
    tracked: usize,
    violations: Vec<Violation<'a>>,
}

impl Survey<'_> {
    fn compliance_rate(&self) -> f64 {
        if self.tracked == 0 {
            return 1.0;
        }
        1.0 - self.violations.len() as f64 / self.tracked as f64
    }
}

/// Periodic scanner comparing time-in-state against the SLA policy and maintaining alerts.
pub struct SlaMonitor<S> {
    store: Arc<S>,
    policy: SlaPolicy,
    alerts: AlertBook,
    dispatcher: Arc<dyn EventDispatcher>,
    clock: Arc<dyn Clock>,
    settings: MonitorSettings,
    consecutive_failures: AtomicU32,
}

impl<S> SlaMonitor<S>
where
    S: WorkflowStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        dispatcher: Arc<dyn EventDispatcher>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            store,
            policy: SlaPolicy::standard(),
            alerts: AlertBook::with_history(settings.resolved_alert_history),
            dispatcher,
            clock: Arc::new(SystemClock),
            settings,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn with_policy(mut self, policy: SlaPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &SlaPolicy {
        &self.policy
    }

    /// Listener to register with the transition engine so that leaving a state resolves the
    /// alerts tied to it.
    pub fn transition_listener(&self) -> Arc<dyn EventDispatcher> {
        Arc::new(AlertResolutionListener {
            alerts: self.alerts.clone(),
            clock: self.clock.clone(),
            dispatcher: self.dispatcher.clone(),
        })
    }

    /// Scan in-flight applications and return the alerts open afterwards.
    ///
    /// Re-running without intervening changes raises nothing new. A failed store read raises no
    /// SLA alerts and is retried on the next scan.
    pub async fn scan(&self) -> Vec<Alert> {
        let now = self.clock.now();
        let applications = match self.read_active().await {
            Ok(applications) => applications,
            Err(err) => {
                self.record_failure(&err, now);
                return self.alerts.open();
            }
        };
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.resolve(now, |alert| alert.kind == AlertKind::Error);

        let survey = self.survey(&applications, now);
        self.reconcile_violations(&survey, now);
        self.reconcile_bottlenecks(&survey, now);
        self.reconcile_performance(&survey, now);

        let open = self.alerts.open();
        debug!(
            scanned = applications.len(),
            open_alerts = open.len(),
            "sla scan complete"
        );
        open
    }

    /// Run `scan` on a fixed cadence until the task is aborted.
    pub fn spawn(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.scan().await;
            }
        })
    }

    pub fn alerts(&self, filter: &AlertFilter) -> Vec<Alert> {
        self.alerts.list(filter)
    }

    pub fn resolve_alert(&self, alert_id: &str) -> Result<Alert, AlertError> {
        let (alert, closed) = self.alerts.resolve(alert_id, self.clock.now())?;
        if closed {
            self.announce_resolved(&alert);
        }
        Ok(alert)
    }

    /// Resolve every open alert; returns how many changed.
    pub fn resolve_all(&self) -> usize {
        self.resolve(self.clock.now(), |_| true)
    }

    pub async fn metrics(&self) -> Result<PerformanceMetrics, MonitorError> {
        let now = self.clock.now();
        let applications = self.read_active().await?;
        let survey = self.survey(&applications, now);

        let states = survey
            .tallies
            .iter()
            .map(|(state, tally)| StateMetrics {
                state: *state,
                state_label: state.label(),
                applications: tally.applications,
                average_hours_in_state: tally.seconds_in_state as f64
                    / tally.applications.max(1) as f64
                    / 3600.0,
                sla_hours: self.policy.limit_for(*state).map(|limit| limit.num_hours()),
                sla_violations: tally.violations,
            })
            .collect();

        let mut open_alerts: BTreeMap<AlertSeverity, usize> = AlertSeverity::ordered()
            .into_iter()
            .map(|severity| (severity, 0))
            .collect();
        for alert in self.alerts.open() {
            *open_alerts.entry(alert.severity).or_default() += 1;
        }

        Ok(PerformanceMetrics {
            generated_at: now,
            active_applications: applications.len(),
            sla_compliance_rate: survey.compliance_rate(),
            states,
            open_alerts,
        })
    }

    async fn read_active(&self) -> Result<Vec<Application>, MonitorError> {
        let applications = tokio::time::timeout(self.settings.storage_timeout, self.store.active())
            .await
            .map_err(|_| MonitorError::StorageTimeout(self.settings.storage_timeout))??;
        Ok(applications)
    }

    fn record_failure(&self, err: &MonitorError, now: DateTime<Utc>) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(%err, failures, "sla scan failed; no alerts evaluated");

        let threshold = self.settings.scan_failure_alert_after;
        if threshold > 0 && failures >= threshold {
            let key = AlertKey {
                kind: AlertKind::Error,
                application_id: None,
                state: None,
            };
            let draft = AlertDraft {
                severity: AlertSeverity::High,
                message: format!("SLA scan failed {failures} consecutive times: {err}"),
            };
            self.raise(key, draft, now);
        }
    }

    fn survey<'a>(&self, applications: &'a [Application], now: DateTime<Utc>) -> Survey<'a> {
        let mut survey = Survey {
            tallies: BTreeMap::new(),
            tracked: 0,
            violations: Vec::new(),
        };

        for application in applications.iter().filter(|app| !app.is_terminal()) {
            let elapsed = application.time_in_state(now);
            let tally = survey.tallies.entry(application.state).or_default();
            tally.applications += 1;
            tally.seconds_in_state += elapsed.num_seconds().max(0);

            let Some(limit) = self.policy.limit_for(application.state) else {
                continue;
            };
            survey.tracked += 1;
            if elapsed > limit {
                tally.violations += 1;
                survey.violations.push(Violation {
                    application,
                    elapsed,
                    limit,
                });
            }
        }

        survey
    }

    fn reconcile_violations(&self, survey: &Survey<'_>, now: DateTime<Utc>) {
        let mut live: HashSet<(ApplicationId, WorkflowState)> = HashSet::new();

        for violation in &survey.violations {
            let application = violation.application;
            live.insert((application.id.clone(), application.state));

            let key = AlertKey {
                kind: AlertKind::SlaViolation,
                application_id: Some(application.id.clone()),
                state: Some(application.state),
            };
            let draft = AlertDraft {
                severity: violation_severity(violation, application),
                message: format!(
                    "application {} has spent {}h in {} (SLA {}h)",
                    application.application_number,
                    violation.elapsed.num_hours(),
                    application.state,
                    violation.limit.num_hours()
                ),
            };
            self.raise(key, draft, now);
        }

        self.resolve(now, |alert| {
            alert.kind == AlertKind::SlaViolation
                && match (&alert.application_id, alert.state) {
                    (Some(id), Some(state)) => !live.contains(&(id.clone(), state)),
                    _ => true,
                }
        });
    }

    fn reconcile_bottlenecks(&self, survey: &Survey<'_>, now: DateTime<Utc>) {
        let threshold = self.settings.bottleneck_threshold;
        let mut congested = HashSet::new();

        if threshold > 0 {
            for (state, tally) in &survey.tallies {
                if tally.applications < threshold {
                    continue;
                }
                congested.insert(*state);
                let severity = if tally.applications >= threshold.saturating_mul(2) {
                    AlertSeverity::High
                } else {
                    AlertSeverity::Medium
                };
                let key = AlertKey {
                    kind: AlertKind::Bottleneck,
                    application_id: None,
                    state: Some(*state),
                };
                let draft = AlertDraft {
                    severity,
                    message: format!(
                        "{} applications waiting in {} (threshold {threshold})",
                        tally.applications, state
                    ),
                };
                self.raise(key, draft, now);
            }
        }

        self.resolve(now, |alert| {
            alert.kind == AlertKind::Bottleneck
                && alert.state.map_or(true, |state| !congested.contains(&state))
        });
    }

    fn reconcile_performance(&self, survey: &Survey<'_>, now: DateTime<Utc>) {
        let target = self.settings.sla_compliance_target;
        let rate = survey.compliance_rate();

        if survey.tracked > 0 && rate < target {
            let shortfall = target - rate;
            let severity = if shortfall <= 0.1 {
                AlertSeverity::Low
            } else if shortfall <= 0.25 {
                AlertSeverity::Medium
            } else {
                AlertSeverity::High
            };
            let key = AlertKey {
                kind: AlertKind::Performance,
                application_id: None,
                state: None,
            };
            let draft = AlertDraft {
                severity,
                message: format!(
                    "SLA compliance at {:.0}% (target {:.0}%)",
                    rate * 100.0,
                    target * 100.0
                ),
            };
            self.raise(key, draft, now);
        } else {
            self.resolve(now, |alert| alert.kind == AlertKind::Performance);
        }
    }

    fn raise(&self, key: AlertKey, draft: AlertDraft, now: DateTime<Utc>) {
        if let Some(alert) = self.alerts.ensure_open(key, draft, now) {
            info!(
                alert_id = %alert.id,
                kind = ?alert.kind,
                severity = ?alert.severity,
                message = %alert.message,
                "alert raised"
            );
            self.announce(WorkflowEvent::AlertRaised(alert));
        }
    }

    fn resolve<F>(&self, now: DateTime<Utc>, predicate: F) -> usize
    where
        F: Fn(&Alert) -> bool,
    {
        let resolved = self.alerts.resolve_where(now, predicate);
        for alert in &resolved {
            self.announce_resolved(alert);
        }
        resolved.len()
    }

    fn announce_resolved(&self, alert: &Alert) {
        debug!(alert_id = %alert.id, "alert resolved");
        self.announce(WorkflowEvent::AlertResolved {
            alert_id: alert.id.clone(),
        });
    }

    fn announce(&self, event: WorkflowEvent) {
        if let Err(err) = self.dispatcher.dispatch(&event) {
            warn!(%err, "alert notification dropped");
        }
    }
}

fn violation_severity(violation: &Violation<'_>, application: &Application) -> AlertSeverity {
    let limit = violation.limit.num_seconds().max(1) as f64;
    let ratio = violation.elapsed.num_seconds() as f64 / limit;
    let base = if ratio <= 1.5 {
        AlertSeverity::Medium
    } else if ratio <= 2.0 {
        AlertSeverity::High
    } else {
        AlertSeverity::Critical
    };

    if application.priority.is_urgent() {
        base.escalate()
    } else {
        base
    }
}

/// Resolves alerts bound to the state an application just left and announces each one.
struct AlertResolutionListener {
    alerts: AlertBook,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<dyn EventDispatcher>,
}

impl EventDispatcher for AlertResolutionListener {
    fn dispatch(&self, event: &WorkflowEvent) -> Result<(), DispatchError> {
        if let WorkflowEvent::TransitionOccurred {
            application_id,
            from,
            ..
        } = event
        {
            let resolved = self.alerts.resolve_where(self.clock.now(), |alert| {
                alert.application_id.as_ref() == Some(application_id) && alert.state == Some(*from)
            });
            for alert in resolved {
                debug!(alert_id = %alert.id, %application_id, "alert resolved by transition");
                let event = WorkflowEvent::AlertResolved { alert_id: alert.id };
                if let Err(err) = self.dispatcher.dispatch(&event) {
                    warn!(%err, "alert notification dropped");
                }
            }
        }
        Ok(())
    }
}
