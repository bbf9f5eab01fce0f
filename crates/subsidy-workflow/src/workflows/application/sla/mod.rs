//! SLA policy, alert ledger, and the monitor that keeps them in step with in-flight applications.

mod alerts;
mod monitor;
mod policy;

pub use alerts::{
    Alert, AlertBook, AlertDraft, AlertError, AlertFilter, AlertKey, AlertKind, AlertSeverity,
    DEFAULT_RESOLVED_HISTORY,
};
pub use monitor::{MonitorError, MonitorSettings, PerformanceMetrics, SlaMonitor, StateMetrics};
pub use policy::SlaPolicy;
