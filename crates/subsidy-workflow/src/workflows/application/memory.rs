use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{Application, ApplicationId, ApplicationStep, ArtifactStatus};
use super::repository::{
    ApplicationSnapshot, Clock, DispatchError, EventDispatcher, StoreError, TransitionCommit,
    WorkflowEvent, WorkflowStore,
};

/// Injected failure modes used to exercise rollback and timeout paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreFault {
    /// The step insert fails after the application row has been staged.
    FailStepInsert,
    /// Every call sleeps before touching the tables.
    Latency(Duration),
    /// Every call fails immediately.
    Unavailable,
}

#[derive(Debug, Clone)]
struct StoredApplication {
    application: Application,
    artifacts: ArtifactStatus,
    version: u64,
}

#[derive(Debug, Default)]
struct Tables {
    applications: HashMap<ApplicationId, StoredApplication>,
    steps: HashMap<ApplicationId, Vec<ApplicationStep>>,
}

/// Process-local store backing the HTTP demo, the CLI, and the test suites.
#[derive(Default, Clone)]
pub struct InMemoryWorkflowStore {
    tables: Arc<Mutex<Tables>>,
    fault: Arc<Mutex<Option<StoreFault>>>,
}

impl InMemoryWorkflowStore {
    pub fn inject_fault(&self, fault: StoreFault) {
        *lock(&self.fault) = Some(fault);
    }

    pub fn clear_fault(&self) {
        *lock(&self.fault) = None;
    }

    async fn enter(&self) -> Result<Option<StoreFault>, StoreError> {
        let fault = lock(&self.fault).clone();
        match fault {
            Some(StoreFault::Latency(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(None)
            }
            Some(StoreFault::Unavailable) => {
                Err(StoreError::Unavailable("injected outage".to_string()))
            }
            other => Ok(other),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn append_step(
    tables: &mut Tables,
    step: ApplicationStep,
    fault: Option<&StoreFault>,
) -> Result<(), StoreError> {
    if fault == Some(&StoreFault::FailStepInsert) {
        return Err(StoreError::Unavailable(
            "step insert failed (injected)".to_string(),
        ));
    }
    tables
        .steps
        .entry(step.application_id.clone())
        .or_default()
        .push(step);
    Ok(())
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn insert(
        &self,
        application: Application,
        step: ApplicationStep,
    ) -> Result<Application, StoreError> {
        let fault = self.enter().await?;
        let mut tables = lock(&self.tables);
        if tables.applications.contains_key(&application.id) {
            return Err(StoreError::Conflict);
        }

        tables.applications.insert(
            application.id.clone(),
            StoredApplication {
                application: application.clone(),
                artifacts: ArtifactStatus::default(),
                version: 1,
            },
        );
        if let Err(err) = append_step(&mut tables, step, fault.as_ref()) {
            tables.applications.remove(&application.id);
            return Err(err);
        }
        Ok(application)
    }

    async fn load(&self, id: &ApplicationId) -> Result<Option<ApplicationSnapshot>, StoreError> {
        self.enter().await?;
        let tables = lock(&self.tables);
        Ok(tables.applications.get(id).map(|stored| ApplicationSnapshot {
            application: stored.application.clone(),
            artifacts: stored.artifacts.clone(),
            version: stored.version,
        }))
    }

    async fn commit(&self, commit: TransitionCommit) -> Result<(), StoreError> {
        let fault = self.enter().await?;
        let mut tables = lock(&self.tables);
        let stored = tables
            .applications
            .get_mut(&commit.application_id)
            .ok_or(StoreError::NotFound)?;
        if stored.version != commit.expected_version {
            return Err(StoreError::VersionConflict {
                expected: commit.expected_version,
                found: stored.version,
            });
        }

        let previous = stored.clone();
        if let Some(application) = commit.update {
            stored.application = application;
        }
        stored.version += 1;

        if let Err(err) = append_step(&mut tables, commit.step, fault.as_ref()) {
            tables
                .applications
                .insert(commit.application_id.clone(), previous);
            return Err(err);
        }
        Ok(())
    }

    async fn record_artifacts(
        &self,
        id: &ApplicationId,
        artifacts: ArtifactStatus,
    ) -> Result<(), StoreError> {
        self.enter().await?;
        let mut tables = lock(&self.tables);
        let stored = tables
            .applications
            .get_mut(id)
            .ok_or(StoreError::NotFound)?;
        stored.artifacts = artifacts;
        stored.version += 1;
        Ok(())
    }

    async fn steps(&self, id: &ApplicationId) -> Result<Vec<ApplicationStep>, StoreError> {
        self.enter().await?;
        let tables = lock(&self.tables);
        Ok(tables.steps.get(id).cloned().unwrap_or_default())
    }

    async fn active(&self) -> Result<Vec<Application>, StoreError> {
        self.enter().await?;
        let tables = lock(&self.tables);
        let mut active: Vec<Application> = tables
            .applications
            .values()
            .filter(|stored| !stored.application.is_terminal())
            .map(|stored| stored.application.clone())
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(active)
    }
}

/// Dispatcher that keeps every event, for assertions and the CLI demo.
#[derive(Default, Clone)]
pub struct RecordingDispatcher {
    events: Arc<Mutex<Vec<WorkflowEvent>>>,
}

impl RecordingDispatcher {
    pub fn events(&self) -> Vec<WorkflowEvent> {
        lock(&self.events).clone()
    }
}

impl EventDispatcher for RecordingDispatcher {
    fn dispatch(&self, event: &WorkflowEvent) -> Result<(), DispatchError> {
        lock(&self.events).push(event.clone());
        Ok(())
    }
}

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}
