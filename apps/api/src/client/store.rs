//! Client State Cache: an in-memory mirror of the server's applications.
//!
//! Stage transitions are applied optimistically: the cached record changes
//! before the server confirms, then is replaced by the server's record on
//! success or restored from a snapshot on failure.
//!
//! Two transitions in flight against the *same* record are not coordinated;
//! whichever resolves last wins. Transitions on different records are independent.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info};

use crate::client::{ApplicationApi, ClientError};
use crate::models::application::{
    Communication, CreateCommunicationRequest, CreateJobApplicationRequest, CreateNoteRequest,
    JobApplication, Note, PipelineStage, UpdateJobApplicationRequest, PIPELINE_STAGES,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineState {
    pub applications: Vec<JobApplication>,
    pub loading: bool,
    /// Most recent failure, kept until explicitly cleared.
    pub error: Option<String>,
    pub search_query: String,
    pub selected_id: Option<String>,
}

/// Result of a stage transition request.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// Target equals the current stage; nothing was sent or recorded.
    Unchanged,
    /// The server accepted the move; carries its authoritative record.
    Confirmed(JobApplication),
}

/// An optimistic stage write that has been applied locally but not yet
/// confirmed. Holds the pre-transition snapshot for rollback.
#[derive(Debug)]
pub struct PendingTransition {
    snapshot: JobApplication,
    target: PipelineStage,
}

impl PendingTransition {
    pub fn id(&self) -> &str {
        &self.snapshot.id
    }

    pub fn from_stage(&self) -> PipelineStage {
        self.snapshot.stage
    }

    pub fn target(&self) -> PipelineStage {
        self.target
    }
}

/// Partitions applications into one column per stage, in pipeline order.
/// `query` is a case-insensitive substring matched against title and company;
/// relative order within a column is preserved.
pub fn group_by_stage(
    applications: &[JobApplication],
    query: &str,
) -> BTreeMap<PipelineStage, Vec<JobApplication>> {
    let query = query.to_lowercase();
    let mut columns: BTreeMap<PipelineStage, Vec<JobApplication>> =
        PIPELINE_STAGES.iter().map(|s| (*s, Vec::new())).collect();

    for app in applications.iter().filter(|app| {
        app.title.to_lowercase().contains(&query) || app.company.to_lowercase().contains(&query)
    }) {
        columns.entry(app.stage).or_default().push(app.clone());
    }
    columns
}

fn replace_by_id(applications: &mut [JobApplication], record: JobApplication) {
    if let Some(slot) = applications.iter_mut().find(|a| a.id == record.id) {
        *slot = record;
    }
}

pub struct PipelineStore<A> {
    api: A,
    state: RwLock<PipelineState>,
}

impl<A: ApplicationApi> PipelineStore<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: RwLock::new(PipelineState::default()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn read(&self) -> RwLockReadGuard<'_, PipelineState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, PipelineState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn set_error(&self, message: &str) {
        self.write().error = Some(message.to_string());
    }

    // ── read-only views ────────────────────────────────────────────────────

    pub fn snapshot(&self) -> PipelineState {
        self.read().clone()
    }

    pub fn applications(&self) -> Vec<JobApplication> {
        self.read().applications.clone()
    }

    pub fn get(&self, id: &str) -> Option<JobApplication> {
        self.read().applications.iter().find(|a| a.id == id).cloned()
    }

    pub fn count(&self) -> usize {
        self.read().applications.len()
    }

    pub fn loading(&self) -> bool {
        self.read().loading
    }

    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }

    pub fn search_query(&self) -> String {
        self.read().search_query.clone()
    }

    pub fn selected_id(&self) -> Option<String> {
        self.read().selected_id.clone()
    }

    /// The selected record, if an id is selected and still cached.
    pub fn selected(&self) -> Option<JobApplication> {
        let state = self.read();
        let id = state.selected_id.as_deref()?;
        state.applications.iter().find(|a| a.id == id).cloned()
    }

    pub fn by_stage(&self) -> BTreeMap<PipelineStage, Vec<JobApplication>> {
        let state = self.read();
        group_by_stage(&state.applications, &state.search_query)
    }

    // ── local mutations ────────────────────────────────────────────────────

    pub fn set_search_query(&self, query: impl Into<String>) {
        self.write().search_query = query.into();
    }

    pub fn select(&self, id: Option<&str>) {
        self.write().selected_id = id.map(str::to_string);
    }

    pub fn clear_error(&self) {
        self.write().error = None;
    }

    // ── server round trips ─────────────────────────────────────────────────

    pub async fn fetch_all(&self) -> Result<(), ClientError> {
        {
            let mut state = self.write();
            state.loading = true;
            state.error = None;
        }

        let result = self.api.list().await;

        let mut state = self.write();
        state.loading = false;
        match result {
            Ok(applications) => {
                debug!("Fetched {} job applications", applications.len());
                state.applications = applications;
                Ok(())
            }
            Err(e) => {
                error!("Error fetching job applications: {e}");
                state.error = Some("Failed to fetch job applications".to_string());
                Err(e)
            }
        }
    }

    pub async fn create(
        &self,
        req: CreateJobApplicationRequest,
    ) -> Result<JobApplication, ClientError> {
        match self.api.create(req).await {
            Ok(created) => {
                self.write().applications.push(created.clone());
                Ok(created)
            }
            Err(e) => {
                error!("Error creating job application: {e}");
                self.set_error("Failed to create job application");
                Err(e)
            }
        }
    }

    pub async fn update(
        &self,
        id: &str,
        req: UpdateJobApplicationRequest,
    ) -> Result<JobApplication, ClientError> {
        match self.api.update(id, req).await {
            Ok(updated) => {
                replace_by_id(&mut self.write().applications, updated.clone());
                Ok(updated)
            }
            Err(e) => {
                error!("Error updating job application {id}: {e}");
                self.set_error("Failed to update job application");
                Err(e)
            }
        }
    }

    /// Applies the optimistic half of a stage transition. Returns `None` when
    /// the record already sits in `target`.
    pub fn begin_transition(
        &self,
        id: &str,
        target: PipelineStage,
    ) -> Result<Option<PendingTransition>, ClientError> {
        let mut state = self.write();
        let record = state
            .applications
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| ClientError::NotFound(id.to_string()))?;

        if record.stage == target {
            return Ok(None);
        }

        let snapshot = record.clone();
        record.stage = target;
        Ok(Some(PendingTransition { snapshot, target }))
    }

    /// Replaces the cached record with the server's authoritative version.
    pub fn commit(&self, pending: PendingTransition, confirmed: JobApplication) {
        debug!(
            "Confirmed {} {} -> {}",
            pending.id(),
            pending.from_stage(),
            pending.target()
        );
        replace_by_id(&mut self.write().applications, confirmed);
    }

    /// Restores the exact pre-transition record and surfaces `message`.
    pub fn rollback(&self, pending: PendingTransition, message: &str) {
        info!(
            "Rolling back {} to {} after failed move to {}",
            pending.id(),
            pending.from_stage(),
            pending.target()
        );
        let mut state = self.write();
        replace_by_id(&mut state.applications, pending.snapshot);
        state.error = Some(message.to_string());
    }

    /// Moves a cached record to `target`, optimistically. On failure the record
    /// is restored, the error slot is set, and the error is returned.
    pub async fn stage_transition(
        &self,
        id: &str,
        target: PipelineStage,
    ) -> Result<TransitionOutcome, ClientError> {
        let Some(pending) = self.begin_transition(id, target)? else {
            debug!("Job application {id} already in {target}");
            return Ok(TransitionOutcome::Unchanged);
        };

        match self
            .api
            .update(id, UpdateJobApplicationRequest::stage_only(target))
            .await
        {
            Ok(confirmed) => {
                self.commit(pending, confirmed.clone());
                Ok(TransitionOutcome::Confirmed(confirmed))
            }
            Err(e) => {
                error!("Error updating job application stage: {e}");
                self.rollback(pending, "Failed to update job application stage");
                Err(e)
            }
        }
    }

    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        match self.api.delete(id).await {
            Ok(_) => {
                let mut state = self.write();
                state.applications.retain(|a| a.id != id);
                if state.selected_id.as_deref() == Some(id) {
                    state.selected_id = None;
                }
                Ok(())
            }
            Err(e) => {
                error!("Error deleting job application {id}: {e}");
                self.set_error("Failed to delete job application");
                Err(e)
            }
        }
    }

    pub async fn add_note(&self, id: &str, req: CreateNoteRequest) -> Result<Note, ClientError> {
        match self.api.add_note(id, req).await {
            Ok(note) => {
                if let Some(app) = self.write().applications.iter_mut().find(|a| a.id == id) {
                    app.notes.push(note.clone());
                }
                Ok(note)
            }
            Err(e) => {
                error!("Error adding note to {id}: {e}");
                self.set_error("Failed to add note");
                Err(e)
            }
        }
    }

    pub async fn add_communication(
        &self,
        id: &str,
        req: CreateCommunicationRequest,
    ) -> Result<Communication, ClientError> {
        match self.api.add_communication(id, req).await {
            Ok(communication) => {
                if let Some(app) = self.write().applications.iter_mut().find(|a| a.id == id) {
                    app.communications.push(communication.clone());
                }
                Ok(communication)
            }
            Err(e) => {
                error!("Error adding communication to {id}: {e}");
                self.set_error("Failed to add communication");
                Err(e)
            }
        }
    }
}
