//! Application Service: CRUD and stage-transition orchestration over the four
//! flat relations.
//!
//! Stage history is append-only: a stage change adds exactly one transition
//! and never rewrites earlier ones. Every read-modify-write sequence runs under
//! a single async write lock so requests within one process do not interleave
//! their whole-relation replaces.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::applications::validation::{
    validate_communication, validate_create, validate_note, validate_update,
};
use crate::db::{Relation, RecordStore, Table};
use crate::errors::AppError;
use crate::models::application::{
    ApplicationRow, ChildRow, Communication, CommunicationRow, CreateCommunicationRequest,
    CreateJobApplicationRequest, CreateNoteRequest, JobApplication, JobApplicationListResponse,
    Note, NoteRow, PipelineStage, StageTransition, TransitionRow, UpdateJobApplicationRequest,
};

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const DEFAULT_SOURCE: &str = "Manual Entry";
const CREATED_NOTE: &str = "Job application created";
const STAGE_UPDATED_NOTE: &str = "Stage updated via API";
/// Foreign key of every child row as stored.
const CHILD_KEY: &str = "jobApplicationId";

/// Generates an opaque id such as `job_3f2a…`.
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub stage: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// Applies the search filter, then the stage filter, then 1-indexed pagination.
pub fn filter_and_paginate(
    applications: Vec<JobApplication>,
    query: &ListQuery,
) -> JobApplicationListResponse {
    let search = query
        .search
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let stage = query.stage.as_deref().filter(|s| !s.is_empty());

    let filtered: Vec<JobApplication> = applications
        .into_iter()
        .filter(|app| match &search {
            Some(term) => {
                app.title.to_lowercase().contains(term)
                    || app.company.to_lowercase().contains(term)
                    || app.tags.iter().any(|t| t.to_lowercase().contains(term))
            }
            None => true,
        })
        .filter(|app| stage.map(|s| app.stage.as_str() == s).unwrap_or(true))
        .collect();

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let total = filtered.len();
    let data = filtered
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();

    JobApplicationListResponse {
        data,
        total,
        page,
        limit,
    }
}

fn group_by_application<T>(rows: Vec<ChildRow<T>>) -> HashMap<String, Vec<T>> {
    let mut grouped: HashMap<String, Vec<T>> = HashMap::new();
    for row in rows {
        grouped
            .entry(row.job_application_id)
            .or_default()
            .push(row.record);
    }
    grouped
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Job application {id} not found"))
}

#[derive(Clone)]
pub struct ApplicationService {
    store: RecordStore,
    write_lock: Arc<Mutex<()>>,
}

impl ApplicationService {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// All applications with their children attached, in stored order.
    pub async fn list(&self) -> Vec<JobApplication> {
        let (rows, transitions, notes, communications) = tokio::join!(
            self.store.read_all::<ApplicationRow>(Relation::JobApplications),
            self.store.read_all::<TransitionRow>(Relation::StageTransitions),
            self.store.read_all::<NoteRow>(Relation::Notes),
            self.store.read_all::<CommunicationRow>(Relation::Communications),
        );

        let mut transitions = group_by_application(transitions);
        let mut notes = group_by_application(notes);
        let mut communications = group_by_application(communications);

        rows.into_iter()
            .map(|row| {
                let history = transitions.remove(&row.id).unwrap_or_default();
                let app_notes = notes.remove(&row.id).unwrap_or_default();
                let comms = communications.remove(&row.id).unwrap_or_default();
                row.join(history, app_notes, comms)
            })
            .collect()
    }

    pub async fn search(&self, query: &ListQuery) -> JobApplicationListResponse {
        filter_and_paginate(self.list().await, query)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<JobApplication, AppError> {
        self.list()
            .await
            .into_iter()
            .find(|app| app.id == id)
            .ok_or_else(|| not_found(id))
    }

    /// Creates an application in the initial stage with its synthetic creation
    /// transition. Any stage the caller had in mind is ignored.
    pub async fn create(&self, req: CreateJobApplicationRequest) -> Result<JobApplication, AppError> {
        let valid = validate_create(&req)?;
        let now = Utc::now();
        let id = new_id("job");

        let application = JobApplication {
            id: id.clone(),
            title: valid.title,
            company: valid.company,
            location: req.location,
            url: req.url,
            description: req.description,
            salary_range: req.salary_range,
            application_deadline: req.application_deadline,
            stage: PipelineStage::INITIAL,
            date_added: now,
            stage_history: vec![StageTransition {
                id: new_id("st"),
                from_stage: None,
                to_stage: PipelineStage::INITIAL,
                timestamp: now,
                notes: Some(CREATED_NOTE.to_string()),
            }],
            notes: Vec::new(),
            communications: Vec::new(),
            tags: req.tags.unwrap_or_default(),
            priority: valid.priority,
            source: req.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
        };

        let _guard = self.write_lock.lock().await;

        let mut table: Table<ApplicationRow> =
            self.store.read_table(Relation::JobApplications).await;
        table.rows.push(ApplicationRow::from(&application));
        self.store
            .write_table(Relation::JobApplications, &table)
            .await?;

        self.append_child(
            Relation::StageTransitions,
            &id,
            application.stage_history.clone(),
        )
        .await?;

        info!(
            "Created job application {id} ({} at {})",
            application.title, application.company
        );
        Ok(application)
    }

    /// Applies a partial update. A stage change appends one transition from the
    /// prior stage; child arrays in the body replace the stored children.
    pub async fn update(
        &self,
        id: &str,
        req: UpdateJobApplicationRequest,
    ) -> Result<JobApplication, AppError> {
        let guard = self.write_lock.lock().await;

        let mut table: Table<ApplicationRow> =
            self.store.read_table(Relation::JobApplications).await;
        let index = table
            .rows
            .iter()
            .position(|row| row.id == id)
            .ok_or_else(|| not_found(id))?;
        let valid = validate_update(&req)?;

        let row = &mut table.rows[index];
        let prior_stage = row.stage;

        if let Some(title) = req.title {
            row.title = title;
        }
        if let Some(company) = req.company {
            row.company = company;
        }
        if let Some(location) = req.location {
            row.location = Some(location);
        }
        if let Some(url) = req.url {
            row.url = Some(url);
        }
        if let Some(description) = req.description {
            row.description = Some(description);
        }
        if let Some(salary_range) = req.salary_range {
            row.salary_range = Some(salary_range);
        }
        if let Some(deadline) = req.application_deadline {
            row.application_deadline = Some(deadline);
        }
        if let Some(tags) = req.tags {
            row.tags = tags;
        }
        if let Some(priority) = valid.priority {
            row.priority = priority;
        }
        if let Some(source) = req.source {
            row.source = source;
        }
        if let Some(stage) = valid.stage {
            row.stage = stage;
        }

        self.store
            .write_table(Relation::JobApplications, &table)
            .await?;

        match valid.stage.filter(|stage| *stage != prior_stage) {
            Some(new_stage) => {
                let transition = StageTransition {
                    id: new_id("st"),
                    from_stage: Some(prior_stage),
                    to_stage: new_stage,
                    timestamp: Utc::now(),
                    notes: Some(STAGE_UPDATED_NOTE.to_string()),
                };
                self.append_child(Relation::StageTransitions, id, vec![transition])
                    .await?;
                info!("Job application {id} moved {prior_stage} -> {new_stage}");
            }
            None => {
                if let Some(history) = req.stage_history {
                    self.replace_children(Relation::StageTransitions, id, history)
                        .await?;
                }
            }
        }

        if let Some(notes) = req.notes {
            self.replace_children(Relation::Notes, id, notes).await?;
        }
        if let Some(communications) = req.communications {
            self.replace_children(Relation::Communications, id, communications)
                .await?;
        }

        drop(guard);
        self.get_by_id(id).await
    }

    pub async fn append_note(&self, id: &str, req: CreateNoteRequest) -> Result<Note, AppError> {
        let valid = validate_note(&req)?;
        let _guard = self.write_lock.lock().await;
        self.ensure_exists(id).await?;

        let note = Note {
            id: new_id("note"),
            content: valid.content,
            timestamp: Utc::now(),
            note_type: valid.note_type,
        };
        self.append_child(Relation::Notes, id, vec![note.clone()])
            .await?;
        Ok(note)
    }

    pub async fn append_communication(
        &self,
        id: &str,
        req: CreateCommunicationRequest,
    ) -> Result<Communication, AppError> {
        let valid = validate_communication(&req)?;
        let _guard = self.write_lock.lock().await;
        self.ensure_exists(id).await?;

        let communication = Communication {
            id: new_id("comm"),
            comm_type: valid.comm_type,
            direction: valid.direction,
            subject: valid.subject,
            content: valid.content,
            timestamp: Utc::now(),
            contact_person: valid.contact_person,
        };
        self.append_child(Relation::Communications, id, vec![communication.clone()])
            .await?;
        Ok(communication)
    }

    /// Removes the application and cascades to all three child relations.
    /// Returns the application as it was just before deletion.
    pub async fn delete(&self, id: &str) -> Result<JobApplication, AppError> {
        let _guard = self.write_lock.lock().await;
        let application = self.get_by_id(id).await?;

        let (mut rows, mut transitions, mut notes, mut communications) = tokio::join!(
            self.store.read_table::<ApplicationRow>(Relation::JobApplications),
            self.store.read_table::<TransitionRow>(Relation::StageTransitions),
            self.store.read_table::<NoteRow>(Relation::Notes),
            self.store.read_table::<CommunicationRow>(Relation::Communications),
        );

        rows.rows.retain(|r| r.id != id);
        transitions.rows.retain(|r| r.job_application_id != id);
        transitions.discard_unparsed(CHILD_KEY, id);
        notes.rows.retain(|r| r.job_application_id != id);
        notes.discard_unparsed(CHILD_KEY, id);
        communications.rows.retain(|r| r.job_application_id != id);
        communications.discard_unparsed(CHILD_KEY, id);

        tokio::try_join!(
            self.store.write_table(Relation::JobApplications, &rows),
            self.store.write_table(Relation::StageTransitions, &transitions),
            self.store.write_table(Relation::Notes, &notes),
            self.store.write_table(Relation::Communications, &communications),
        )?;

        info!("Deleted job application {id} and its history");
        Ok(application)
    }

    async fn ensure_exists(&self, id: &str) -> Result<(), AppError> {
        let rows: Vec<ApplicationRow> = self.store.read_all(Relation::JobApplications).await;
        if rows.iter().any(|row| row.id == id) {
            Ok(())
        } else {
            Err(not_found(id))
        }
    }

    async fn append_child<T>(
        &self,
        relation: Relation,
        id: &str,
        records: Vec<T>,
    ) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut table: Table<ChildRow<T>> = self.store.read_table(relation).await;
        table
            .rows
            .extend(records.into_iter().map(|record| ChildRow::new(id, record)));
        self.store.write_table(relation, &table).await?;
        Ok(())
    }

    async fn replace_children<T>(
        &self,
        relation: Relation,
        id: &str,
        records: Vec<T>,
    ) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut table: Table<ChildRow<T>> = self.store.read_table(relation).await;
        table.rows.retain(|row| row.job_application_id != id);
        table.discard_unparsed(CHILD_KEY, id);
        table
            .rows
            .extend(records.into_iter().map(|record| ChildRow::new(id, record)));
        self.store.write_table(relation, &table).await?;
        Ok(())
    }
}
