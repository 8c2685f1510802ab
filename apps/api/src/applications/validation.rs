use crate::errors::AppError;
use crate::models::application::{
    CommunicationType, CreateCommunicationRequest, CreateJobApplicationRequest, CreateNoteRequest,
    Direction, NoteType, PipelineStage, Priority, UpdateJobApplicationRequest, PIPELINE_STAGES,
};

/// Closed-set fields of a create request after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidCreate {
    pub title: String,
    pub company: String,
    pub priority: Priority,
}

/// Closed-set fields of a PATCH body after validation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ValidUpdate {
    pub stage: Option<PipelineStage>,
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidNote {
    pub content: String,
    pub note_type: NoteType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidCommunication {
    pub comm_type: CommunicationType,
    pub direction: Direction,
    pub content: String,
    pub subject: Option<String>,
    pub contact_person: Option<String>,
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// Trims and drops values that are empty after trimming.
fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_priority(raw: &str) -> Result<Priority, AppError> {
    Priority::parse(raw).ok_or_else(|| {
        AppError::Validation("Invalid priority. Must be one of: low, medium, high".to_string())
    })
}

pub fn validate_create(req: &CreateJobApplicationRequest) -> Result<ValidCreate, AppError> {
    if is_blank(req.title.as_deref()) || is_blank(req.company.as_deref()) {
        return Err(AppError::Validation(
            "Title and company are required fields".to_string(),
        ));
    }

    let priority = match req.priority.as_deref() {
        Some(raw) => parse_priority(raw)?,
        None => Priority::default(),
    };

    Ok(ValidCreate {
        title: req.title.clone().unwrap_or_default(),
        company: req.company.clone().unwrap_or_default(),
        priority,
    })
}

pub fn validate_update(req: &UpdateJobApplicationRequest) -> Result<ValidUpdate, AppError> {
    let stage = match req.stage.as_deref() {
        Some(raw) => Some(PipelineStage::parse(raw).ok_or_else(|| {
            let names: Vec<&str> = PIPELINE_STAGES.iter().map(|s| s.as_str()).collect();
            AppError::Validation(format!(
                "Invalid stage. Must be one of: {}",
                names.join(", ")
            ))
        })?),
        None => None,
    };

    let priority = req.priority.as_deref().map(parse_priority).transpose()?;

    if req.title.is_some() && is_blank(req.title.as_deref()) {
        return Err(AppError::Validation("Title cannot be empty".to_string()));
    }
    if req.company.is_some() && is_blank(req.company.as_deref()) {
        return Err(AppError::Validation("Company cannot be empty".to_string()));
    }

    Ok(ValidUpdate { stage, priority })
}

pub fn validate_note(req: &CreateNoteRequest) -> Result<ValidNote, AppError> {
    let content = non_blank(req.content.as_deref())
        .ok_or_else(|| AppError::Validation("Note content is required".to_string()))?;

    let note_type = match req.note_type.as_deref() {
        Some(raw) => NoteType::parse(raw).ok_or_else(|| {
            AppError::Validation(
                "Invalid note type. Must be one of: general, interview, research, follow_up"
                    .to_string(),
            )
        })?,
        None => NoteType::default(),
    };

    Ok(ValidNote { content, note_type })
}

pub fn validate_communication(
    req: &CreateCommunicationRequest,
) -> Result<ValidCommunication, AppError> {
    let content = non_blank(req.content.as_deref())
        .ok_or_else(|| AppError::Validation("Communication content is required".to_string()))?;

    let comm_type = req
        .comm_type
        .as_deref()
        .and_then(CommunicationType::parse)
        .ok_or_else(|| AppError::Validation("Valid communication type is required".to_string()))?;

    let direction = req
        .direction
        .as_deref()
        .and_then(Direction::parse)
        .ok_or_else(|| {
            AppError::Validation("Valid communication direction is required".to_string())
        })?;

    Ok(ValidCommunication {
        comm_type,
        direction,
        content,
        subject: non_blank(req.subject.as_deref()),
        contact_person: non_blank(req.contact_person.as_deref()),
    })
}
