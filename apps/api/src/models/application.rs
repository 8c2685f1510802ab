use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Closed value sets
// ────────────────────────────────────────────────────────────────────────────

/// Kanban column an application sits in. Declaration order is pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Researched,
    Applied,
    PhoneScreen,
    Interview,
    Final,
    Offer,
    Rejected,
    Withdrawn,
}

pub const PIPELINE_STAGES: [PipelineStage; 8] = [
    PipelineStage::Researched,
    PipelineStage::Applied,
    PipelineStage::PhoneScreen,
    PipelineStage::Interview,
    PipelineStage::Final,
    PipelineStage::Offer,
    PipelineStage::Rejected,
    PipelineStage::Withdrawn,
];

impl PipelineStage {
    /// Every application enters the pipeline here.
    pub const INITIAL: PipelineStage = PipelineStage::Researched;

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Researched => "researched",
            PipelineStage::Applied => "applied",
            PipelineStage::PhoneScreen => "phone_screen",
            PipelineStage::Interview => "interview",
            PipelineStage::Final => "final",
            PipelineStage::Offer => "offer",
            PipelineStage::Rejected => "rejected",
            PipelineStage::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        PIPELINE_STAGES.into_iter().find(|stage| stage.as_str() == s)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteType {
    #[default]
    General,
    Interview,
    Research,
    FollowUp,
}

impl NoteType {
    pub const ALL: [NoteType; 4] = [
        NoteType::General,
        NoteType::Interview,
        NoteType::Research,
        NoteType::FollowUp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::General => "general",
            NoteType::Interview => "interview",
            NoteType::Research => "research",
            NoteType::FollowUp => "follow_up",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationType {
    Email,
    Phone,
    Meeting,
    Message,
}

impl CommunicationType {
    pub const ALL: [CommunicationType; 4] = [
        CommunicationType::Email,
        CommunicationType::Phone,
        CommunicationType::Meeting,
        CommunicationType::Message,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationType::Email => "email",
            CommunicationType::Phone => "phone",
            CommunicationType::Meeting => "meeting",
            CommunicationType::Message => "message",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Inbound, Direction::Outbound];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

/// Parses an application deadline. Accepts RFC 3339, or a bare `YYYY-MM-DD`
/// date which is taken as midnight UTC.
pub fn parse_deadline(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

mod deadline {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse_deadline(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid date \"{raw}\""))),
            None => Ok(None),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Joined view
// ────────────────────────────────────────────────────────────────────────────

/// One entry in an application's stage history. `from_stage` is `None` only
/// for the synthetic creation transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTransition {
    pub id: String,
    pub from_stage: Option<PipelineStage>,
    pub to_stage: PipelineStage,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub note_type: NoteType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Communication {
    pub id: String,
    #[serde(rename = "type")]
    pub comm_type: CommunicationType,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_person: Option<String>,
}

/// An application with its history, notes and communications attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobApplication {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_range: Option<String>,
    #[serde(
        default,
        deserialize_with = "deadline::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub application_deadline: Option<DateTime<Utc>>,
    pub stage: PipelineStage,
    pub date_added: DateTime<Utc>,
    #[serde(default)]
    pub stage_history: Vec<StageTransition>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub communications: Vec<Communication>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub source: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Stored rows
// ────────────────────────────────────────────────────────────────────────────

/// Row in the `jobApplications` relation. Children live in their own relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRow {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_range: Option<String>,
    #[serde(
        default,
        deserialize_with = "deadline::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub application_deadline: Option<DateTime<Utc>>,
    pub stage: PipelineStage,
    pub date_added: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub source: String,
}

impl ApplicationRow {
    pub fn join(
        self,
        stage_history: Vec<StageTransition>,
        notes: Vec<Note>,
        communications: Vec<Communication>,
    ) -> JobApplication {
        JobApplication {
            id: self.id,
            title: self.title,
            company: self.company,
            location: self.location,
            url: self.url,
            description: self.description,
            salary_range: self.salary_range,
            application_deadline: self.application_deadline,
            stage: self.stage,
            date_added: self.date_added,
            stage_history,
            notes,
            communications,
            tags: self.tags,
            priority: self.priority,
            source: self.source,
        }
    }
}

impl From<&JobApplication> for ApplicationRow {
    fn from(app: &JobApplication) -> Self {
        ApplicationRow {
            id: app.id.clone(),
            title: app.title.clone(),
            company: app.company.clone(),
            location: app.location.clone(),
            url: app.url.clone(),
            description: app.description.clone(),
            salary_range: app.salary_range.clone(),
            application_deadline: app.application_deadline,
            stage: app.stage,
            date_added: app.date_added,
            tags: app.tags.clone(),
            priority: app.priority,
            source: app.source.clone(),
        }
    }
}

/// Row in one of the child relations, keyed by the owning application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildRow<T> {
    #[serde(rename = "jobApplicationId")]
    pub job_application_id: String,
    #[serde(flatten)]
    pub record: T,
}

impl<T> ChildRow<T> {
    pub fn new(job_application_id: &str, record: T) -> Self {
        Self {
            job_application_id: job_application_id.to_string(),
            record,
        }
    }
}

pub type TransitionRow = ChildRow<StageTransition>;
pub type NoteRow = ChildRow<Note>;
pub type CommunicationRow = ChildRow<Communication>;

// ────────────────────────────────────────────────────────────────────────────
// Request / response bodies
// ────────────────────────────────────────────────────────────────────────────

/// Closed-set fields arrive as plain strings so that bad values surface as
/// validation errors rather than body rejections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobApplicationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_range: Option<String>,
    #[serde(
        default,
        deserialize_with = "deadline::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub application_deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Partial update. Absent fields are left untouched; child arrays replace the
/// stored children when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobApplicationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_range: Option<String>,
    #[serde(
        default,
        deserialize_with = "deadline::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub application_deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_history: Option<Vec<StageTransition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<Note>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communications: Option<Vec<Communication>>,
}

impl UpdateJobApplicationRequest {
    pub fn stage_only(stage: PipelineStage) -> Self {
        Self {
            stage: Some(stage.as_str().to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub note_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommunicationRequest {
    #[serde(rename = "type", default)]
    pub comm_type: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_person: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobApplicationListResponse {
    pub data: Vec<JobApplication>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteJobApplicationResponse {
    pub success: bool,
    pub message: String,
    pub deleted_job_application: JobApplication,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_wire_names_parse_back() {
        for stage in PIPELINE_STAGES {
            assert_eq!(PipelineStage::parse(stage.as_str()), Some(stage));
        }
        assert_eq!(PipelineStage::parse("not_a_stage"), None);
        assert_eq!(PipelineStage::parse("Applied"), None);
    }

    #[test]
    fn test_stage_order_follows_pipeline() {
        assert!(PipelineStage::Researched < PipelineStage::Applied);
        assert!(PipelineStage::Offer < PipelineStage::Withdrawn);
        assert_eq!(PIPELINE_STAGES[0], PipelineStage::INITIAL);
    }

    #[test]
    fn test_transition_row_is_flat_with_foreign_key() {
        let row = TransitionRow::new(
            "job_1",
            StageTransition {
                id: "st_1".to_string(),
                from_stage: None,
                to_stage: PipelineStage::Researched,
                timestamp: "2024-05-01T10:00:00Z".parse().unwrap(),
                notes: Some("Job application created".to_string()),
            },
        );
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["jobApplicationId"], "job_1");
        assert_eq!(value["fromStage"], serde_json::Value::Null);
        assert_eq!(value["toStage"], "researched");
        assert_eq!(value["timestamp"], "2024-05-01T10:00:00Z");
    }

    #[test]
    fn test_stored_timestamps_parse_from_text() {
        let value = json!({
            "jobApplicationId": "job_1",
            "id": "note_1",
            "content": "Recruiter was friendly",
            "timestamp": "2024-05-02T08:30:00.000Z",
            "type": "follow_up"
        });
        let row: NoteRow = serde_json::from_value(value).unwrap();
        assert_eq!(row.record.note_type, NoteType::FollowUp);
        assert_eq!(row.record.timestamp.to_rfc3339(), "2024-05-02T08:30:00+00:00");
    }

    #[test]
    fn test_application_defaults_for_missing_optional_fields() {
        let value = json!({
            "id": "job_1",
            "title": "SWE",
            "company": "Acme",
            "stage": "phone_screen",
            "dateAdded": "2024-05-01T10:00:00Z"
        });
        let row: ApplicationRow = serde_json::from_value(value).unwrap();
        assert_eq!(row.priority, Priority::Medium);
        assert!(row.tags.is_empty());
        assert_eq!(row.stage, PipelineStage::PhoneScreen);
    }

    #[test]
    fn test_direction_wire_names_parse_back() {
        for direction in Direction::ALL {
            assert_eq!(Direction::parse(direction.as_str()), Some(direction));
            assert_eq!(
                serde_json::to_value(direction).unwrap(),
                json!(direction.as_str())
            );
        }
        assert_eq!(Direction::parse("sideways"), None);
    }

    #[test]
    fn test_deadline_accepts_date_only_and_rfc3339() {
        let date_only: CreateJobApplicationRequest =
            serde_json::from_value(json!({"applicationDeadline": "2024-06-30"})).unwrap();
        assert_eq!(
            date_only.application_deadline,
            Some("2024-06-30T00:00:00Z".parse().unwrap())
        );

        let full: UpdateJobApplicationRequest = serde_json::from_value(
            json!({"applicationDeadline": "2024-06-30T17:00:00+02:00"}),
        )
        .unwrap();
        assert_eq!(
            full.application_deadline,
            Some("2024-06-30T15:00:00Z".parse().unwrap())
        );

        let absent: CreateJobApplicationRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(absent.application_deadline, None);
        assert!(serde_json::from_value::<CreateJobApplicationRequest>(
            json!({"applicationDeadline": "next friday"})
        )
        .is_err());
    }

    #[test]
    fn test_stage_only_update_serializes_single_field() {
        let body = UpdateJobApplicationRequest::stage_only(PipelineStage::Interview);
        assert_eq!(serde_json::to_value(&body).unwrap(), json!({"stage": "interview"}));
    }
}
