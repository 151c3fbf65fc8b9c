use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle of a post on its way from idea to published content.
///
/// `NeedsCaption` is a real machine state even though several dashboards
/// render it inside the Draft column; that collapse lives in
/// [`WorkflowStatus::display_status`] and nowhere else.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    NeedsCaption,
    InDesign,
    DesignReview,
    Approved,
    Scheduled,
    Posted,
}

impl WorkflowStatus {
    pub const ALL: [WorkflowStatus; 7] = [
        WorkflowStatus::Draft,
        WorkflowStatus::NeedsCaption,
        WorkflowStatus::InDesign,
        WorkflowStatus::DesignReview,
        WorkflowStatus::Approved,
        WorkflowStatus::Scheduled,
        WorkflowStatus::Posted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Draft => "draft",
            WorkflowStatus::NeedsCaption => "needs_caption",
            WorkflowStatus::InDesign => "in_design",
            WorkflowStatus::DesignReview => "design_review",
            WorkflowStatus::Approved => "approved",
            WorkflowStatus::Scheduled => "scheduled",
            WorkflowStatus::Posted => "posted",
        }
    }

    pub fn parse(s: &str) -> Option<WorkflowStatus> {
        match s {
            "draft" => Some(WorkflowStatus::Draft),
            "needs_caption" => Some(WorkflowStatus::NeedsCaption),
            "in_design" => Some(WorkflowStatus::InDesign),
            "design_review" => Some(WorkflowStatus::DesignReview),
            "approved" => Some(WorkflowStatus::Approved),
            "scheduled" => Some(WorkflowStatus::Scheduled),
            "posted" => Some(WorkflowStatus::Posted),
            _ => None,
        }
    }

    /// Presentation-only projection: dashboards show captionless drafts and
    /// drafts in the same column.
    pub fn display_status(&self) -> &'static str {
        match self {
            WorkflowStatus::NeedsCaption => "draft",
            other => other.as_str(),
        }
    }
}

/// Which of a post's two asset lists an upload lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Reference,
    Output,
}

impl AssetKind {
    pub fn column(&self) -> &'static str {
        match self {
            AssetKind::Reference => "design_reference_urls",
            AssetKind::Output => "design_output_urls",
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub dark_mode: bool,
    pub job_title: String,
    pub phone: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub company: String,
    pub email: String,
    pub color: String,
    pub brief_text: String,
    pub content_requirements: String,
    pub assigned_manager_id: Option<i64>,
    pub assigned_writer_id: Option<i64>,
    pub assigned_designer_id: Option<i64>,
    pub assigned_sm_id: Option<i64>,
    pub assigned_motion_id: Option<i64>,
    pub created_at: String,
}

/// A recurring per-client posting requirement. `posting_days` holds raw
/// day-code tokens ("mon", "fri_2", "fri_last"); parsing happens in the
/// scheduler, not here.
#[derive(Debug, Serialize, Clone)]
pub struct PostingRule {
    pub id: i64,
    pub client_id: i64,
    pub platform: String,
    pub content_type: String,
    pub posting_days: Vec<String>,
    pub posting_hours: Vec<String>,
    pub posts_per_day: u32,
    pub is_active: bool,
    pub notes: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct Post {
    pub id: i64,
    pub client_id: i64,
    pub topic: String,
    pub caption: String,
    pub tov: String,
    pub brief_notes: String,
    pub platforms: Vec<String>,
    pub post_type: String,
    pub priority: String,
    pub scheduled_at: Option<String>,
    pub design_reference_urls: Vec<String>,
    pub design_output_urls: Vec<String>,
    pub workflow_status: WorkflowStatus,
    pub revision_count: u32,
    pub assigned_writer_id: Option<i64>,
    pub assigned_designer_id: Option<i64>,
    pub assigned_sm_id: Option<i64>,
    pub assigned_motion_id: Option<i64>,
    pub created_by_id: Option<i64>,
    pub approved_by_id: Option<i64>,
    pub approved_at: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub client_name: Option<String>,
}

impl Post {
    /// Date a post occupies on the calendar: its scheduled date when set,
    /// otherwise its creation date.
    pub fn effective_date(&self) -> Option<NaiveDate> {
        let raw = self
            .scheduled_at
            .as_deref()
            .filter(|s| s.len() >= 10)
            .unwrap_or(&self.created_at);
        NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()
    }
}

/// One append-only entry of a post's transition log.
#[derive(Debug, Serialize, Clone)]
pub struct WorkflowEvent {
    pub id: i64,
    pub post_id: i64,
    pub user_id: Option<i64>,
    pub from_status: String,
    pub to_status: String,
    pub comment: String,
    pub created_at: String,
    pub user_name: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct PostComment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub comment_type: String,
    pub created_at: String,
    pub user_name: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub client_id: Option<i64>,
    pub assigned_to_id: Option<i64>,
    pub created_by_id: i64,
    pub status: String,
    pub priority: String,
    pub due_date: Option<String>,
    pub category: String,
    pub post_id: Option<i64>,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub completed_at: Option<String>,
    pub assigned_to_name: Option<String>,
    pub client_name: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct TaskComment {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: String,
    pub user_name: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<i64>,
    pub is_read: bool,
    pub created_at: String,
}

/// A computed content obligation derived from a posting rule. Never stored;
/// recomputed per request.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: String,
    pub platform: String,
    pub content_type: String,
    pub client_id: i64,
    pub filled: bool,
}

pub mod db_operations;

#[cfg(test)]
pub(crate) fn sample_post() -> Post {
    Post {
        id: 1,
        client_id: 1,
        topic: String::new(),
        caption: String::new(),
        tov: String::new(),
        brief_notes: String::new(),
        platforms: vec!["instagram".to_string()],
        post_type: "post".to_string(),
        priority: "normal".to_string(),
        scheduled_at: None,
        design_reference_urls: Vec::new(),
        design_output_urls: Vec::new(),
        workflow_status: WorkflowStatus::Draft,
        revision_count: 0,
        assigned_writer_id: None,
        assigned_designer_id: None,
        assigned_sm_id: None,
        assigned_motion_id: None,
        created_by_id: None,
        approved_by_id: None,
        approved_at: None,
        created_at: "2024-01-31 08:00:00".to_string(),
        updated_at: None,
        client_name: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in WorkflowStatus::ALL {
            assert_eq!(WorkflowStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(WorkflowStatus::parse("deleted"), None);
    }

    #[test]
    fn needs_caption_collapses_only_for_display() {
        assert_eq!(WorkflowStatus::NeedsCaption.display_status(), "draft");
        assert_eq!(WorkflowStatus::NeedsCaption.as_str(), "needs_caption");
        assert_eq!(WorkflowStatus::Scheduled.display_status(), "scheduled");
    }

    #[test]
    fn effective_date_prefers_schedule_over_creation() {
        let mut post = sample_post();
        post.scheduled_at = Some("2024-02-09T10:00".to_string());
        post.created_at = "2024-01-31 08:00:00".to_string();
        assert_eq!(post.effective_date(), NaiveDate::from_ymd_opt(2024, 2, 9));

        post.scheduled_at = None;
        assert_eq!(post.effective_date(), NaiveDate::from_ymd_opt(2024, 1, 31));
    }
}
