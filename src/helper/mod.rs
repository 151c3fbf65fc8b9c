pub mod calendar_helpers;
pub mod permission_helpers;
pub mod schedule_helpers;
pub mod upload_helpers;
pub mod workflow_helpers;
