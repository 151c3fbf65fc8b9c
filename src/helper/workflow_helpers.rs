use thiserror::Error;

use crate::helper::permission_helpers::{can_perform, Capability};
use crate::models::{Post, WorkflowStatus};

/// Everything that can go wrong while moving a post through its workflow.
/// All variants are caller-recoverable; routes map them to 4xx responses.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Role '{role}' is not allowed to perform this transition")]
    Unauthorized { role: String },
    #[error("Cannot transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },
    #[error("A feedback comment is required for this transition")]
    MissingComment,
    #[error("{0}")]
    ValidationFailed(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Post changed concurrently: expected status '{expected}', found '{actual}'")]
    ConcurrentModification { expected: String, actual: String },
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),
}

/// One edge of the workflow graph. `capability: None` marks the edge as
/// reachable only through the publishing collaborator, never via the
/// user-facing transition call.
#[derive(Debug)]
pub struct TransitionRule {
    pub from: WorkflowStatus,
    pub to: WorkflowStatus,
    pub capability: Option<Capability>,
    pub requires_comment: bool,
}

use WorkflowStatus::*;

pub const TRANSITIONS: &[TransitionRule] = &[
    TransitionRule {
        from: Draft,
        to: NeedsCaption,
        capability: Some(Capability::CreatePost),
        requires_comment: false,
    },
    TransitionRule {
        from: Draft,
        to: InDesign,
        capability: Some(Capability::CreatePost),
        requires_comment: false,
    },
    TransitionRule {
        from: NeedsCaption,
        to: InDesign,
        capability: Some(Capability::EditCaption),
        requires_comment: false,
    },
    TransitionRule {
        from: InDesign,
        to: DesignReview,
        capability: Some(Capability::UploadDesign),
        requires_comment: false,
    },
    TransitionRule {
        from: DesignReview,
        to: Approved,
        capability: Some(Capability::Approve),
        requires_comment: false,
    },
    TransitionRule {
        from: DesignReview,
        to: InDesign,
        capability: Some(Capability::Approve),
        requires_comment: true,
    },
    TransitionRule {
        from: DesignReview,
        to: NeedsCaption,
        capability: Some(Capability::Approve),
        requires_comment: true,
    },
    TransitionRule {
        from: Approved,
        to: Scheduled,
        capability: Some(Capability::Schedule),
        requires_comment: false,
    },
    TransitionRule {
        from: Scheduled,
        to: Posted,
        capability: None,
        requires_comment: false,
    },
];

pub fn find_rule(from: WorkflowStatus, to: WorkflowStatus) -> Option<&'static TransitionRule> {
    TRANSITIONS.iter().find(|r| r.from == from && r.to == to)
}

pub fn allowed_targets(from: WorkflowStatus) -> Vec<WorkflowStatus> {
    TRANSITIONS
        .iter()
        .filter(|r| r.from == from)
        .map(|r| r.to)
        .collect()
}

/// Caller-supplied side of a transition. The caption field carries the text
/// to persist ahead of a needs_caption -> in_design move; the storage layer
/// writes it before it attempts the transition itself.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub to: WorkflowStatus,
    pub actor_id: i64,
    pub comment: Option<String>,
    pub scheduled_at: Option<String>,
    pub caption: Option<String>,
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |s| s.trim().is_empty())
}

/// Validates a requested transition against the post's *actual* state and
/// returns the matching rule. Check order: edge exists, actor may use it,
/// comment present where required, then domain preconditions. The
/// expected-state comparison (ConcurrentModification) happens in the storage
/// layer, which is the only place that sees the authoritative row.
pub fn check_transition(
    post: &Post,
    actor_role: &str,
    req: &TransitionRequest,
) -> Result<&'static TransitionRule, WorkflowError> {
    let rule =
        find_rule(post.workflow_status, req.to).ok_or_else(|| WorkflowError::InvalidTransition {
            from: post.workflow_status.as_str().to_string(),
            to: req.to.as_str().to_string(),
        })?;

    match rule.capability {
        Some(capability) if can_perform(actor_role, capability) => {}
        // The scheduled -> posted edge belongs to the publishing collaborator.
        _ => {
            return Err(WorkflowError::Unauthorized {
                role: actor_role.to_string(),
            })
        }
    }

    if rule.requires_comment && is_blank(req.comment.as_deref()) {
        return Err(WorkflowError::MissingComment);
    }

    if post.workflow_status == Draft && post.platforms.iter().all(|p| p.trim().is_empty()) {
        return Err(WorkflowError::ValidationFailed(
            "At least one platform must be selected before the post leaves draft".to_string(),
        ));
    }

    if post.workflow_status == NeedsCaption && req.to == InDesign {
        let caption = req.caption.as_deref().unwrap_or(&post.caption);
        if caption.trim().is_empty() {
            return Err(WorkflowError::ValidationFailed(
                "Caption must be written before the post moves to design".to_string(),
            ));
        }
    }

    if req.to == Scheduled && is_blank(req.scheduled_at.as_deref().or(post.scheduled_at.as_deref()))
    {
        return Err(WorkflowError::ValidationFailed(
            "A schedule date/time is required".to_string(),
        ));
    }

    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_post;

    const ROLES: [&str; 6] = [
        "admin",
        "manager",
        "sm_specialist",
        "copywriter",
        "designer",
        "motion_editor",
    ];

    fn ready_post(status: WorkflowStatus) -> Post {
        let mut post = sample_post();
        post.workflow_status = status;
        post.caption = "A finished caption".to_string();
        post.platforms = vec!["instagram".to_string()];
        post
    }

    fn full_request(to: WorkflowStatus) -> TransitionRequest {
        TransitionRequest {
            to,
            actor_id: 1,
            comment: Some("please adjust the colors".to_string()),
            scheduled_at: Some("2024-02-09T10:00".to_string()),
            caption: None,
        }
    }

    #[test]
    fn exhaustive_role_by_edge_enumeration() {
        // With every precondition satisfied, the outcome is decided purely by
        // the transition table and the capability table.
        for role in ROLES {
            for from in WorkflowStatus::ALL {
                for to in WorkflowStatus::ALL {
                    let post = ready_post(from);
                    let req = full_request(to);
                    let result = check_transition(&post, role, &req);
                    let expected_ok = match find_rule(from, to) {
                        Some(rule) => match rule.capability {
                            Some(cap) => can_perform(role, cap),
                            None => false,
                        },
                        None => false,
                    };
                    assert_eq!(
                        result.is_ok(),
                        expected_ok,
                        "{role}: {} -> {}",
                        from.as_str(),
                        to.as_str()
                    );
                }
            }
        }
    }

    #[test]
    fn empty_caption_blocks_design_handoff_for_every_role() {
        for role in ROLES {
            let mut post = ready_post(NeedsCaption);
            post.caption = "   ".to_string();
            let mut req = full_request(InDesign);
            req.caption = None;
            let result = check_transition(&post, role, &req);
            match result {
                Err(WorkflowError::ValidationFailed(_)) => {}
                Err(WorkflowError::Unauthorized { .. }) if !can_perform(role, Capability::EditCaption) => {}
                other => panic!("{role}: expected validation failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn caption_supplied_with_the_call_satisfies_the_precondition() {
        let mut post = ready_post(NeedsCaption);
        post.caption = String::new();
        let mut req = full_request(InDesign);
        req.caption = Some("fresh caption text".to_string());
        assert!(check_transition(&post, "copywriter", &req).is_ok());
    }

    #[test]
    fn review_rejection_requires_feedback() {
        for to in [InDesign, NeedsCaption] {
            let post = ready_post(DesignReview);
            let mut req = full_request(to);
            req.comment = Some("  ".to_string());
            let result = check_transition(&post, "manager", &req);
            assert!(matches!(result, Err(WorkflowError::MissingComment)), "{to:?}");
        }
        // Approval itself needs no comment.
        let post = ready_post(DesignReview);
        let mut req = full_request(Approved);
        req.comment = None;
        assert!(check_transition(&post, "manager", &req).is_ok());
    }

    #[test]
    fn scheduling_requires_a_timestamp() {
        let post = ready_post(Approved);
        let mut req = full_request(Scheduled);
        req.scheduled_at = None;
        let result = check_transition(&post, "sm_specialist", &req);
        assert!(matches!(result, Err(WorkflowError::ValidationFailed(_))));
    }

    #[test]
    fn platformless_draft_cannot_be_submitted() {
        let mut post = ready_post(Draft);
        post.platforms = Vec::new();
        let result = check_transition(&post, "admin", &full_request(InDesign));
        assert!(matches!(result, Err(WorkflowError::ValidationFailed(_))));
    }

    #[test]
    fn publishing_edge_is_closed_to_all_roles() {
        for role in ROLES {
            let post = ready_post(Scheduled);
            let result = check_transition(&post, role, &full_request(Posted));
            assert!(matches!(result, Err(WorkflowError::Unauthorized { .. })), "{role}");
        }
    }
}
