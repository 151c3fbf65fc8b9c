use serde::Serialize;

/// Named permission flags checked against a user's role. The role string is
/// the single authority for what an actor may do; every mutating handler and
/// every workflow edge goes through this table.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    CreatePost,
    EditCaption,
    UploadDesign,
    UploadRef,
    Approve,
    Schedule,
    ViewAll,
    ManageTeam,
    ManageClients,
    ViewClients,
    ManageRules,
}

use Capability::*;

const ADMIN: &[Capability] = &[
    CreatePost,
    EditCaption,
    UploadDesign,
    UploadRef,
    Approve,
    Schedule,
    ViewAll,
    ManageTeam,
    ManageClients,
    ViewClients,
    ManageRules,
];

const MANAGER: &[Capability] = &[
    CreatePost,
    EditCaption,
    UploadRef,
    Approve,
    ViewAll,
    ViewClients,
    ManageRules,
];

const SM_SPECIALIST: &[Capability] = &[EditCaption, Schedule, ViewClients];

const COPYWRITER: &[Capability] = &[CreatePost, EditCaption, UploadRef, ViewClients];

const DESIGNER: &[Capability] = &[UploadDesign];

const MOTION_EDITOR: &[Capability] = &[UploadDesign];

/// Fixed role table. Unknown roles get nothing: the check fails closed.
pub fn capabilities_of(role: &str) -> &'static [Capability] {
    match role {
        "admin" => ADMIN,
        "manager" => MANAGER,
        "sm_specialist" => SM_SPECIALIST,
        "copywriter" => COPYWRITER,
        "designer" => DESIGNER,
        "motion_editor" => MOTION_EDITOR,
        _ => &[],
    }
}

pub fn can_perform(role: &str, capability: Capability) -> bool {
    capabilities_of(role).contains(&capability)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLES: [&str; 6] = [
        "admin",
        "manager",
        "sm_specialist",
        "copywriter",
        "designer",
        "motion_editor",
    ];

    // One row per (role, capability) pair of the authoritative table.
    const TABLE: &[(&str, Capability, bool)] = &[
        ("admin", CreatePost, true),
        ("admin", EditCaption, true),
        ("admin", UploadDesign, true),
        ("admin", UploadRef, true),
        ("admin", Approve, true),
        ("admin", Schedule, true),
        ("admin", ManageRules, true),
        ("manager", CreatePost, true),
        ("manager", EditCaption, true),
        ("manager", UploadDesign, false),
        ("manager", UploadRef, true),
        ("manager", Approve, true),
        ("manager", Schedule, false),
        ("manager", ManageRules, true),
        ("sm_specialist", CreatePost, false),
        ("sm_specialist", EditCaption, true),
        ("sm_specialist", UploadDesign, false),
        ("sm_specialist", UploadRef, false),
        ("sm_specialist", Approve, false),
        ("sm_specialist", Schedule, true),
        ("sm_specialist", ManageRules, false),
        ("copywriter", CreatePost, true),
        ("copywriter", EditCaption, true),
        ("copywriter", UploadDesign, false),
        ("copywriter", UploadRef, true),
        ("copywriter", Approve, false),
        ("copywriter", Schedule, false),
        ("copywriter", ManageRules, false),
        ("designer", CreatePost, false),
        ("designer", EditCaption, false),
        ("designer", UploadDesign, true),
        ("designer", UploadRef, false),
        ("designer", Approve, false),
        ("designer", Schedule, false),
        ("designer", ManageRules, false),
        ("motion_editor", CreatePost, false),
        ("motion_editor", EditCaption, false),
        ("motion_editor", UploadDesign, true),
        ("motion_editor", UploadRef, false),
        ("motion_editor", Approve, false),
        ("motion_editor", Schedule, false),
        ("motion_editor", ManageRules, false),
    ];

    #[test]
    fn table_matches_exactly() {
        for &(role, capability, expected) in TABLE {
            assert_eq!(
                can_perform(role, capability),
                expected,
                "{role} / {capability:?}"
            );
        }
    }

    #[test]
    fn unknown_role_has_no_capabilities() {
        assert!(capabilities_of("intern").is_empty());
        assert!(capabilities_of("").is_empty());
        assert!(!can_perform("Admin", CreatePost)); // case-sensitive, fail closed
    }

    #[test]
    fn only_admin_manages_team_and_clients() {
        for role in ROLES {
            assert_eq!(can_perform(role, ManageTeam), role == "admin");
            assert_eq!(can_perform(role, ManageClients), role == "admin");
        }
    }

    #[test]
    fn view_all_is_admin_and_manager() {
        for role in ROLES {
            assert_eq!(
                can_perform(role, ViewAll),
                matches!(role, "admin" | "manager")
            );
        }
    }
}
