use actix_session::SessionExt;
use actix_web::{dev, FromRequest, HttpRequest};
use serde::Serialize;
use std::future::{ready, Ready};

use crate::helper::permission_helpers::{can_perform, Capability};

/// Actor identity resolved from the session cookie. Handlers pass the id and
/// role explicitly into the core calls; no core function ever reads the
/// session itself.
#[derive(Debug, Serialize, Clone)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub username: String,
    pub role: String,
}

impl AuthenticatedUser {
    pub fn can(&self, capability: Capability) -> bool {
        can_perform(&self.role, capability)
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let session = req.get_session();
        let id = session.get::<i64>("user_id").unwrap_or(None);
        let username = session.get::<String>("username").unwrap_or(None);
        let role = session.get::<String>("role").unwrap_or(None);

        match (id, username, role) {
            (Some(id), Some(username), Some(role)) => ready(Ok(AuthenticatedUser {
                id,
                username,
                role,
            })),
            _ => ready(Err(actix_web::error::ErrorUnauthorized("Not logged in."))),
        }
    }
}
