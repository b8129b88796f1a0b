use serde::Serialize;
use uuid::Uuid;

use crate::provider::{Role, UserIdentity};

/// Who is making the request, resolved once per request from its cookies.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccessContext {
    pub user: Option<UserIdentity>,
    /// `User` whenever the role is unknown
    pub role: Role,
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl AccessContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user.as_ref().map(|u| u.id)
    }
}
