use storekeep_auth::Session;

/// Session context for a request.
///
/// Inserted by the session middleware for every route; anonymous when no
/// (valid, unexpired) session token accompanied the request.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    session: Option<Session>,
}

impl SessionContext {
    pub fn authenticated(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn anonymous() -> Self {
        Self { session: None }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
}
