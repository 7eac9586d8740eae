use reqwest::RequestBuilder;

use crate::auth::Session;

/// Per-call authentication context.
///
/// Built from the session holder when the call is made, so a logout
/// between two calls is always observed by the second one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    bearer: Option<String>,
}

impl RequestContext {
    /// Context for unauthenticated calls
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_session(session: Option<&Session>) -> Self {
        Self {
            bearer: session.map(|s| s.token.clone()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.bearer.is_some()
    }

    /// Value of the Authorization header, if any
    pub fn authorization(&self) -> Option<String> {
        self.bearer.as_ref().map(|t| format!("Bearer {}", t))
    }

    pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self.bearer {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }
}
