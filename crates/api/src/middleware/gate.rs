//! Authorization gate.
//!
//! Every request is classified by path before it reaches a handler:
//! - public prefixes are checked first and pass unconditionally
//! - privileged prefixes are checked next and require an exact role match
//! - everything else requires any authenticated caller
//!
//! Matching is case-insensitive prefix matching on the normalized path; the
//! first matching rule wins. `classify` and `authorize` are pure so the rules
//! can be tested without a router. The axum middleware wraps them and writes
//! one audit log line per decision.

use std::fmt;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use herald_common::config::{AppConfig, PrivilegedPrefix};
use herald_common::error::AppError;

use crate::middleware::auth::{Principal, principal_from_headers};
use crate::state::AppState;

/// User-facing message for role rejections.
pub const FORBIDDEN_MESSAGE: &str = "You do not have permission to access this resource";

const UNAUTHENTICATED_MESSAGE: &str =
    "Authentication required. Use 'Authorization: Bearer <JWT>'";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestClassification {
    Public,
    AuthenticatedAny,
    AuthenticatedRole(String),
}

impl fmt::Display for RequestClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestClassification::Public => write!(f, "public"),
            RequestClassification::AuthenticatedAny => write!(f, "authenticated"),
            RequestClassification::AuthenticatedRole(role) => write!(f, "role:{}", role),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    /// Unauthenticated caller on a default-bucket route with enforcement disabled.
    AllowUnauthenticated,
    Unauthenticated,
    Forbidden,
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow | GateDecision::AllowUnauthenticated)
    }

    fn outcome(&self) -> &'static str {
        match self {
            GateDecision::Allow => "allowed",
            GateDecision::AllowUnauthenticated => "allowed_unauthenticated",
            GateDecision::Unauthenticated => "rejected_unauthenticated",
            GateDecision::Forbidden => "rejected_forbidden",
        }
    }

    fn into_error(self) -> Option<AppError> {
        match self {
            GateDecision::Allow | GateDecision::AllowUnauthenticated => None,
            GateDecision::Unauthenticated => Some(AppError::Auth(UNAUTHENTICATED_MESSAGE.into())),
            GateDecision::Forbidden => Some(AppError::Forbidden(FORBIDDEN_MESSAGE.into())),
        }
    }
}

/// Ordered prefix rules, normalized once at construction.
#[derive(Debug, Clone)]
pub struct PrefixRules {
    public: Vec<String>,
    privileged: Vec<PrivilegedPrefix>,
    enforce_authenticated: bool,
}

impl PrefixRules {
    pub fn new(
        public: &[String],
        privileged: &[PrivilegedPrefix],
        enforce_authenticated: bool,
    ) -> Self {
        Self {
            public: public.iter().map(|p| normalize_path(p)).collect(),
            privileged: privileged
                .iter()
                .map(|rule| PrivilegedPrefix {
                    prefix: normalize_path(&rule.prefix),
                    role: rule.role.clone(),
                })
                .collect(),
            enforce_authenticated,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.public_prefixes,
            &config.privileged_prefixes,
            config.enforce_authenticated,
        )
    }

    /// Classify a request path.
    pub fn classify(&self, path: &str) -> RequestClassification {
        let path = normalize_path(path);

        if self.public.iter().any(|prefix| path.starts_with(prefix)) {
            return RequestClassification::Public;
        }

        if let Some(rule) = self
            .privileged
            .iter()
            .find(|rule| path.starts_with(&rule.prefix))
        {
            return RequestClassification::AuthenticatedRole(rule.role.clone());
        }

        RequestClassification::AuthenticatedAny
    }

    /// Decide whether `principal` may access `classification`.
    pub fn authorize(
        &self,
        classification: &RequestClassification,
        principal: &Principal,
    ) -> GateDecision {
        match classification {
            RequestClassification::Public => GateDecision::Allow,
            RequestClassification::AuthenticatedRole(role) => {
                if principal.has_role(role) {
                    GateDecision::Allow
                } else {
                    GateDecision::Forbidden
                }
            }
            RequestClassification::AuthenticatedAny => {
                if principal.is_authenticated() {
                    GateDecision::Allow
                } else if self.enforce_authenticated {
                    GateDecision::Unauthenticated
                } else {
                    GateDecision::AllowUnauthenticated
                }
            }
        }
    }
}

/// Lowercase, drop the query string, collapse repeated slashes, ensure a leading slash.
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let mut normalized = String::with_capacity(path.len() + 1);
    normalized.push('/');
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        normalized.push_str(&segment.to_lowercase());
    }
    if path.ends_with('/') && !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// Axum middleware applying the gate to every request.
pub async fn authorization_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let classification = state.gate.classify(&path);

    let principal = match classification {
        RequestClassification::Public => Principal::anonymous(),
        _ => principal_from_headers(request.headers(), &state.config.jwt_secret),
    };

    let decision = state.gate.authorize(&classification, &principal);

    match decision {
        GateDecision::Allow => tracing::info!(
            path = %path,
            subject = principal.subject.as_deref().unwrap_or("-"),
            role = principal.role.as_deref().unwrap_or("-"),
            classification = %classification,
            outcome = decision.outcome(),
            "Authorization decision"
        ),
        _ => tracing::warn!(
            path = %path,
            subject = principal.subject.as_deref().unwrap_or("-"),
            role = principal.role.as_deref().unwrap_or("-"),
            classification = %classification,
            outcome = decision.outcome(),
            "Authorization decision"
        ),
    }

    if let Some(error) = decision.into_error() {
        return error.into_response();
    }

    request.extensions_mut().insert(principal);
    next.run(request).await
}
