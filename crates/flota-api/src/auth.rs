//! # Caller Context & Role Gating
//!
//! Callers identify themselves with request headers; authentication proper
//! happens in front of this service.
//!
//! ```text
//! X-Tenant-Id:    emt                 required
//! X-Actor-Id:     tec-07              required
//! X-Actor-Role:   tecnico             required
//! X-Actor-Email:  tec07@example.org   optional, copied onto audit entries
//! X-Operation-Id: 4f1c…               optional idempotency key
//! If-Match:       "3"                 optional expected entity version
//! ```
//!
//! [`caller_middleware`] parses them into a [`CallerIdentity`] stored in the
//! request extensions; handlers take it as an extractor and call
//! [`CallerIdentity::require`] before touching the engine. The engine itself
//! never looks at roles.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use flota_core::{Actor, ActorId, OperationId, TenantId};
use flota_engine::OperationContext;
use flota_state::{Operation, Role};

use crate::error::AppError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ACTOR_HEADER: &str = "x-actor-id";
pub const ROLE_HEADER: &str = "x-actor-role";
pub const EMAIL_HEADER: &str = "x-actor-email";
pub const OPERATION_HEADER: &str = "x-operation-id";

/// Who is calling, as a role-bearing engine context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub role: Role,
    pub context: OperationContext,
}

impl CallerIdentity {
    /// Parse the caller headers.
    ///
    /// Missing or malformed identity headers are [`AppError::Unauthorized`];
    /// a malformed `If-Match` is [`AppError::BadRequest`].
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let tenant = required(headers, TENANT_HEADER)?;
        let actor = required(headers, ACTOR_HEADER)?;
        let role = required(headers, ROLE_HEADER)?;

        let tenant = TenantId::new(tenant)
            .map_err(|e| AppError::Unauthorized(format!("{TENANT_HEADER}: {e}")))?;
        let actor = ActorId::new(actor)
            .map_err(|e| AppError::Unauthorized(format!("{ACTOR_HEADER}: {e}")))?;
        let role: Role = role
            .parse()
            .map_err(|e| AppError::Unauthorized(format!("{ROLE_HEADER}: {e}")))?;

        let mut context = OperationContext::new(tenant, Actor::new(actor));
        if let Some(email) = optional(headers, EMAIL_HEADER) {
            context = context.with_email(email);
        }
        if let Some(op) = optional(headers, OPERATION_HEADER) {
            let op = OperationId::new(op)
                .map_err(|e| AppError::BadRequest(format!("{OPERATION_HEADER}: {e}")))?;
            context = context.with_operation(op);
        }
        if let Some(raw) = optional(headers, header::IF_MATCH.as_str()) {
            context = context.expecting(parse_version(raw)?);
        }
        Ok(Self { role, context })
    }

    pub fn tenant(&self) -> &TenantId {
        &self.context.tenant
    }

    /// Fail with 403 unless the caller's role permits `operation`.
    pub fn require(&self, operation: Operation) -> Result<&OperationContext, AppError> {
        if self.role.permits(operation) {
            Ok(&self.context)
        } else {
            tracing::warn!(
                role = %self.role,
                operation = %operation,
                tenant = %self.context.tenant,
                "operation denied by role"
            );
            Err(AppError::Forbidden(format!(
                "role '{}' may not {}",
                self.role.as_str(),
                operation.as_str()
            )))
        }
    }
}

fn required<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    optional(headers, name).ok_or_else(|| AppError::Unauthorized(format!("missing {name} header")))
}

fn optional<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Accept `3`, `"3"` and `W/"3"`.
fn parse_version(raw: &str) -> Result<u64, AppError> {
    raw.trim_start_matches("W/")
        .trim_matches('"')
        .parse()
        .map_err(|_| {
            AppError::BadRequest(format!("If-Match must be an entity version, got {raw:?}"))
        })
}

/// Parse caller headers and inject the [`CallerIdentity`], or answer 401.
pub async fn caller_middleware(mut request: Request, next: Next) -> Response {
    match CallerIdentity::from_headers(request.headers()) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(error = %err, "rejected caller headers");
            err.into_response()
        }
    }
}

impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            (TENANT_HEADER, "emt"),
            (ACTOR_HEADER, "tec-07"),
            (ROLE_HEADER, "tecnico"),
        ]
    }

    #[test]
    fn parses_full_context() {
        let mut pairs = base();
        pairs.push((EMAIL_HEADER, "tec07@example.org"));
        pairs.push((OPERATION_HEADER, "op-1"));
        pairs.push(("if-match", "W/\"3\""));
        let caller = CallerIdentity::from_headers(&headers(&pairs)).unwrap();
        assert_eq!(caller.role, Role::Tecnico);
        assert_eq!(caller.tenant().as_str(), "emt");
        assert_eq!(caller.context.expected_version, Some(3));
        assert_eq!(caller.context.operation_id.unwrap().as_str(), "op-1");
        assert_eq!(caller.context.actor.email.as_deref(), Some("tec07@example.org"));
    }

    #[test]
    fn missing_role_is_unauthorized() {
        let map = headers(&[(TENANT_HEADER, "emt"), (ACTOR_HEADER, "ana")]);
        assert!(matches!(
            CallerIdentity::from_headers(&map),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn unknown_role_is_unauthorized() {
        let mut pairs = base();
        pairs[2] = (ROLE_HEADER, "chofer");
        assert!(matches!(
            CallerIdentity::from_headers(&headers(&pairs)),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn bad_if_match_is_bad_request() {
        let mut pairs = base();
        pairs.push(("if-match", "*"));
        assert!(matches!(
            CallerIdentity::from_headers(&headers(&pairs)),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn require_checks_role_table() {
        let caller = CallerIdentity::from_headers(&headers(&base())).unwrap();
        assert!(caller.require(Operation::CompleteWorkOrder).is_ok());
        assert!(matches!(
            caller.require(Operation::ValidateWorkOrder),
            Err(AppError::Forbidden(_))
        ));
    }
}
