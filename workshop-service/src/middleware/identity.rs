use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use service_core::error::AppError;
use uuid::Uuid;

use crate::audit::{Actor, RequestContext};

pub const ACTOR_ID_HEADER: &str = "x-user-id";
pub const ACTOR_ROLE_HEADER: &str = "x-user-role";
pub const ACTOR_NAME_HEADER: &str = "x-user-name";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Actor extractor
///
/// Identity is forwarded by the trusted front layer; authentication happens
/// there. A request without identity headers acts as the `system` admin.
#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = actor_from_headers(&parts.headers)?;

        if let Some(id) = actor.id {
            tracing::Span::current().record("user_id", tracing::field::display(id));
        }

        Ok(actor)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(context_from_headers(&parts.headers))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AppError> {
    let system = Actor::system();

    let id = header_str(headers, ACTOR_ID_HEADER)
        .map(|raw| {
            Uuid::parse_str(raw).map_err(|_| {
                AppError::BadRequest(anyhow::anyhow!("Invalid X-User-ID header: {}", raw))
            })
        })
        .transpose()?;

    Ok(Actor {
        id,
        role: header_str(headers, ACTOR_ROLE_HEADER)
            .map(str::to_string)
            .unwrap_or(system.role),
        name: header_str(headers, ACTOR_NAME_HEADER)
            .map(str::to_string)
            .unwrap_or(system.name),
    })
}

/// Client IP is the first hop of `X-Forwarded-For`.
pub fn context_from_headers(headers: &HeaderMap) -> RequestContext {
    RequestContext {
        ip_address: header_str(headers, FORWARDED_FOR_HEADER)
            .and_then(|v| v.split(',').next())
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty()),
        user_agent: header_str(headers, header::USER_AGENT.as_str()).map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_defaults_to_system_actor() {
        let actor = actor_from_headers(&HeaderMap::new()).unwrap();
        assert_eq!(actor, Actor::system());
    }

    #[test]
    fn test_reads_forwarded_identity() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        headers.insert(ACTOR_ROLE_HEADER, HeaderValue::from_static("employee"));
        headers.insert(ACTOR_NAME_HEADER, HeaderValue::from_static("Marc"));

        let actor = actor_from_headers(&headers).unwrap();
        assert_eq!(actor.id, Some(id));
        assert_eq!(actor.role, "employee");
        assert_eq!(actor.name, "Marc");
    }

    #[test]
    fn test_rejects_malformed_user_id() {
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(actor_from_headers(&headers), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_first_forwarded_hop_and_user_agent() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("atelier-ui/1.0"));

        let ctx = context_from_headers(&headers);
        assert_eq!(ctx.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(ctx.user_agent.as_deref(), Some("atelier-ui/1.0"));
    }
}
