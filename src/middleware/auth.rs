use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::models::user::{Actor, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
    #[serde(default, rename = "collegeId", alias = "college_id")]
    pub college_id: Option<String>,
}

impl Claims {
    pub fn into_actor(self) -> Result<Actor, Error> {
        let id = Uuid::parse_str(&self.sub)
            .map_err(|_| Error::Unauthorized("Token subject is not a valid id".to_string()))?;
        let role = self
            .role
            .as_deref()
            .ok_or_else(|| Error::Unauthorized("Token carries no role".to_string()))?
            .parse::<Role>()
            .map_err(Error::Unauthorized)?;
        let college_id = match self.college_id.as_deref() {
            Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| {
                Error::Unauthorized("Token college is not a valid id".to_string())
            })?),
            None => None,
        };
        Ok(Actor {
            id,
            role,
            college_id,
        })
    }
}

/// Per-router auth settings: signing secret plus the roles let through.
#[derive(Clone)]
pub struct RoleGate {
    secret: Arc<str>,
    allowed: &'static [Role],
}

impl RoleGate {
    pub fn new(secret: &str, allowed: &'static [Role]) -> Self {
        Self {
            secret: Arc::from(secret),
            allowed,
        }
    }
}

fn bearer_actor(req: &Request, secret: &str) -> Result<Actor, Error> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("Missing authorization header".to_string()))?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| Error::Unauthorized("Malformed authorization header".to_string()))?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::Unauthorized("Unsupported authorization scheme".to_string()))?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| Error::Unauthorized("Invalid or expired token".to_string()))?;
    data.claims.into_actor()
}

/// Decodes the bearer token into an [`Actor`] request extension and
/// rejects roles outside the gate.
pub async fn require_roles(State(gate): State<RoleGate>, mut req: Request, next: Next) -> Response {
    let actor = match bearer_actor(&req, &gate.secret) {
        Ok(actor) => actor,
        Err(e) => return e.into_response(),
    };
    if !gate.allowed.is_empty() && !gate.allowed.contains(&actor.role) {
        tracing::debug!(actor_id = %actor.id, role = actor.role.as_str(), "role not allowed");
        return Error::Forbidden(format!("Role {} may not access this resource", actor.role.as_str()))
            .into_response();
    }
    req.extensions_mut().insert(actor);
    next.run(req).await
}
