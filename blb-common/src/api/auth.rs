//! Actor attribution for mutating admin requests
//!
//! Session-cookie and OAuth verification happen upstream. The upstream layer
//! forwards the verified identity in [`ACTOR_HEADER`]; this module checks it
//! against an injected allow-list and produces the [`Actor`] recorded in the
//! audit log.
//!
//! An empty allow-list disables checking entirely. Requests without the
//! header are then attributed to [`Actor::anonymous`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Header carrying the identity verified by the upstream auth layer
pub const ACTOR_HEADER: &str = "x-admin-actor";

/// Identity attached to every mutating call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor(pub String);

impl Actor {
    pub fn anonymous() -> Self {
        Actor("anonymous".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authentication error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorAuthError {
    /// Header absent while an allow-list is configured
    MissingActor,

    /// Identity not on the allow-list
    Forbidden(String),
}

impl std::fmt::Display for ActorAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorAuthError::MissingActor => write!(f, "Missing {} header", ACTOR_HEADER),
            ActorAuthError::Forbidden(actor) => write!(f, "Actor not permitted: {}", actor),
        }
    }
}

impl std::error::Error for ActorAuthError {}

/// Identities permitted to call admin endpoints
///
/// Matching is case-insensitive on the trimmed identity.
#[derive(Debug, Clone, Default)]
pub struct AllowedActors {
    actors: HashSet<String>,
}

impl AllowedActors {
    pub fn new<I, S>(actors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            actors: actors
                .into_iter()
                .map(|a| a.as_ref().trim().to_lowercase())
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }

    /// True when no allow-list is configured (checking disabled)
    pub fn is_disabled(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Validate the forwarded identity and produce the audit actor
    pub fn authorize(&self, header_value: Option<&str>) -> Result<Actor, ActorAuthError> {
        let claimed = header_value.map(str::trim).filter(|v| !v.is_empty());

        if self.is_disabled() {
            return Ok(claimed.map(|v| Actor(v.to_string())).unwrap_or_else(Actor::anonymous));
        }

        let claimed = claimed.ok_or(ActorAuthError::MissingActor)?;
        if self.actors.contains(&claimed.to_lowercase()) {
            Ok(Actor(claimed.to_string()))
        } else {
            Err(ActorAuthError::Forbidden(claimed.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_list_accepts_anyone() {
        let allowed = AllowedActors::default();
        assert!(allowed.is_disabled());
        assert_eq!(allowed.authorize(None).unwrap(), Actor::anonymous());
        assert_eq!(
            allowed.authorize(Some("clerk@lb.gov.ph")).unwrap(),
            Actor("clerk@lb.gov.ph".to_string())
        );
    }

    #[test]
    fn test_configured_list_requires_header() {
        let allowed = AllowedActors::new(["Clerk@LB.gov.ph"]);
        assert_eq!(allowed.authorize(None), Err(ActorAuthError::MissingActor));
        assert_eq!(allowed.authorize(Some("  ")), Err(ActorAuthError::MissingActor));
    }

    #[test]
    fn test_configured_list_matches_case_insensitively() {
        let allowed = AllowedActors::new(["Clerk@LB.gov.ph"]);
        assert_eq!(
            allowed.authorize(Some("clerk@lb.gov.ph")).unwrap().as_str(),
            "clerk@lb.gov.ph"
        );
        assert_eq!(
            allowed.authorize(Some("intruder@example.com")),
            Err(ActorAuthError::Forbidden("intruder@example.com".to_string()))
        );
    }
}
