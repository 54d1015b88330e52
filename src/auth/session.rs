use async_trait::async_trait;
use uuid::Uuid;

use super::Claims;

/// The caller behind a validated token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl Session {
    pub fn from_claims(claims: &Claims) -> Result<Self, &'static str> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;

        Ok(Self {
            user_id,
            email: claims.email.clone(),
            role: claims.role.clone(),
        })
    }
}

/// Token validation capability injected into the application state.
///
/// Returns `None` for any token that does not resolve to a session.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Option<Session>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str) -> Claims {
        Claims {
            sub: sub.into(),
            aud: "authenticated".into(),
            iss: "https://example.supabase.co/auth/v1".into(),
            iat: 0,
            exp: 0,
            email: Some("bauherr@example.de".into()),
            role: Some("authenticated".into()),
        }
    }

    #[test]
    fn session_from_claims() {
        let id = Uuid::new_v4();
        let session = Session::from_claims(&claims(&id.to_string())).unwrap();
        assert_eq!(session.user_id, id);
        assert_eq!(session.email.as_deref(), Some("bauherr@example.de"));
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        assert!(Session::from_claims(&claims("service-account")).is_err());
    }
}
