//! Provider profile claims

use serde::{Deserialize, Serialize};

/// Identity claims resolved from the provider, either out of a verified
/// ID token or from the userinfo endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    /// OIDC subject
    #[serde(default)]
    pub sub: Option<String>,
    /// Legacy identifier some providers return instead of `sub`
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl UserProfile {
    /// Stable identifier for the user: `sub`, falling back to `id`.
    pub fn subject(&self) -> Option<String> {
        self.sub.clone().or_else(|| self.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_falls_back_to_id() {
        let profile = UserProfile {
            id: Some("42".to_string()),
            ..Default::default()
        };
        assert_eq!(profile.subject().as_deref(), Some("42"));
    }

    #[test]
    fn subject_is_none_when_both_missing() {
        assert!(UserProfile::default().subject().is_none());
    }

    #[test]
    fn deserializes_userinfo_payload() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"sub":"123","email":"a@b.com","name":"A"}"#).unwrap();
        assert_eq!(profile.subject().as_deref(), Some("123"));
        assert_eq!(profile.email.as_deref(), Some("a@b.com"));
        assert!(profile.picture.is_none());
    }
}
