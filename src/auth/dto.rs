use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use super::repo_types::{Preferences, User};

/// Request body for registration. Every field is optional: a bare `{}`
/// creates an anonymous account.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub user_id: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Response returned after login or register.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub user_id: String,
    pub email: Option<String>,
    pub preferences: Preferences,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_active: Option<OffsetDateTime>,
}

impl PublicUser {
    /// Short form used in auth responses.
    pub fn summary(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            preferences: user.preferences,
            created_at: None,
            last_active: None,
        }
    }

    pub fn full(user: User) -> Self {
        Self {
            created_at: Some(user.created_at),
            last_active: Some(user.last_active),
            ..Self::summary(user)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_register_body_is_valid() {
        let req: RegisterRequest = serde_json::from_str("{}").unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn short_password_and_bad_email_are_rejected() {
        let req: RegisterRequest =
            serde_json::from_str(r#"{"email":"nope","password":"123"}"#).unwrap();
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn summary_omits_timestamps() {
        let now = OffsetDateTime::now_utc();
        let user = User {
            user_id: "user_1".into(),
            email: Some("a@b.io".into()),
            password_hash: Some("secret".into()),
            created_at: now,
            last_active: now,
            preferences: Preferences::default(),
        };
        let json = serde_json::to_value(PublicUser::summary(user.clone())).unwrap();
        assert_eq!(json["userId"], "user_1");
        assert!(json.get("createdAt").is_none());
        assert!(json.get("passwordHash").is_none());

        let json = serde_json::to_value(PublicUser::full(user)).unwrap();
        assert!(json["createdAt"].is_string());
        assert!(json["lastActive"].is_string());
    }
}
