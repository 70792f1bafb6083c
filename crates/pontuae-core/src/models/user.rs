use serde::{Deserialize, Serialize};

use crate::api::ValidationError;
use crate::auth::CredentialPair;

/// Minimum password length accepted at registration and password change.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Who the user is, as far as the client knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// Partial identity change applied after a profile edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn merge(&mut self, update: IdentityUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
    }
}

/// `GET /user` response. Tokens are only present when the server rotated them.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tokens: Option<CredentialPair>,
}

/// `PUT /user` body.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
}

impl ProfileUpdate {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.email.is_empty() {
            return Err(ValidationError::EmptyEmail);
        }
        Ok(())
    }
}

/// `PUT /user/change-password` input. `confirm` never leaves the client.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub password: String,
    pub new_password: String,
    #[serde(skip)]
    pub confirm: String,
}

impl PasswordChange {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.password.is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        if self.new_password.is_empty() {
            return Err(ValidationError::EmptyNewPassword);
        }
        if self.new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LENGTH,
            });
        }
        if self.new_password != self.confirm {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(())
    }
}

/// Checks run on the registration form before anything is sent.
pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
    confirm: &str,
) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if email.trim().is_empty() {
        return Err(ValidationError::EmptyEmail);
    }
    if password != confirm {
        return Err(ValidationError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_merge_keeps_unset_fields() {
        let mut identity = Identity {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
        };
        identity.merge(IdentityUpdate {
            name: Some("Ana Maria".to_string()),
            email: None,
        });
        assert_eq!(identity.name, "Ana Maria");
        assert_eq!(identity.email, "ana@example.com");
    }

    #[test]
    fn test_profile_parses_optional_tokens() {
        let plain: Profile = serde_json::from_str(r#"{"name":"Ana"}"#).unwrap();
        assert!(plain.tokens.is_none());

        let rotated: Profile = serde_json::from_str(
            r#"{"name":"Ana","tokens":{"accessToken":"A9","refreshToken":"R9"}}"#,
        )
        .unwrap();
        assert_eq!(rotated.tokens, Some(CredentialPair::new("A9", "R9")));
    }

    #[test]
    fn test_password_change_validation() {
        let change = |current: &str, new: &str, confirm: &str| PasswordChange {
            password: current.to_string(),
            new_password: new.to_string(),
            confirm: confirm.to_string(),
        };
        assert_eq!(
            change("", "secret2", "secret2").validate(),
            Err(ValidationError::EmptyPassword)
        );
        assert_eq!(
            change("secret1", "abc", "abc").validate(),
            Err(ValidationError::PasswordTooShort { min: 6 })
        );
        assert_eq!(
            change("secret1", "secret2", "secret3").validate(),
            Err(ValidationError::PasswordMismatch)
        );
        assert!(change("secret1", "secret2", "secret2").validate().is_ok());
    }

    #[test]
    fn test_password_change_body_omits_confirm() {
        let change = PasswordChange {
            password: "old".to_string(),
            new_password: "newpass".to_string(),
            confirm: "newpass".to_string(),
        };
        let body = serde_json::to_value(&change).unwrap();
        assert_eq!(body, serde_json::json!({"password": "old", "newPassword": "newpass"}));
    }

    #[test]
    fn test_validate_registration() {
        assert_eq!(
            validate_registration("Ana", "ana@example.com", "secret1", "secret2"),
            Err(ValidationError::PasswordMismatch)
        );
        assert_eq!(
            validate_registration("  ", "ana@example.com", "secret1", "secret1"),
            Err(ValidationError::EmptyName)
        );
        assert!(validate_registration("Ana", "ana@example.com", "secret1", "secret1").is_ok());
    }

    #[test]
    fn test_profile_update_requires_fields() {
        assert_eq!(
            ProfileUpdate::new("Ana", " ").validate(),
            Err(ValidationError::EmptyEmail)
        );
        assert!(ProfileUpdate::new("Ana", "ana@example.com").validate().is_ok());
    }
}
