use serde::{Deserialize, Serialize};
use shelf_http::error::AppError;
use uuid::Uuid;

/// Stored user record, including the password hash. Never serialized.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
}

/// User shape safe to serve to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
}

impl From<UserRecord> for PublicUser {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

/// Request body shared by registration and login.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CredentialsRequest {
    /// Both fields are required and must be non-empty.
    pub fn validate(self) -> Result<(String, String), AppError> {
        let username = self
            .username
            .as_deref()
            .map(str::trim)
            .filter(|username| !username.is_empty());
        let password = self.password.filter(|password| !password.is_empty());

        match (username, password) {
            (Some(username), Some(password)) => Ok((username.to_string(), password)),
            _ => Err(AppError::validation(
                vec![],
                "username and password are required",
            )),
        }
    }
}

/// Successful registration response.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub msg: String,
    pub user: PublicUser,
}

/// Successful login response.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_require_both_fields() {
        let request = CredentialsRequest {
            username: Some("frank".to_string()),
            password: None,
        };
        assert!(request.validate().is_err());

        let request = CredentialsRequest {
            username: None,
            password: Some("secret".to_string()),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn credentials_reject_blank_username() {
        let request = CredentialsRequest {
            username: Some("   ".to_string()),
            password: Some("secret".to_string()),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn credentials_trim_the_username() {
        let request = CredentialsRequest {
            username: Some(" frank ".to_string()),
            password: Some("secret".to_string()),
        };
        let (username, password) = request.validate().unwrap();
        assert_eq!(username, "frank");
        assert_eq!(password, "secret");
    }
}
