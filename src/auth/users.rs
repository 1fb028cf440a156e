//! Managed-user administration through the authenticated transport.

use bon::Builder;
use serde::Serialize;

use super::error::AuthError;
use super::principal::Principal;
use super::transport::{expect_success, HttpSessionTransport};

/// Payload for creating a user with a local password.
///
/// ```
/// use portcullis::auth::NewUser;
///
/// let user = NewUser::builder()
///     .email("ops@example.com")
///     .password("correct horse")
///     .scopes(vec!["admin".to_string()])
///     .build();
/// assert!(user.is_active);
/// ```
#[derive(Clone, Builder, Serialize)]
pub struct NewUser {
    #[builder(into)]
    pub email: String,
    #[builder(into)]
    pub password: String,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[builder(default)]
    pub scopes: Vec<String>,
    #[builder(default = true)]
    pub is_active: bool,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("scopes", &self.scopes)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// Partial update; unset fields are left untouched by the backend.
#[derive(Clone, Default, Builder, Serialize)]
pub struct UserUpdate {
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl std::fmt::Debug for UserUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserUpdate")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("scopes", &self.scopes)
            .field("is_active", &self.is_active)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpSessionTransport {
    /// `GET /users?skip=&limit=`.
    pub async fn list_users(&self, skip: u32, limit: u32) -> Result<Vec<Principal>, AuthError> {
        let path = "/users";
        let request = self
            .client
            .get(self.endpoint(path))
            .query(&[("skip", skip), ("limit", limit)]);
        let response = self.dispatch(path, request, None).await?;
        Ok(expect_success(response).await?.json().await?)
    }

    pub async fn get_user(&self, id: i64) -> Result<Principal, AuthError> {
        let path = format!("/users/{id}");
        let response = self
            .dispatch(&path, self.client.get(self.endpoint(&path)), None)
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<Principal, AuthError> {
        let path = "/users";
        let request = self.client.post(self.endpoint(path)).json(user);
        let response = self.dispatch(path, request, None).await?;
        Ok(expect_success(response).await?.json().await?)
    }

    pub async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<Principal, AuthError> {
        let path = format!("/users/{id}");
        let request = self.client.put(self.endpoint(&path)).json(update);
        let response = self.dispatch(&path, request, None).await?;
        Ok(expect_success(response).await?.json().await?)
    }

    /// Delete a user, returning the removed record.
    pub async fn delete_user(&self, id: i64) -> Result<Principal, AuthError> {
        let path = format!("/users/{id}");
        let response = self
            .dispatch(&path, self.client.delete(self.endpoint(&path)), None)
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }
}
