use crate::errors::AppError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// A signed-in operator as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Tokens returned by a successful password sign-in.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until `access_token` expires.
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    pub user: AuthUser,
}

fn default_expires_in() -> u64 {
    3600
}

/// Client for the hosted auth provider (GoTrue REST dialect).
#[derive(Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AuthClient {
    /// Creates a new `AuthClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Project URL of the auth provider, without the `/auth/v1` suffix.
    /// * `api_key` - Public API key sent as the `apikey` header on every call.
    pub fn new(base_url: String, api_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| {
                AppError::AuthProviderError(format!("Failed to create auth client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Exchanges an email and password for a session.
    ///
    /// Rejected credentials come back as `Unauthorized` carrying the
    /// provider's own message, suitable for showing on the sign-in form.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AppError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        tracing::info!("Signing in {} via auth provider", email);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AppError::AuthProviderError(format!("Sign-in request failed: {}", e)))?;

        let status = response.status();
        if status.is_client_error() {
            let message = provider_message(response).await;
            tracing::warn!("Sign-in rejected for {}: {} {}", email, status, message);
            return Err(AppError::Unauthorized(message));
        }
        if !status.is_success() {
            let message = provider_message(response).await;
            return Err(AppError::AuthProviderError(format!(
                "Auth provider returned {}: {}",
                status, message
            )));
        }

        response.json().await.map_err(|e| {
            AppError::AuthProviderError(format!("Failed to parse sign-in response: {}", e))
        })
    }

    /// Looks up the user behind an access token.
    ///
    /// `Ok(None)` means the token is unknown, expired or revoked.
    pub async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>, AppError> {
        let url = format!("{}/auth/v1/user", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::AuthProviderError(format!("Session check failed: {}", e)))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => response.json().await.map(Some).map_err(|e| {
                AppError::AuthProviderError(format!("Failed to parse user response: {}", e))
            }),
            status => {
                let message = provider_message(response).await;
                Err(AppError::AuthProviderError(format!(
                    "Auth provider returned {}: {}",
                    status, message
                )))
            }
        }
    }

    /// Revokes the session behind an access token.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let url = format!("{}/auth/v1/logout", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::AuthProviderError(format!("Sign-out request failed: {}", e)))?;

        // An already-invalid token has nothing left to revoke
        if response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }

        let status = response.status();
        let message = provider_message(response).await;
        Err(AppError::AuthProviderError(format!(
            "Auth provider returned {}: {}",
            status, message
        )))
    }
}

/// Pulls a human-readable message out of an auth provider error body.
async fn provider_message(response: reqwest::Response) -> String {
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|body| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| body.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or(text)
}
