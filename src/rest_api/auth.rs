//! Bearer-token authentication for the site-manager endpoints
//!
//! Tokens are checked with a Kubernetes TokenReview and must belong to the
//! configured site-manager service account.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use k8s_openapi::api::authentication::v1::{TokenReview, TokenReviewSpec};
use kube::api::{Api, PostParams};
use kube::Client;
use tracing::{debug, warn};

use crate::config::AuthConfig;

/// Result of checking a request's credentials
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed,
    /// Rejected; `token_sent` is false when no usable token was presented
    Denied { token_sent: bool },
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn check(&self, headers: &HeaderMap) -> AuthDecision;
}

/// Lets every request through
pub struct NoAuth;

#[async_trait]
impl Authenticator for NoAuth {
    async fn check(&self, _headers: &HeaderMap) -> AuthDecision {
        AuthDecision::Allowed
    }
}

pub struct TokenReviewAuthenticator {
    client: Client,
    config: AuthConfig,
}

impl TokenReviewAuthenticator {
    pub fn new(client: Client, config: AuthConfig) -> Self {
        Self { client, config }
    }

    async fn review(&self, token: &str) -> kube::Result<TokenReview> {
        let api: Api<TokenReview> = Api::all(self.client.clone());
        let review = TokenReview {
            spec: TokenReviewSpec {
                token: Some(token.to_string()),
                audiences: self.config.custom_audience.clone().map(|a| vec![a]),
            },
            ..Default::default()
        };
        api.create(&PostParams::default(), &review).await
    }
}

#[async_trait]
impl Authenticator for TokenReviewAuthenticator {
    async fn check(&self, headers: &HeaderMap) -> AuthDecision {
        if !self.config.enabled {
            return AuthDecision::Allowed;
        }
        let Some(token) = extract_token(headers) else {
            return AuthDecision::Denied { token_sent: false };
        };

        let review = match self.review(&token).await {
            Ok(review) => review,
            Err(e) => {
                warn!(error = %e, "Can not create Kubernetes token review");
                return AuthDecision::Denied { token_sent: true };
            }
        };
        let status = review.status.unwrap_or_default();
        if status.authenticated != Some(true) {
            warn!("Unauthorized access");
            return AuthDecision::Denied { token_sent: true };
        }

        let username = status.user.and_then(|u| u.username).unwrap_or_default();
        if username == self.config.expected_username() {
            debug!(%username, "Token accepted");
            AuthDecision::Allowed
        } else {
            warn!(%username, "Service account name or namespace of given token is not allowed");
            AuthDecision::Denied { token_sent: true }
        }
    }
}

/// Token from `Authorization: <scheme> <token>`
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        [_, token] if !token.is_empty() => Some(token.to_string()),
        _ => None,
    }
}
