//! Typed HTTP client for the register API.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use super::{ClientError, Session};
use crate::api::auth::TokenResponse;
use crate::domain::aggregates::{BusinessSettings, Order, Product, User};
use crate::domain::checkout::RequestedLine;
use crate::domain::reporting::{DashboardStats, Granularity, SalesReport};
use crate::infra::ProductFilter;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Prefer the server's `message`, fall back to the raw body.
async fn failure(response: Response) -> ClientError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text).map(|b| b.message).unwrap_or(text);
    tracing::debug!(status = status.as_u16(), %message, "request failed");
    ClientError::from_status(status, message)
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String { format!("{}{}", self.base_url, path) }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() { return Err(failure(response).await); }
        response.json().await.map_err(|e| ClientError::Api { status: status.as_u16(), message: e.to_string() })
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ClientError> {
        let response = request.send().await?;
        if !response.status().is_success() { return Err(failure(response).await); }
        Ok(())
    }

    pub async fn health(&self) -> bool {
        self.http.get(self.url("/health")).send().await.is_ok_and(|r| r.status().is_success())
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Sign in and fetch the profile. A refused login is `Validation`, not
    /// `Unauthorized`: there was no session to lose.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let form = [("username", email), ("password", password)];
        let token: TokenResponse = match self.send(self.http.post(self.url("/api/auth/login")).form(&form)).await {
            Err(ClientError::Unauthorized) => return Err(ClientError::Validation("Incorrect email or password".to_string())),
            other => other?,
        };
        let user: User = self.send(self.http.get(self.url("/api/auth/me")).bearer_auth(&token.access_token)).await?;
        Ok(Session::new(token.access_token, user))
    }

    pub async fn logout(&self, session: &Session) -> Result<(), ClientError> {
        self.send_empty(self.http.post(self.url("/api/auth/logout")).bearer_auth(session.token())).await
    }

    // =========================================================================
    // Catalog & settings
    // =========================================================================

    pub async fn products(&self, session: &Session, filter: &ProductFilter) -> Result<Vec<Product>, ClientError> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(term) = filter.search_term() { query.push(("search", term)); }
        if let Some(category) = filter.category() { query.push(("category", category)); }
        self.send(self.http.get(self.url("/api/products")).query(&query).bearer_auth(session.token())).await
    }

    pub async fn settings(&self, session: &Session) -> Result<BusinessSettings, ClientError> {
        self.send(self.http.get(self.url("/api/settings")).bearer_auth(session.token())).await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    pub async fn create_order(
        &self,
        session: &Session,
        items: &[RequestedLine],
        payment_method: &str,
    ) -> Result<Order, ClientError> {
        let body = serde_json::json!({ "items": items, "payment_method": payment_method });
        self.send(self.http.post(self.url("/api/orders")).json(&body).bearer_auth(session.token())).await
    }

    pub async fn cancel_order(&self, session: &Session, order_id: Uuid) -> Result<Order, ClientError> {
        self.send(self.http.post(self.url(&format!("/api/orders/{order_id}/cancel"))).bearer_auth(session.token())).await
    }

    // =========================================================================
    // Reports
    // =========================================================================

    pub async fn sales_report(
        &self,
        session: &Session,
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
    ) -> Result<SalesReport, ClientError> {
        if start > end {
            return Err(ClientError::Validation("The start date must not be after the end date".to_string()));
        }
        let query = [
            ("start_date", start.to_string()),
            ("end_date", end.to_string()),
            ("granularity", granularity.as_str().to_string()),
        ];
        self.send(self.http.get(self.url("/api/reports/sales")).query(&query).bearer_auth(session.token())).await
    }

    pub async fn dashboard(&self, session: &Session) -> Result<DashboardStats, ClientError> {
        self.send(self.http.get(self.url("/api/dashboard/stats")).bearer_auth(session.token())).await
    }
}
