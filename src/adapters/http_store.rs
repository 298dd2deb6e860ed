use crate::domain::model::{ClassDefinition, NewReservation, Reservation};
use crate::domain::ports::{ReservationStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Primary store reached over the reservation REST API.
pub struct HttpReservationStore {
    base_url: String,
    client: Client,
    timeout: Option<Duration>,
}

impl HttpReservationStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            timeout: None,
        }
    }

    /// Per-request timeout applied by the HTTP client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, response: reqwest::Response) -> StoreResult<T> {
        let status = response.status();
        tracing::debug!("Store response status: {}", status);

        if !status.is_success() {
            return Err(StoreError::Unavailable(format!(
                "unexpected status {} from {}",
                status,
                response.url()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(format!("invalid response body: {}", e)))
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl ReservationStore for HttpReservationStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn list_classes(&self) -> StoreResult<Vec<ClassDefinition>> {
        let url = self.url("classes");
        tracing::debug!("Making API request to: {}", url);

        let response = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(transport)?;
        self.read_json(response).await
    }

    async fn list_reservations(
        &self,
        subject_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Reservation>> {
        let url = self.url("reservations");
        let date = date.format("%Y-%m-%d").to_string();
        tracing::debug!("Making API request to: {} (subject {}, {})", url, subject_id, date);

        let response = self
            .request(
                self.client
                    .get(&url)
                    .query(&[("subjectId", subject_id), ("date", date.as_str())]),
            )
            .send()
            .await
            .map_err(transport)?;
        self.read_json(response).await
    }

    async fn create_reservation(&self, candidate: NewReservation) -> StoreResult<Reservation> {
        let url = self.url("reservations");
        tracing::debug!("Submitting reservation to: {}", url);

        let response = self
            .request(self.client.post(&url).json(&candidate))
            .send()
            .await
            .map_err(transport)?;

        if response.status() == StatusCode::CONFLICT {
            let detail = response.text().await.unwrap_or_default();
            return Err(StoreError::Conflict(if detail.is_empty() {
                "reservation conflicts with an existing one".to_string()
            } else {
                detail
            }));
        }
        self.read_json(response).await
    }
}
