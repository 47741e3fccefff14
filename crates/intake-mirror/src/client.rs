//! Blocking HTTP client for the external record store.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::debug;

use crate::wire::{ExternalOrder, ExternalOrderPayload};
use crate::{ExternalStore, MirrorError, MirrorResult};

/// HTTP implementation of [`ExternalStore`].
///
/// Every call is a single bounded round trip. There is no retry or backoff
/// here; callers treat a timeout as an ordinary failure.
pub struct HttpExternalStore {
    base_url: String,
    http: Client,
}

impl HttpExternalStore {
    /// Build a client against `base_url` with a hard request timeout.
    pub fn new(base_url: &str, timeout_secs: u64) -> MirrorResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn records_url(&self) -> String {
        format!("{}/records", self.base_url)
    }
}

impl ExternalStore for HttpExternalStore {
    fn find_by_shared_key(&self, shared_key: &str) -> MirrorResult<Option<ExternalOrder>> {
        debug!(shared_key, "external store lookup");

        let resp = self
            .http
            .get(self.records_url())
            .query(&[("clave", shared_key)])
            .send()?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let mut records: Vec<ExternalOrder> = resp.json()?;
                if records.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(records.remove(0)))
                }
            }
            status => Err(MirrorError::Status {
                code: status.as_u16(),
            }),
        }
    }

    fn create(&self, payload: &ExternalOrderPayload) -> MirrorResult<ExternalOrder> {
        debug!(shared_key = ?payload.clave, "external store create");

        let resp = self.http.post(self.records_url()).json(payload).send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MirrorError::Status {
                code: status.as_u16(),
            });
        }

        Ok(resp.json()?)
    }

    fn update_by_internal_id(
        &self,
        internal_id: &str,
        payload: &ExternalOrderPayload,
    ) -> MirrorResult<()> {
        debug!(internal_id, "external store update");

        let url = format!("{}/{}", self.records_url(), internal_id);
        let resp = self.http.put(url).json(payload).send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MirrorError::Status {
                code: status.as_u16(),
            });
        }

        Ok(())
    }
}
