//! The network seam.
//!
//! The client never performs I/O itself. It hands signed `HttpRequest`s to a
//! `Transport` and gets back an `HttpResponse` for any status code, including
//! 4xx and 5xx. A transport error means no response was received at all.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Minimal blocking HTTP capability.
///
/// `url` already includes the signed query string and must be sent as is.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, ApiError>;

    fn post(
        &self,
        url: &str,
        body: &str,
        headers: &[(String, String)],
    ) -> Result<HttpResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, ApiError> {
        (**self).get(url, headers)
    }

    fn post(
        &self,
        url: &str,
        body: &str,
        headers: &[(String, String)],
    ) -> Result<HttpResponse, ApiError> {
        (**self).post(url, body, headers)
    }
}

/// Send `request` through the matching transport method.
pub fn send(transport: &dyn Transport, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
    match request.method {
        HttpMethod::Get => transport.get(&request.url, &request.headers),
        HttpMethod::Post => transport.post(
            &request.url,
            request.body.as_deref().unwrap_or_default(),
            &request.headers,
        ),
    }
}

/// Blocking transport on `ureq`.
///
/// Status codes are returned as data rather than errors so the deserializer
/// can read the API's error bodies.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, ApiError> {
        let mut request = self.agent.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.call()?;
        into_response(response)
    }

    fn post(
        &self,
        url: &str,
        body: &str,
        headers: &[(String, String)],
    ) -> Result<HttpResponse, ApiError> {
        let mut request = self.agent.post(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send(body.as_bytes())?;
        into_response(response)
    }
}

fn into_response(mut response: ureq::http::Response<ureq::Body>) -> Result<HttpResponse, ApiError> {
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let body = response.body_mut().read_to_vec()?;
    debug!(status, bytes = body.len(), "received response");
    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}
