//! Request authentication.
//!
//! # Design
//! The client prepares an `UnsignedRequest` (endpoint URL, query parameters,
//! optional JSON body) and an `Authenticator` turns it into a sendable
//! `HttpRequest`. The default `RequestSigner` implements `hc_hmac_v1`:
//!
//! 1. add `AuthKey`, `AuthProto` and `AuthTimestamp` to the query,
//! 2. encode the query once (sorted keys, form-urlencoded),
//! 3. HMAC-SHA1 over `METHOD\nPATH\nQUERY\nBODY` keyed by the secret,
//! 4. send the lowercase hex digest as `X-Auth-Signature`.
//!
//! The encoded query string is used both for signing and in the final URL, so
//! the server sees exactly the bytes that were signed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use url::form_urlencoded;
use url::Url;

use crate::config::Credentials;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, QueryParams};

pub const AUTH_PROTO_V1: &str = "hc_hmac_v1";
pub const SIGNATURE_HEADER: &str = "X-Auth-Signature";
const SIGN_DELIMITER: &str = "\n";

type HmacSha1 = Hmac<Sha1>;

/// A request as the client sees it before authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedRequest {
    pub method: HttpMethod,
    /// Endpoint URL without query string.
    pub url: Url,
    pub query: QueryParams,
    /// JSON body, POST only.
    pub body: Option<String>,
}

/// The four values a signature covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignableRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query_string: String,
    /// Request body, or empty for GET.
    pub body: String,
}

impl SignableRequest {
    /// `METHOD\nPATH\nQUERY\nBODY`.
    pub fn sign_string(&self) -> String {
        [
            self.method.as_str(),
            self.path.as_str(),
            self.query_string.as_str(),
            self.body.as_str(),
        ]
        .join(SIGN_DELIMITER)
    }
}

/// Turns a prepared request into one the API will accept.
pub trait Authenticator: Send + Sync {
    /// `timestamp` is the current Unix time in seconds.
    fn authenticate(&self, request: UnsignedRequest, timestamp: i64) -> Result<HttpRequest, ApiError>;
}

/// Form-urlencode `params` in key order.
pub fn encode_query(params: &QueryParams) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}

/// `hc_hmac_v1` signer.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
}

impl RequestSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Add the authentication parameters to `params`.
    pub fn augment(&self, params: &mut QueryParams, timestamp: i64) {
        params.insert("AuthKey".to_string(), self.credentials.key().to_string());
        params.insert("AuthProto".to_string(), AUTH_PROTO_V1.to_string());
        params.insert("AuthTimestamp".to_string(), timestamp.to_string());
    }

    /// Lowercase hex HMAC-SHA1 of the request's sign-string.
    pub fn sign(&self, request: &SignableRequest) -> Result<String, ApiError> {
        let mut mac = HmacSha1::new_from_slice(self.credentials.secret().as_bytes())
            .map_err(|e| ApiError::ConfigError(format!("unusable API secret: {e}")))?;
        mac.update(request.sign_string().as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl Authenticator for RequestSigner {
    fn authenticate(&self, request: UnsignedRequest, timestamp: i64) -> Result<HttpRequest, ApiError> {
        let UnsignedRequest {
            method,
            url,
            mut query,
            body,
        } = request;

        self.augment(&mut query, timestamp);
        let query_string = encode_query(&query);

        let signable = SignableRequest {
            method,
            path: url.path().to_string(),
            query_string,
            body: body.clone().unwrap_or_default(),
        };
        let signature = self.sign(&signable)?;

        let mut headers = vec![(SIGNATURE_HEADER.to_string(), signature)];
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        Ok(HttpRequest {
            method,
            url: with_query(&url, &signable.query_string),
            headers,
            body,
        })
    }
}

/// The default authenticator.
pub type HmacAuth = RequestSigner;

/// HTTP Basic authentication with the key as user and the secret as password.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    credentials: Credentials,
}

impl BasicAuth {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl Authenticator for BasicAuth {
    fn authenticate(&self, request: UnsignedRequest, _timestamp: i64) -> Result<HttpRequest, ApiError> {
        let token = STANDARD.encode(format!(
            "{}:{}",
            self.credentials.key(),
            self.credentials.secret()
        ));
        let mut headers = vec![("Authorization".to_string(), format!("Basic {token}"))];
        if request.body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        Ok(HttpRequest {
            method: request.method,
            url: with_query(&request.url, &encode_query(&request.query)),
            headers,
            body: request.body,
        })
    }
}

fn with_query(url: &Url, query_string: &str) -> String {
    if query_string.is_empty() {
        url.as_str().to_string()
    } else {
        format!("{}?{query_string}", url.as_str())
    }
}
