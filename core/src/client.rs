//! Request dispatch for the analytics API.
//!
//! # Design
//! `ApiClient` owns its collaborators behind trait objects: an
//! `Authenticator` that signs, a `Transport` that performs the round trip and
//! a `Clock` for timestamps. The output strategy is a type parameter so the
//! return type of `fetch` is known statically.
//!
//! Building a request is split from sending it. `build_fetch` and
//! `build_fetch_synchronous` are pure and return an `UnsignedRequest`;
//! `fetch` and `fetch_synchronous` sign it, send it and run the output
//! strategy on whatever comes back.
//!
//! Dispatch rule: one identifier goes out as a GET with its fields merged
//! into the query, several go out as a POST whose body is the JSON array of
//! identifiers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::clock::{Clock, SystemClock};
use crate::components::{BlockLevel, Components, MsaLevel, PropertyLevel, ZipLevel};
use crate::config::{ClientConfig, Credentials};
use crate::error::ApiError;
use crate::http::{HttpMethod, QueryParams};
use crate::identifier::Identifier;
use crate::output::{OutputGenerator, TypedOutput};
use crate::retry::RetryPolicy;
use crate::signing::{Authenticator, BasicAuth, RequestSigner, UnsignedRequest};
use crate::transport::{self, Transport, UreqTransport};

/// Built-in authentication schemes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthScheme {
    /// `hc_hmac_v1` request signing.
    #[default]
    Hmac,
    /// HTTP Basic with key and secret.
    Basic,
}

/// Client for the analytics API.
pub struct ApiClient<O = TypedOutput> {
    config: ClientConfig,
    authenticator: Box<dyn Authenticator>,
    transport: Box<dyn Transport>,
    clock: Arc<dyn Clock>,
    output: O,
}

impl<O: fmt::Debug> fmt::Debug for ApiClient<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl ApiClient<TypedOutput> {
    /// Client with default settings. Missing arguments are read from
    /// `HC_API_KEY` / `HC_API_SECRET`.
    pub fn new(key: Option<&str>, secret: Option<&str>) -> Result<Self, ApiError> {
        let mut builder = Self::builder();
        if let Some(key) = key {
            builder = builder.key(key);
        }
        if let Some(secret) = secret {
            builder = builder.secret(secret);
        }
        builder.build()
    }

    pub fn builder() -> ApiClientBuilder<TypedOutput> {
        ApiClientBuilder::new()
    }
}

impl<O: OutputGenerator> ApiClient<O> {
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Prepare a data request for already-normalized identifiers.
    pub fn build_fetch(
        &self,
        endpoint: &str,
        identifiers: &[Identifier],
        query_params: QueryParams,
    ) -> Result<UnsignedRequest, ApiError> {
        let url = self.config.endpoint_url(endpoint)?;
        match identifiers {
            [] => Err(ApiError::InvalidInput(
                "a non-empty list of identifiers is required".to_string(),
            )),
            [single] => {
                let mut query = query_params;
                query.extend(single.query_pairs());
                Ok(UnsignedRequest {
                    method: HttpMethod::Get,
                    url,
                    query,
                    body: None,
                })
            }
            many => {
                let body = serde_json::to_string(many)
                    .map_err(|e| ApiError::SerializationError(e.to_string()))?;
                Ok(UnsignedRequest {
                    method: HttpMethod::Post,
                    url,
                    query: query_params,
                    body: Some(body),
                })
            }
        }
    }

    /// Prepare a GET carrying only `query_params`.
    pub fn build_fetch_synchronous(
        &self,
        endpoint: &str,
        query_params: QueryParams,
    ) -> Result<UnsignedRequest, ApiError> {
        Ok(UnsignedRequest {
            method: HttpMethod::Get,
            url: self.config.endpoint_url(endpoint)?,
            query: query_params,
            body: None,
        })
    }

    /// Fetch `endpoint` for `identifiers`: GET for one, POST for several.
    #[instrument(skip(self, identifiers, query_params), fields(count = identifiers.len()))]
    pub fn fetch(
        &self,
        endpoint: &str,
        identifiers: &[Identifier],
        query_params: QueryParams,
    ) -> Result<O::Output, ApiError> {
        let request = self.build_fetch(endpoint, identifiers, query_params)?;
        self.execute(endpoint, request)
    }

    /// Fetch `endpoint` with a plain GET, for endpoints that take query
    /// parameters instead of identifiers.
    #[instrument(skip(self, query_params))]
    pub fn fetch_synchronous(
        &self,
        endpoint: &str,
        query_params: QueryParams,
    ) -> Result<O::Output, ApiError> {
        let request = self.build_fetch_synchronous(endpoint, query_params)?;
        self.execute(endpoint, request)
    }

    fn execute(&self, endpoint: &str, request: UnsignedRequest) -> Result<O::Output, ApiError> {
        debug!(method = request.method.as_str(), url = %request.url, "dispatching");
        let signed = self.authenticator.authenticate(request, self.clock.now())?;
        let response = transport::send(self.transport.as_ref(), &signed)?;
        self.output.process_response(endpoint, response)
    }

    /// A retry policy sharing this client's clock.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.clock.clone())
    }

    pub fn property(&self) -> Components<'_, O, PropertyLevel> {
        Components::new(self)
    }

    pub fn block(&self) -> Components<'_, O, BlockLevel> {
        Components::new(self)
    }

    pub fn zip(&self) -> Components<'_, O, ZipLevel> {
        Components::new(self)
    }

    pub fn msa(&self) -> Components<'_, O, MsaLevel> {
        Components::new(self)
    }
}

/// Assembles an `ApiClient`.
///
/// Credentials are resolved at `build` time, arguments first and the
/// environment second, unless a custom authenticator was supplied.
pub struct ApiClientBuilder<O = TypedOutput> {
    key: Option<String>,
    secret: Option<String>,
    config: ClientConfig,
    scheme: AuthScheme,
    authenticator: Option<Box<dyn Authenticator>>,
    transport: Option<Box<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
    output: O,
}

impl ApiClientBuilder<TypedOutput> {
    pub fn new() -> Self {
        Self {
            key: None,
            secret: None,
            config: ClientConfig::default(),
            scheme: AuthScheme::default(),
            authenticator: None,
            transport: None,
            clock: None,
            output: TypedOutput,
        }
    }
}

impl Default for ApiClientBuilder<TypedOutput> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: OutputGenerator> ApiClientBuilder<O> {
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn auth_scheme(mut self, scheme: AuthScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Some(Box::new(authenticator));
        self
    }

    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Swap the output strategy, changing what `fetch` returns.
    pub fn output<P: OutputGenerator>(self, output: P) -> ApiClientBuilder<P> {
        ApiClientBuilder {
            key: self.key,
            secret: self.secret,
            config: self.config,
            scheme: self.scheme,
            authenticator: self.authenticator,
            transport: self.transport,
            clock: self.clock,
            output,
        }
    }

    pub fn build(self) -> Result<ApiClient<O>, ApiError> {
        self.config.validate()?;

        let authenticator = match self.authenticator {
            Some(authenticator) => authenticator,
            None => {
                let credentials =
                    Credentials::resolve(self.key.as_deref(), self.secret.as_deref())?;
                match self.scheme {
                    AuthScheme::Hmac => Box::new(RequestSigner::new(credentials)) as Box<dyn Authenticator>,
                    AuthScheme::Basic => Box::new(BasicAuth::new(credentials)),
                }
            }
        };
        let transport = self
            .transport
            .unwrap_or_else(|| Box::new(UreqTransport::new(self.config.timeout)));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(ApiClient {
            config: self.config,
            authenticator,
            transport,
            clock,
            output: self.output,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::clock::fake::FakeClock;
    use crate::identifier::{normalize, IdentifierKind};
    use crate::output::{JsonOutput, RawOutput};
    use crate::signing::{SignableRequest, SIGNATURE_HEADER};
    use crate::transport::fake::{json_response, FakeTransport};

    const NOW: i64 = 1_500_000_000;

    fn client(transport: Arc<FakeTransport>) -> ApiClient {
        ApiClient::builder()
            .key("test_key")
            .secret("test_secret")
            .base_url("http://localhost:3000")
            .transport(transport)
            .clock(Arc::new(FakeClock::at(NOW)))
            .build()
            .unwrap()
    }

    fn zips(input: serde_json::Value) -> Vec<Identifier> {
        let input = crate::identifier::IdentifierInput::from_json(input).unwrap();
        normalize(IdentifierKind::Zip, input).unwrap()
    }

    #[test]
    fn one_identifier_is_a_get() {
        let c = client(Arc::new(FakeTransport::new()));
        let ids = zips(json!({"zipcode": "90274", "meta": "m1"}));
        let mut extra = QueryParams::new();
        extra.insert("foo".to_string(), "bar".to_string());

        let req = c.build_fetch("zip/details", &ids, extra).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert!(req.body.is_none());
        assert_eq!(req.url.as_str(), "http://localhost:3000/v2/zip/details");
        assert_eq!(req.query.get("zipcode").map(String::as_str), Some("90274"));
        assert_eq!(req.query.get("meta").map(String::as_str), Some("m1"));
        assert_eq!(req.query.get("foo").map(String::as_str), Some("bar"));
    }

    #[test]
    fn identifier_fields_override_extra_params() {
        let c = client(Arc::new(FakeTransport::new()));
        let ids = zips(json!("90274"));
        let mut extra = QueryParams::new();
        extra.insert("zipcode".to_string(), "11111".to_string());
        let req = c.build_fetch("zip/details", &ids, extra).unwrap();
        assert_eq!(req.query.get("zipcode").map(String::as_str), Some("90274"));
    }

    #[test]
    fn several_identifiers_are_a_post() {
        let c = client(Arc::new(FakeTransport::new()));
        let ids = zips(json!(["90274", {"zipcode": "01960", "meta": "m2"}]));
        let mut extra = QueryParams::new();
        extra.insert("components".to_string(), "zip/details".to_string());

        let req = c.build_fetch("zip/details", &ids, extra).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.query.len(), 1);
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(
            body,
            json!([{"zipcode": "90274"}, {"zipcode": "01960", "meta": "m2"}])
        );
    }

    #[test]
    fn no_identifiers_is_invalid() {
        let transport = Arc::new(FakeTransport::new());
        let c = client(transport.clone());
        let err = c.fetch("zip/details", &[], QueryParams::new()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn fetch_signs_and_sends() {
        let transport = Arc::new(FakeTransport::new().respond(json_response(
            r#"[{"zipcode_info": {"zipcode": "90274"}, "zip/details": {"api_code": 0, "api_code_description": "ok", "result": {}}}]"#,
        )));
        let c = client(transport.clone());
        let resp = c
            .fetch("zip/details", &zips(json!("90274")), QueryParams::new())
            .unwrap();
        assert_eq!(resp.zipcodes().unwrap()[0].zipcode.as_deref(), Some("90274"));

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        let query = "AuthKey=test_key&AuthProto=hc_hmac_v1&AuthTimestamp=1500000000&zipcode=90274";
        assert_eq!(sent[0].url, format!("http://localhost:3000/v2/zip/details?{query}"));

        let expected = RequestSigner::new(Credentials::new("test_key", "test_secret"))
            .sign(&SignableRequest {
                method: HttpMethod::Get,
                path: "/v2/zip/details".to_string(),
                query_string: query.to_string(),
                body: String::new(),
            })
            .unwrap();
        assert_eq!(sent[0].header(SIGNATURE_HEADER), Some(expected.as_str()));
    }

    #[test]
    fn fetch_synchronous_is_always_a_get() {
        let transport = Arc::new(FakeTransport::new().respond(json_response(r#"{"ok": true}"#)));
        let c = client(transport.clone());
        let mut params = QueryParams::new();
        params.insert("address".to_string(), "43 Valmonte Plaza".to_string());
        let resp = c.fetch_synchronous("property/value_report", params).unwrap();
        assert!(resp.objects().unwrap().is_empty());

        let sent = transport.requests();
        assert_eq!(sent[0].method, HttpMethod::Get);
        assert!(sent[0].url.contains("address=43+Valmonte+Plaza"));
    }

    #[test]
    fn output_strategy_sets_return_type() {
        let transport = Arc::new(
            FakeTransport::new()
                .respond(json_response(r#"{"code": 400, "message": "bad"}"#))
                .respond(json_response(r#"{"code": 400, "message": "bad"}"#)),
        );
        let json_client = ApiClient::builder()
            .key("k")
            .secret("s")
            .transport(transport.clone())
            .output(JsonOutput)
            .build()
            .unwrap();
        let value = json_client
            .fetch("zip/details", &zips(json!("90274")), QueryParams::new())
            .unwrap();
        assert_eq!(value["code"], 400);

        let raw_client = ApiClient::builder()
            .key("k")
            .secret("s")
            .transport(transport)
            .output(RawOutput)
            .build()
            .unwrap();
        let raw = raw_client
            .fetch("zip/details", &zips(json!("90274")), QueryParams::new())
            .unwrap();
        assert_eq!(raw.status, 200);
    }

    #[test]
    fn transport_failures_surface() {
        let transport =
            Arc::new(FakeTransport::new().fail(ApiError::TransportError("refused".to_string())));
        let c = client(transport);
        let err = c
            .fetch("zip/details", &zips(json!("90274")), QueryParams::new())
            .unwrap_err();
        assert!(matches!(err, ApiError::TransportError(_)));
    }

    #[test]
    fn basic_scheme_uses_authorization_header() {
        let transport = Arc::new(FakeTransport::new().respond(json_response("[]")));
        let c = ApiClient::builder()
            .key("user")
            .secret("pass")
            .auth_scheme(AuthScheme::Basic)
            .transport(transport.clone())
            .build()
            .unwrap();
        c.fetch("zip/details", &zips(json!("90274")), QueryParams::new())
            .unwrap();
        let sent = transport.requests();
        assert_eq!(sent[0].header("Authorization"), Some("Basic dXNlcjpwYXNz"));
        assert!(!sent[0].url.contains("AuthKey"));
    }

    #[test]
    fn retry_policy_uses_client_clock() {
        let limited = crate::http::HttpResponse {
            status: 429,
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("X-RateLimit-Period".to_string(), "60".to_string()),
                ("X-RateLimit-Limit".to_string(), "10".to_string()),
                ("X-RateLimit-Remaining".to_string(), "0".to_string()),
                ("X-RateLimit-Reset".to_string(), (NOW + 10).to_string()),
            ],
            body: br#"{"code": 429, "message": "Too Many Requests"}"#.to_vec(),
        };
        let transport = Arc::new(
            FakeTransport::new()
                .respond(limited)
                .respond(json_response("[]")),
        );
        let clock = Arc::new(FakeClock::at(NOW));
        let c = ApiClient::builder()
            .key("k")
            .secret("s")
            .transport(transport.clone())
            .clock(clock.clone())
            .build()
            .unwrap();
        let ids = zips(json!("90274"));
        let resp = c
            .retry_policy()
            .with_retry(|| c.fetch("zip/details", &ids, QueryParams::new()))
            .unwrap();
        assert!(resp.objects().unwrap().is_empty());
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(11)]);
    }

    #[test]
    fn bad_base_url_fails_at_build() {
        let err = ApiClient::builder()
            .authenticator(RequestSigner::new(Credentials::new("k", "s")))
            .base_url("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, ApiError::ConfigError(_)));
    }
}
