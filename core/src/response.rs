//! Response interpretation.
//!
//! # Design
//! `deserialize` runs once per HTTP response and does two things:
//!
//! 1. Error interpretation. A top-level `code` other than 200 (or, without a
//!    `code`, a non-2xx status) becomes an `ApiError`. 403 and 429 get their
//!    own variants; 429 carries the rate-limit windows from the headers.
//! 2. Routing. The endpoint prefix picks the domain object type. Report
//!    endpoints return a single dict and never yield objects.
//!
//! Domain objects, object errors and rate limits are built on first access
//! and cached on the `ApiResponse`. The caches use `unsync::OnceCell`, so a
//! response is `Send` but not `Sync`.

use once_cell::unsync::OnceCell;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;
use crate::http::HttpResponse;
use crate::identifier::IdentifierKind;
use crate::ratelimit::RateLimit;
use crate::types::{ApiObject, Block, DomainObject, Msa, ObjectError, Property, ZipCode};

pub const HTTP_CODE_OK: i64 = 200;
pub const HTTP_FORBIDDEN: u16 = 403;
pub const HTTP_TOO_MANY_REQUESTS: u16 = 429;

pub const VALUE_REPORT_ENDPOINT: &str = "property/value_report";
pub const RENTAL_REPORT_ENDPOINT: &str = "property/rental_report";

/// What an endpoint's body contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Property,
    Block,
    ZipCode,
    Msa,
    ValueReport,
    RentalReport,
}

impl ResponseKind {
    /// Route on the endpoint prefix. Unknown prefixes are treated as property
    /// endpoints.
    pub fn for_endpoint(endpoint: &str) -> Self {
        match endpoint {
            VALUE_REPORT_ENDPOINT => return ResponseKind::ValueReport,
            RENTAL_REPORT_ENDPOINT => return ResponseKind::RentalReport,
            _ => {}
        }
        let prefix = endpoint.split('/').next().unwrap_or_default();
        match IdentifierKind::from_label(prefix) {
            Some(IdentifierKind::Block) => ResponseKind::Block,
            Some(IdentifierKind::Zip) => ResponseKind::ZipCode,
            Some(IdentifierKind::Msa) => ResponseKind::Msa,
            Some(IdentifierKind::Property) | None => ResponseKind::Property,
        }
    }

    /// Identifier kind of the objects in the body, `None` for reports.
    pub fn identifier_kind(self) -> Option<IdentifierKind> {
        match self {
            ResponseKind::Property => Some(IdentifierKind::Property),
            ResponseKind::Block => Some(IdentifierKind::Block),
            ResponseKind::ZipCode => Some(IdentifierKind::Zip),
            ResponseKind::Msa => Some(IdentifierKind::Msa),
            ResponseKind::ValueReport | ResponseKind::RentalReport => None,
        }
    }
}

/// Body encoding, from the `Content-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Pdf,
    Zip,
    Other,
}

impl BodyFormat {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return BodyFormat::Other;
        };
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "application/json" => BodyFormat::Json,
            "application/pdf" => BodyFormat::Pdf,
            "application/zip" => BodyFormat::Zip,
            _ => BodyFormat::Other,
        }
    }
}

/// A successful API response.
#[derive(Debug)]
pub struct ApiResponse {
    endpoint_name: String,
    kind: ResponseKind,
    format: BodyFormat,
    json: Value,
    response: HttpResponse,
    objects: OnceCell<Vec<DomainObject>>,
    object_errors: OnceCell<Vec<ObjectError>>,
    rate_limits: OnceCell<Vec<RateLimit>>,
}

impl ApiResponse {
    /// Endpoint of the request, e.g. `"property/value"`.
    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    pub fn format(&self) -> BodyFormat {
        self.format
    }

    /// Parsed body. `Null` when the body was not JSON.
    pub fn json(&self) -> &Value {
        &self.json
    }

    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    /// Raw bytes of a PDF or zip report.
    pub fn content(&self) -> Option<&[u8]> {
        matches!(self.format, BodyFormat::Pdf | BodyFormat::Zip).then_some(self.response.body.as_slice())
    }

    /// One object per requested identifier, in request order.
    ///
    /// Empty for report endpoints and non-array bodies.
    pub fn objects(&self) -> Result<&[DomainObject], ApiError> {
        let objects = self.objects.get_or_try_init(|| {
            let (Some(kind), Some(items)) = (self.kind.identifier_kind(), self.json.as_array())
            else {
                return Ok(Vec::new());
            };
            debug!(endpoint = %self.endpoint_name, items = items.len(), "building domain objects");
            items
                .iter()
                .map(|item| DomainObject::from_json(kind, item))
                .collect::<Result<Vec<_>, ApiError>>()
        })?;
        Ok(objects)
    }

    pub fn properties(&self) -> Result<Vec<&Property>, ApiError> {
        Ok(self.objects()?.iter().filter_map(DomainObject::as_property).collect())
    }

    pub fn blocks(&self) -> Result<Vec<&Block>, ApiError> {
        Ok(self.objects()?.iter().filter_map(DomainObject::as_block).collect())
    }

    pub fn zipcodes(&self) -> Result<Vec<&ZipCode>, ApiError> {
        Ok(self.objects()?.iter().filter_map(DomainObject::as_zipcode).collect())
    }

    pub fn msas(&self) -> Result<Vec<&Msa>, ApiError> {
        Ok(self.objects()?.iter().filter_map(DomainObject::as_msa).collect())
    }

    /// True if any object has a component with `api_code > 0`.
    pub fn has_object_error(&self) -> Result<bool, ApiError> {
        Ok(!self.get_object_errors()?.is_empty())
    }

    /// One entry per object that has business errors.
    pub fn get_object_errors(&self) -> Result<&[ObjectError], ApiError> {
        let errors = self.object_errors.get_or_try_init(|| {
            Ok::<_, ApiError>(
                self.objects()?
                    .iter()
                    .filter(|object| object.has_error())
                    .map(|object| ObjectError {
                        identity: object.identity(),
                        components: object.get_errors(),
                    })
                    .collect(),
            )
        })?;
        Ok(errors)
    }

    /// Rate-limit windows from the response headers.
    pub fn rate_limits(&self) -> &[RateLimit] {
        self.rate_limits
            .get_or_init(|| RateLimit::from_headers(&self.response.headers))
    }
}

/// Interpret `response` for `endpoint_name`.
pub fn deserialize(endpoint_name: &str, response: HttpResponse) -> Result<ApiResponse, ApiError> {
    let format = BodyFormat::from_content_type(response.content_type());
    let parsed = match format {
        BodyFormat::Json => Some(serde_json::from_slice::<Value>(&response.body)),
        _ => None,
    };

    let json = match parsed {
        Some(Ok(json)) => {
            check_error(&response, Some(&json))?;
            json
        }
        Some(Err(e)) => {
            check_error(&response, None)?;
            return Err(ApiError::DeserializationError(format!(
                "{endpoint_name}: invalid JSON body: {e}"
            )));
        }
        None => {
            check_error(&response, None)?;
            Value::Null
        }
    };

    Ok(ApiResponse {
        endpoint_name: endpoint_name.to_string(),
        kind: ResponseKind::for_endpoint(endpoint_name),
        format,
        json,
        response,
        objects: OnceCell::new(),
        object_errors: OnceCell::new(),
        rate_limits: OnceCell::new(),
    })
}

/// Fail if the body's `code` (or the HTTP status) signals an error.
pub fn check_error(response: &HttpResponse, json: Option<&Value>) -> Result<(), ApiError> {
    let code = json
        .and_then(|body| body.get("code"))
        .and_then(|code| match code {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });

    let status = match code {
        Some(HTTP_CODE_OK) => return Ok(()),
        Some(code) => u16::try_from(code).unwrap_or(response.status),
        None if response.is_success() => return Ok(()),
        None => response.status,
    };

    let message = json
        .and_then(error_message)
        .unwrap_or_else(|| response.text());
    debug!(status, %message, "request failed");

    Err(match status {
        HTTP_FORBIDDEN => ApiError::Unauthorized { message },
        HTTP_TOO_MANY_REQUESTS => ApiError::RateLimited {
            message,
            rate_limits: RateLimit::from_headers(&response.headers),
        },
        status => ApiError::RequestError { status, message },
    })
}

fn error_message(body: &Value) -> Option<String> {
    match body.get("message") {
        Some(Value::String(message)) => return Some(message.clone()),
        Some(Value::Object(fields)) => {
            let joined = fields
                .iter()
                .map(|(field, message)| match message {
                    Value::String(text) => format!("{field}: {text}"),
                    other => format!("{field}: {other}"),
                })
                .collect::<Vec<_>>()
                .join(". ");
            return Some(joined);
        }
        Some(Value::Null) | None => {}
        Some(other) => return Some(other.to_string()),
    }
    body.get("code_description")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn http(status: u16, content_type: &str, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    fn ok_json(body: Value) -> HttpResponse {
        http(200, "application/json", &body.to_string())
    }

    #[test]
    fn routes_on_endpoint_prefix() {
        assert_eq!(ResponseKind::for_endpoint("property/value"), ResponseKind::Property);
        assert_eq!(ResponseKind::for_endpoint("block/value_ts"), ResponseKind::Block);
        assert_eq!(ResponseKind::for_endpoint("zip/details"), ResponseKind::ZipCode);
        assert_eq!(ResponseKind::for_endpoint("msa/hpi_ts"), ResponseKind::Msa);
        assert_eq!(
            ResponseKind::for_endpoint("property/value_report"),
            ResponseKind::ValueReport
        );
        assert_eq!(
            ResponseKind::for_endpoint("property/rental_report"),
            ResponseKind::RentalReport
        );
        assert_eq!(ResponseKind::for_endpoint("unknown/thing"), ResponseKind::Property);
    }

    #[test]
    fn single_item_round_trip() {
        let body = json!([{
            "address_info": {"address": "43 Valmonte Plaza", "zipcode": "90274"},
            "property/value": {"api_code": 0, "api_code_description": "ok", "result": {"value": {"price_mean": 1.0}}}
        }]);
        let resp = deserialize("property/value", ok_json(body.clone())).unwrap();
        assert_eq!(resp.endpoint_name(), "property/value");
        assert_eq!(resp.json(), &body);

        let props = resp.properties().unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].address.as_deref(), Some("43 Valmonte Plaza"));
        assert_eq!(props[0].component_results[0].api_code, 0);
        assert!(!resp.has_object_error().unwrap());
        assert!(resp.get_object_errors().unwrap().is_empty());
        assert!(resp.blocks().unwrap().is_empty());
    }

    #[test]
    fn objects_are_built_once() {
        let body = json!([{"zipcode_info": {"zipcode": "90274"}}]);
        let resp = deserialize("zip/details", ok_json(body)).unwrap();
        let first = resp.objects().unwrap().as_ptr();
        let second = resp.objects().unwrap().as_ptr();
        assert_eq!(first, second);
    }

    #[test]
    fn business_errors_keyed_by_identity() {
        let body = json!([
            {"zipcode_info": {"zipcode": "00000"},
             "zip/details": {"api_code": 1001, "api_code_description": "bad zip", "result": null}},
            {"zipcode_info": {"zipcode": "90274"},
             "zip/details": {"api_code": 0, "api_code_description": "ok", "result": {}}},
            {"zipcode_info": {"zipcode": "01960"},
             "zip/details": {"api_code": 0, "api_code_description": "ok", "result": {}}}
        ]);
        let resp = deserialize("zip/details", ok_json(body)).unwrap();
        assert!(resp.has_object_error().unwrap());
        let errors = resp.get_object_errors().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].identity, "00000");
        assert_eq!(errors[0].message(), "bad zip");

        let zipcodes = resp.zipcodes().unwrap();
        assert_eq!(zipcodes.len(), 3);
        assert!(zipcodes[0].has_error());
        assert!(!zipcodes[1].has_error());
        assert!(!zipcodes[2].has_error());
    }

    #[test]
    fn report_bodies_have_no_objects() {
        let resp = deserialize(
            "property/value_report",
            ok_json(json!({"Header": {"title": "Value Report"}})),
        )
        .unwrap();
        assert_eq!(resp.kind(), ResponseKind::ValueReport);
        assert!(resp.objects().unwrap().is_empty());
        assert_eq!(resp.json()["Header"]["title"], "Value Report");
    }

    #[test]
    fn pdf_bodies_are_kept_as_bytes() {
        let resp = deserialize(
            "property/value_report",
            http(200, "application/pdf", "%PDF-1.4"),
        )
        .unwrap();
        assert_eq!(resp.format(), BodyFormat::Pdf);
        assert_eq!(resp.content(), Some(&b"%PDF-1.4"[..]));
        assert!(resp.json().is_null());
        assert!(resp.objects().unwrap().is_empty());
    }

    #[test]
    fn non_array_json_yields_no_objects() {
        let resp = deserialize("property/value", ok_json(json!({"unexpected": true}))).unwrap();
        assert!(resp.objects().unwrap().is_empty());
        assert!(resp.content().is_none());
    }

    #[test]
    fn body_code_overrides_status() {
        let err = deserialize(
            "property/value",
            ok_json(json!({"code": 400, "code_description": "Bad Request"})),
        )
        .unwrap_err();
        match err {
            ApiError::RequestError { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Bad Request");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn forbidden_is_unauthorized() {
        let err = deserialize(
            "property/value",
            http(403, "application/json", r#"{"code": 403, "message": "Invalid credentials"}"#),
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized { ref message } if message == "Invalid credentials"));
        assert_eq!(err.to_string(), "Invalid credentials (HTTP Status: 403)");
    }

    #[test]
    fn too_many_requests_carries_windows() {
        let mut response = http(429, "application/json", r#"{"code": 429, "message": "Too many"}"#);
        response.headers.extend([
            ("X-RateLimit-Period".to_string(), "60".to_string()),
            ("X-RateLimit-Limit".to_string(), "10".to_string()),
            ("X-RateLimit-Remaining".to_string(), "0".to_string()),
            ("X-RateLimit-Reset".to_string(), "1500000060".to_string()),
        ]);
        let err = deserialize("property/value", response).unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.rate_limits().len(), 1);
        assert_eq!(err.rate_limits()[0].reset_timestamp, 1_500_000_060);
    }

    #[test]
    fn dict_messages_are_joined() {
        let err = deserialize(
            "property/value",
            http(
                400,
                "application/json",
                r#"{"code": 400, "message": {"address": "is required", "zipcode": "is invalid"}}"#,
            ),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "address: is required. zipcode: is invalid (HTTP Status: 400)"
        );
    }

    #[test]
    fn status_without_code_falls_back_to_raw_body() {
        let err = deserialize("property/value", http(502, "text/html", "Bad Gateway")).unwrap_err();
        match err {
            ApiError::RequestError { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_success_body_is_a_deserialization_error() {
        let err = deserialize("property/value", http(200, "application/json", "[{")).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn malformed_item_surfaces_on_access() {
        let resp = deserialize("msa/details", ok_json(json!([{"meta": "no msa_info"}]))).unwrap();
        assert!(matches!(resp.objects().unwrap_err(), ApiError::DeserializationError(_)));
    }

    #[test]
    fn rate_limits_are_read_from_headers() {
        let mut response = ok_json(json!([]));
        response.headers.extend([
            ("X-RateLimit-Period".to_string(), "86400".to_string()),
            ("X-RateLimit-Limit".to_string(), "1000".to_string()),
            ("X-RateLimit-Remaining".to_string(), "999".to_string()),
            ("X-RateLimit-Reset".to_string(), "1500086400".to_string()),
        ]);
        let resp = deserialize("zip/details", response).unwrap();
        assert_eq!(resp.rate_limits().len(), 1);
        assert_eq!(resp.rate_limits()[0].requests_remaining, 999);
    }

    #[test]
    fn content_type_parameters_are_ignored() {
        assert_eq!(
            BodyFormat::from_content_type(Some("application/json; charset=utf-8")),
            BodyFormat::Json
        );
        assert_eq!(BodyFormat::from_content_type(Some("Application/Zip")), BodyFormat::Zip);
        assert_eq!(BodyFormat::from_content_type(None), BodyFormat::Other);
    }
}
