//! In-memory double of the analytics API.
//!
//! Serves `/{version}/{level}/{endpoint}` for GET and POST, checks the
//! `hc_hmac_v1` signature and answers with canned per-identifier results:
//!
//! - unknown `AuthKey` or a bad signature: 403
//! - `throttled_key`: 429 with rate-limit headers
//! - an identifier without its primary key: 400 with a field message
//! - zipcode `00000`: a business error (`api_code` 1001, "bad zip")
//! - `format=pdf` on a report endpoint: an `application/pdf` body

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::{json, Map, Value};
use sha1::Sha1;
use tokio::net::TcpListener;

pub const DEFAULT_KEY: &str = "test_key";
pub const DEFAULT_SECRET: &str = "test_secret";
pub const THROTTLED_KEY: &str = "throttled_key";
pub const BAD_ZIPCODE: &str = "00000";
pub const SIGNATURE_HEADER: &str = "x-auth-signature";

const AUTH_PARAMS: &[&str] = &["AuthKey", "AuthProto", "AuthTimestamp"];
const CONTROL_PARAMS: &[&str] = &["components", "format", "report_type"];

#[derive(Clone, Debug)]
pub struct MockConfig {
    pub auth_key: String,
    pub auth_secret: String,
    pub throttled_key: String,
    /// Seconds from now until the throttled key's window resets.
    pub reset_in_secs: i64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            auth_key: DEFAULT_KEY.to_string(),
            auth_secret: DEFAULT_SECRET.to_string(),
            throttled_key: THROTTLED_KEY.to_string(),
            reset_in_secs: 400,
        }
    }
}

impl MockConfig {
    /// Defaults overridden by `MOCK_AUTH_KEY`, `MOCK_AUTH_SECRET`,
    /// `MOCK_THROTTLED_KEY` and `MOCK_RESET_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            auth_key: lookup("MOCK_AUTH_KEY").unwrap_or(defaults.auth_key),
            auth_secret: lookup("MOCK_AUTH_SECRET").unwrap_or(defaults.auth_secret),
            throttled_key: lookup("MOCK_THROTTLED_KEY").unwrap_or(defaults.throttled_key),
            reset_in_secs: lookup("MOCK_RESET_SECS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.reset_in_secs),
        }
    }
}

pub fn app() -> Router {
    app_with(MockConfig::default())
}

pub fn app_with(config: MockConfig) -> Router {
    Router::new()
        .route("/{version}/{level}/{endpoint}", get(handle).post(handle))
        .with_state(Arc::new(config))
}

pub async fn run_with(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

/// Lowercase hex HMAC-SHA1 of `METHOD\nPATH\nQUERY\nBODY`.
pub fn sign(secret: &str, method: &str, path: &str, query: &str, body: &str) -> String {
    let Ok(mut mac) = Hmac::<Sha1>::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update([method, path, query, body].join("\n").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

async fn handle(
    State(config): State<Arc<MockConfig>>,
    Path((_version, level, endpoint)): Path<(String, String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let raw_query = uri.query().unwrap_or_default();
    let params: Vec<(String, String)> = url::form_urlencoded::parse(raw_query.as_bytes())
        .into_owned()
        .collect();

    let key = param(&params, "AuthKey").unwrap_or_default();
    let known = key == config.auth_key || key == config.throttled_key;
    let expected = sign(&config.auth_secret, method.as_str(), uri.path(), raw_query, &body);
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !known || param(&params, "AuthProto") != Some("hc_hmac_v1") || signature != expected {
        return error(StatusCode::FORBIDDEN, json!("Invalid credentials"));
    }

    if key == config.throttled_key {
        return throttled(config.reset_in_secs);
    }

    let Some(info_key) = info_key(&level) else {
        return error(StatusCode::NOT_FOUND, json!(format!("Unknown level: {level}")));
    };
    let component = format!("{level}/{endpoint}");

    if component == "property/value_report" || component == "property/rental_report" {
        return report(&component, param(&params, "format"), param(&params, "report_type"));
    }

    let identifiers = if method == Method::POST {
        match serde_json::from_str::<Vec<Map<String, Value>>>(&body) {
            Ok(items) => items,
            Err(e) => return error(StatusCode::BAD_REQUEST, json!(format!("Invalid body: {e}"))),
        }
    } else {
        let fields: Map<String, Value> = params
            .iter()
            .filter(|(k, _)| !AUTH_PARAMS.contains(&k.as_str()) && !CONTROL_PARAMS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        vec![fields]
    };

    for identifier in &identifiers {
        if let Some(missing) = missing_primary(&level, identifier) {
            return error(StatusCode::BAD_REQUEST, json!({ missing: format!("{missing} is required") }));
        }
    }

    let components: Vec<String> = if endpoint == "component_mget" {
        param(&params, "components")
            .unwrap_or_default()
            .split(',')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        vec![component]
    };

    let items: Vec<Value> = identifiers
        .iter()
        .map(|identifier| item(info_key, identifier, &components))
        .collect();

    (StatusCode::OK, rate_limit_headers("99,999", 60), Json(Value::Array(items))).into_response()
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn info_key(level: &str) -> Option<&'static str> {
    match level {
        "property" => Some("address_info"),
        "block" => Some("block_info"),
        "zip" => Some("zipcode_info"),
        "msa" => Some("msa_info"),
        _ => None,
    }
}

fn missing_primary(level: &str, identifier: &Map<String, Value>) -> Option<&'static str> {
    let present = |key: &str| identifier.get(key).is_some_and(|v| !v.is_null());
    match level {
        "property" if !present("address") && !present("slug") => Some("address"),
        "block" if !present("block_id") => Some("block_id"),
        "zip" if !present("zipcode") => Some("zipcode"),
        "msa" if !present("msa") => Some("msa"),
        _ => None,
    }
}

fn item(info_key: &str, identifier: &Map<String, Value>, components: &[String]) -> Value {
    let mut info: Map<String, Value> = identifier
        .iter()
        .filter(|(k, _)| k.as_str() != "meta")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if info_key == "address_info" {
        info.entry("city").or_insert(json!("Palos Verdes Estates"));
        info.entry("state").or_insert(json!("CA"));
        info.entry("unit").or_insert(Value::Null);
    }

    let mut item = Map::new();
    item.insert(info_key.to_string(), Value::Object(info));
    if let Some(meta) = identifier.get("meta") {
        item.insert("meta".to_string(), meta.clone());
    }

    let bad_zip = identifier.get("zipcode").and_then(Value::as_str) == Some(BAD_ZIPCODE);
    for component in components {
        let result = if bad_zip {
            json!({"api_code": 1001, "api_code_description": "bad zip", "result": null})
        } else {
            json!({"api_code": 0, "api_code_description": "ok", "result": result_for(component)})
        };
        item.insert(component.clone(), result);
    }
    Value::Object(item)
}

fn result_for(component: &str) -> Value {
    match component {
        "property/value" => json!({
            "value": {"price_mean": 1_000_000, "price_upr": 1_100_000, "price_lwr": 900_000, "fsd": 0.1}
        }),
        "property/geocode" => json!(true),
        "zip/details" | "property/zip_details" => json!({
            "multi_family": {"inventory_total": 12, "price_median": 450_000},
            "single_family": {"inventory_total": 40, "price_median": 900_000}
        }),
        other => json!({"component": other}),
    }
}

fn report(component: &str, format: Option<&str>, report_type: Option<&str>) -> Response {
    if format == Some("pdf") {
        return (
            StatusCode::OK,
            [("content-type", "application/pdf")],
            b"%PDF-1.4 mock report".to_vec(),
        )
            .into_response();
    }
    let body = json!({
        "report": component,
        "report_type": report_type.unwrap_or("full"),
    });
    (StatusCode::OK, Json(body)).into_response()
}

fn throttled(reset_in_secs: i64) -> Response {
    let body = json!({
        "code": 429,
        "code_description": "Too Many Requests",
        "message": "Rate limit exceeded",
    });
    (
        StatusCode::TOO_MANY_REQUESTS,
        rate_limit_headers("0", reset_in_secs),
        Json(body),
    )
        .into_response()
}

/// One window per comma-separated `remaining` entry. The first resets in
/// `first_reset_in` seconds, later ones a day out.
fn rate_limit_headers(remaining: &str, first_reset_in: i64) -> [(&'static str, String); 4] {
    let now = Utc::now().timestamp();
    let mut periods = Vec::new();
    let mut limits = Vec::new();
    let mut resets = Vec::new();
    for idx in 0..remaining.split(',').count() {
        if idx == 0 {
            periods.push("60".to_string());
            limits.push("100".to_string());
            resets.push((now + first_reset_in).to_string());
        } else {
            periods.push("86400".to_string());
            limits.push("1000".to_string());
            resets.push((now + 86_400).to_string());
        }
    }
    [
        ("x-ratelimit-period", periods.join(",")),
        ("x-ratelimit-limit", limits.join(",")),
        ("x-ratelimit-remaining", remaining.to_string()),
        ("x-ratelimit-reset", resets.join(",")),
    ]
}

fn error(status: StatusCode, message: Value) -> Response {
    let body = json!({
        "code": status.as_u16(),
        "code_description": status.canonical_reason().unwrap_or_default(),
        "message": message,
    });
    (status, Json(body)).into_response()
}
