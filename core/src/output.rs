//! Output strategies applied to every raw response.
//!
//! The client is generic over its `OutputGenerator`, so the return type of
//! `fetch` follows the chosen strategy:
//!
//! | strategy       | output         | error interpretation |
//! |----------------|----------------|----------------------|
//! | `RawOutput`    | `HttpResponse` | none                 |
//! | `JsonOutput`   | `Value`        | none                 |
//! | `TypedOutput`  | `ApiResponse`  | full                 |

use serde_json::Value;

use crate::error::ApiError;
use crate::http::HttpResponse;
use crate::response::{self, ApiResponse};

/// Turns a raw response into what the caller gets back.
pub trait OutputGenerator: Send + Sync {
    type Output;

    fn process_response(&self, endpoint: &str, response: HttpResponse) -> Result<Self::Output, ApiError>;
}

/// Returns the response untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawOutput;

impl OutputGenerator for RawOutput {
    type Output = HttpResponse;

    fn process_response(&self, _endpoint: &str, response: HttpResponse) -> Result<HttpResponse, ApiError> {
        Ok(response)
    }
}

/// Returns the parsed JSON body.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOutput;

impl OutputGenerator for JsonOutput {
    type Output = Value;

    fn process_response(&self, _endpoint: &str, response: HttpResponse) -> Result<Value, ApiError> {
        Ok(serde_json::from_slice(&response.body)?)
    }
}

/// Interprets errors and builds an `ApiResponse`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypedOutput;

impl OutputGenerator for TypedOutput {
    type Output = ApiResponse;

    fn process_response(&self, endpoint: &str, response: HttpResponse) -> Result<ApiResponse, ApiError> {
        response::deserialize(endpoint, response)
    }
}
