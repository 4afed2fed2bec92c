//! Synchronous client core for the HouseCanary Analytics API.
//!
//! # Overview
//! Turns loosely shaped caller input (slugs, `(address, zipcode)` tuples,
//! JSON objects, lists of those) into signed API requests and interprets the
//! responses as typed per-identifier results with business-error status.
//!
//! # Design
//! - `identifier::normalize` validates caller input against a per-kind key
//!   schema before anything touches the network.
//! - `ApiClient` picks GET for one identifier and POST for several, signs the
//!   request through an `Authenticator` and sends it through a `Transport`.
//!   Both are trait objects, so tests run against in-memory doubles and the
//!   default `UreqTransport` is only one choice.
//! - Requests and responses are plain data (`HttpRequest`, `HttpResponse`).
//!   The signed query string travels inside the URL so the server sees the
//!   exact bytes that were signed.
//! - `ApiResponse` builds domain objects lazily and caches them.
//! - `RetryPolicy` waits out short rate limits; `export` flattens results
//!   into rows for tabular output.

pub mod client;
pub mod clock;
pub mod components;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod export;
pub mod http;
pub mod identifier;
pub mod output;
pub mod ratelimit;
pub mod response;
pub mod retry;
pub mod signing;
pub mod transport;
pub mod types;

pub use client::{ApiClient, ApiClientBuilder, AuthScheme};
pub use clock::{Clock, SystemClock};
pub use components::{Components, ReportFormat, ReportType};
pub use config::{ClientConfig, Credentials};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, QueryParams};
pub use identifier::{normalize, Identifier, IdentifierInput, IdentifierKind};
pub use output::{JsonOutput, OutputGenerator, RawOutput, TypedOutput};
pub use ratelimit::RateLimit;
pub use response::{deserialize, ApiResponse, BodyFormat, ResponseKind};
pub use retry::RetryPolicy;
pub use signing::{Authenticator, BasicAuth, HmacAuth, RequestSigner, SignableRequest, UnsignedRequest};
pub use transport::{Transport, UreqTransport};
pub use types::{ApiObject, Block, ComponentResult, DomainObject, Msa, ObjectError, Property, ZipCode};
