//! Per-level endpoint wrappers.
//!
//! `client.property()`, `.block()`, `.zip()` and `.msa()` return a
//! `Components` view that normalizes caller input for its level and calls
//! `ApiClient::fetch`. Each documented endpoint gets its own method:
//!
//! ```no_run
//! # use hc_api_core::{ApiClient, ApiError};
//! # fn main() -> Result<(), ApiError> {
//! let client = ApiClient::new(Some("my_key"), Some("my_secret"))?;
//! let response = client.property().value(("43 Valmonte Plaza", "90274"))?;
//! let zips = client.zip().volatility(vec!["90274", "01960"])?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::marker::PhantomData;

use crate::client::ApiClient;
use crate::endpoints::component_mget_endpoint;
use crate::error::ApiError;
use crate::http::QueryParams;
use crate::identifier::{normalize, IdentifierInput, IdentifierKind};
use crate::output::OutputGenerator;
use crate::response::{RENTAL_REPORT_ENDPOINT, VALUE_REPORT_ENDPOINT};

/// Identifier level of a `Components` view.
pub trait Level {
    const KIND: IdentifierKind;
}

#[derive(Debug, Clone, Copy)]
pub struct PropertyLevel;

#[derive(Debug, Clone, Copy)]
pub struct BlockLevel;

#[derive(Debug, Clone, Copy)]
pub struct ZipLevel;

#[derive(Debug, Clone, Copy)]
pub struct MsaLevel;

impl Level for PropertyLevel {
    const KIND: IdentifierKind = IdentifierKind::Property;
}

impl Level for BlockLevel {
    const KIND: IdentifierKind = IdentifierKind::Block;
}

impl Level for ZipLevel {
    const KIND: IdentifierKind = IdentifierKind::Zip;
}

impl Level for MsaLevel {
    const KIND: IdentifierKind = IdentifierKind::Msa;
}

/// Endpoint methods for one identifier level.
pub struct Components<'a, O, L> {
    client: &'a ApiClient<O>,
    level: PhantomData<L>,
}

impl<O, L: Level> fmt::Debug for Components<'_, O, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Components")
            .field("level", &L::KIND)
            .finish_non_exhaustive()
    }
}

impl<'a, O: OutputGenerator, L: Level> Components<'a, O, L> {
    pub(crate) fn new(client: &'a ApiClient<O>) -> Self {
        Self {
            client,
            level: PhantomData,
        }
    }

    /// Normalize `input` for this level and fetch `endpoint`.
    pub fn fetch_component(
        &self,
        endpoint: &str,
        input: impl Into<IdentifierInput>,
    ) -> Result<O::Output, ApiError> {
        self.fetch_component_with(endpoint, input, QueryParams::new())
    }

    pub fn fetch_component_with(
        &self,
        endpoint: &str,
        input: impl Into<IdentifierInput>,
        query_params: QueryParams,
    ) -> Result<O::Output, ApiError> {
        let identifiers = normalize(L::KIND, input)?;
        self.client.fetch(endpoint, &identifiers, query_params)
    }

    /// Fetch several components in one request via `{level}/component_mget`.
    pub fn component_mget<S: AsRef<str>>(
        &self,
        input: impl Into<IdentifierInput>,
        components: &[S],
    ) -> Result<O::Output, ApiError> {
        if components.is_empty() {
            return Err(ApiError::InvalidInput(
                "at least one component is required".to_string(),
            ));
        }
        let joined = components
            .iter()
            .map(|component| component.as_ref())
            .collect::<Vec<&str>>()
            .join(",");
        let mut query_params = QueryParams::new();
        query_params.insert("components".to_string(), joined);
        self.fetch_component_with(&component_mget_endpoint(L::KIND), input, query_params)
    }
}

macro_rules! endpoint_methods {
    ($level:ty, $catalog:ident { $($method:ident => $endpoint:literal),* $(,)? }) => {
        #[doc = concat!("Every data endpoint of `", stringify!($level), "`, one per method.")]
        pub const $catalog: &[&str] = &[$($endpoint),*];

        impl<'a, O: OutputGenerator> Components<'a, O, $level> {
            $(
                #[doc = concat!("`", $endpoint, "`")]
                pub fn $method(&self, input: impl Into<IdentifierInput>) -> Result<O::Output, ApiError> {
                    self.fetch_component($endpoint, input)
                }
            )*
        }
    };
}

endpoint_methods!(PropertyLevel, PROPERTY_ENDPOINTS {
    block_histogram_baths => "property/block_histogram_baths",
    block_histogram_beds => "property/block_histogram_beds",
    block_histogram_building_area => "property/block_histogram_building_area",
    block_histogram_value => "property/block_histogram_value",
    block_histogram_value_sqft => "property/block_histogram_value_sqft",
    block_rental_value_distribution => "property/block_rental_value_distribution",
    block_value_distribution => "property/block_value_distribution",
    block_value_ts => "property/block_value_ts",
    block_value_ts_historical => "property/block_value_ts_historical",
    block_value_ts_forecast => "property/block_value_ts_forecast",
    census => "property/census",
    details => "property/details",
    flood => "property/flood",
    geocode => "property/geocode",
    ltv => "property/ltv",
    ltv_details => "property/ltv_details",
    mortgage_lien => "property/mortgage_lien",
    msa_details => "property/msa_details",
    msa_hpi_ts => "property/msa_hpi_ts",
    msa_hpi_ts_forecast => "property/msa_hpi_ts_forecast",
    msa_hpi_ts_historical => "property/msa_hpi_ts_historical",
    nod => "property/nod",
    owner_occupied => "property/owner_occupied",
    rental_value => "property/rental_value",
    rental_value_within_block => "property/rental_value_within_block",
    sales_history => "property/sales_history",
    school => "property/school",
    value => "property/value",
    value_forecast => "property/value_forecast",
    value_within_block => "property/value_within_block",
    zip_details => "property/zip_details",
    zip_hpi_forecast => "property/zip_hpi_forecast",
    zip_hpi_historical => "property/zip_hpi_historical",
    zip_hpi_ts => "property/zip_hpi_ts",
    zip_hpi_ts_forecast => "property/zip_hpi_ts_forecast",
    zip_hpi_ts_historical => "property/zip_hpi_ts_historical",
    zip_volatility => "property/zip_volatility",
});

endpoint_methods!(BlockLevel, BLOCK_ENDPOINTS {
    histogram_baths => "block/histogram_baths",
    histogram_beds => "block/histogram_beds",
    histogram_building_area => "block/histogram_building_area",
    histogram_value => "block/histogram_value",
    histogram_value_sqft => "block/histogram_value_sqft",
    rental_value_distribution => "block/rental_value_distribution",
    value_distribution => "block/value_distribution",
    value_ts => "block/value_ts",
    value_ts_forecast => "block/value_ts_forecast",
    value_ts_historical => "block/value_ts_historical",
});

endpoint_methods!(ZipLevel, ZIP_ENDPOINTS {
    details => "zip/details",
    hpi_forecast => "zip/hpi_forecast",
    hpi_historical => "zip/hpi_historical",
    hpi_ts => "zip/hpi_ts",
    hpi_ts_forecast => "zip/hpi_ts_forecast",
    hpi_ts_historical => "zip/hpi_ts_historical",
    volatility => "zip/volatility",
});

endpoint_methods!(MsaLevel, MSA_ENDPOINTS {
    details => "msa/details",
    hpi_ts => "msa/hpi_ts",
    hpi_ts_forecast => "msa/hpi_ts_forecast",
    hpi_ts_historical => "msa/hpi_ts_historical",
});

/// `report_type` of a value report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportType {
    #[default]
    Full,
    Summary,
}

impl ReportType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::Full => "full",
            ReportType::Summary => "summary",
        }
    }
}

/// `format` of a value or rental report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Json,
    Pdf,
    Xlsx,
    All,
}

impl ReportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Pdf => "pdf",
            ReportFormat::Xlsx => "xlsx",
            ReportFormat::All => "all",
        }
    }
}

impl<'a, O: OutputGenerator> Components<'a, O, PropertyLevel> {
    /// Value report for one address. Always a GET.
    pub fn value_report(
        &self,
        address: &str,
        zipcode: &str,
        report_type: ReportType,
        format: ReportFormat,
    ) -> Result<O::Output, ApiError> {
        let mut query_params = report_params(address, zipcode, format);
        query_params.insert("report_type".to_string(), report_type.as_str().to_string());
        self.client.fetch_synchronous(VALUE_REPORT_ENDPOINT, query_params)
    }

    /// Rental report for one address. Always a GET.
    pub fn rental_report(
        &self,
        address: &str,
        zipcode: &str,
        format: ReportFormat,
    ) -> Result<O::Output, ApiError> {
        self.client
            .fetch_synchronous(RENTAL_REPORT_ENDPOINT, report_params(address, zipcode, format))
    }
}

fn report_params(address: &str, zipcode: &str, format: ReportFormat) -> QueryParams {
    let mut query_params = QueryParams::new();
    query_params.insert("address".to_string(), address.to_string());
    query_params.insert("zipcode".to_string(), zipcode.to_string());
    query_params.insert("format".to_string(), format.as_str().to_string());
    query_params
}
