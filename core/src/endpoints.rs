//! Endpoint catalogs per identifier level.

use crate::identifier::IdentifierKind;

pub use crate::components::{BLOCK_ENDPOINTS, MSA_ENDPOINTS, PROPERTY_ENDPOINTS, ZIP_ENDPOINTS};

/// Every data endpoint at `level`, excluding `component_mget` and reports.
pub fn all_endpoints(level: IdentifierKind) -> &'static [&'static str] {
    match level {
        IdentifierKind::Property => PROPERTY_ENDPOINTS,
        IdentifierKind::Block => BLOCK_ENDPOINTS,
        IdentifierKind::Zip => ZIP_ENDPOINTS,
        IdentifierKind::Msa => MSA_ENDPOINTS,
    }
}

/// Key of the identity block in items returned at `level`.
pub fn result_info_key(level: IdentifierKind) -> &'static str {
    level.result_info_key()
}

/// `{level}/component_mget`.
pub fn component_mget_endpoint(level: IdentifierKind) -> String {
    format!("{}/component_mget", level.label())
}
