//! Typed per-identifier results.
//!
//! Every element of an endpoint's JSON array describes one requested
//! identifier:
//!
//! ```json
//! {
//!   "address_info": {"address": "47 Perley Ave", "zipcode": "01960", ...},
//!   "meta": "caller tag",
//!   "property/value": {"api_code": 0, "api_code_description": "ok", "result": {...}}
//! }
//! ```
//!
//! The identity block (`address_info`, `block_info`, `zipcode_info`,
//! `msa_info`) becomes the object's identity fields. Every other key except
//! `meta` is one component's result.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::identifier::IdentifierKind;

/// `api_code` of a component that succeeded.
pub const BIZ_CODE_OK: i64 = 0;

/// The result of one component (endpoint) for one identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentResult {
    pub component_name: String,
    /// The endpoint's `result` payload. `Null` when the component failed.
    pub json_data: Value,
    pub api_code: i64,
    pub api_code_description: String,
}

impl ComponentResult {
    pub fn has_error(&self) -> bool {
        self.api_code > BIZ_CODE_OK
    }

    pub fn error(&self) -> Option<&str> {
        self.has_error().then_some(self.api_code_description.as_str())
    }
}

#[derive(Deserialize)]
struct RawComponent {
    api_code: i64,
    #[serde(default)]
    api_code_description: Option<String>,
    #[serde(default)]
    result: Value,
}

/// One erroring component of an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentError {
    pub component_name: String,
    pub description: String,
}

/// Business errors of one requested identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectError {
    /// Address, block id, zipcode or MSA (falling back to `meta`).
    pub identity: String,
    pub components: Vec<ComponentError>,
}

impl ObjectError {
    /// All component descriptions joined with `". "`.
    pub fn message(&self) -> String {
        self.components
            .iter()
            .map(|c| c.description.as_str())
            .collect::<Vec<_>>()
            .join(". ")
    }
}

/// Shared behavior of Property, Block, ZipCode and Msa.
pub trait ApiObject {
    fn component_results(&self) -> &[ComponentResult];

    fn meta(&self) -> Option<&Value>;

    /// Primary identity value, if the API returned one.
    fn primary(&self) -> Option<&str>;

    fn type_label(&self) -> &'static str;

    /// Primary identity, else `meta`, else the type label.
    fn identity(&self) -> String {
        if let Some(primary) = self.primary().filter(|p| !p.is_empty()) {
            return primary.to_string();
        }
        match self.meta() {
            Some(Value::String(meta)) if !meta.is_empty() => meta.clone(),
            Some(Value::Null) | None => self.type_label().to_string(),
            Some(Value::String(_)) => self.type_label().to_string(),
            Some(other) => other.to_string(),
        }
    }

    fn component(&self, name: &str) -> Option<&ComponentResult> {
        self.component_results()
            .iter()
            .find(|c| c.component_name == name)
    }

    /// True if any component reported `api_code > 0`.
    fn has_error(&self) -> bool {
        self.component_results().iter().any(ComponentResult::has_error)
    }

    fn get_errors(&self) -> Vec<ComponentError> {
        self.component_results()
            .iter()
            .filter(|c| c.has_error())
            .map(|c| ComponentError {
                component_name: c.component_name.clone(),
                description: c.api_code_description.clone(),
            })
            .collect()
    }
}

/// A single address.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Property {
    pub address: Option<String>,
    pub address_full: Option<String>,
    pub block_id: Option<String>,
    pub city: Option<String>,
    pub county_fips: Option<String>,
    pub geo_precision: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub msa: Option<String>,
    pub slug: Option<String>,
    pub state: Option<String>,
    pub unit: Option<String>,
    pub zipcode: Option<String>,
    pub zipcode_plus4: Option<String>,
    #[serde(skip)]
    pub meta: Option<Value>,
    #[serde(skip)]
    pub component_results: Vec<ComponentResult>,
}

/// A single census block.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Block {
    pub block_id: Option<String>,
    pub num_bins: Option<Value>,
    pub property_type: Option<String>,
    #[serde(skip)]
    pub meta: Option<Value>,
    #[serde(skip)]
    pub component_results: Vec<ComponentResult>,
}

/// A single zipcode.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ZipCode {
    pub zipcode: Option<String>,
    #[serde(skip)]
    pub meta: Option<Value>,
    #[serde(skip)]
    pub component_results: Vec<ComponentResult>,
}

/// A single metropolitan statistical area.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Msa {
    pub msa: Option<String>,
    #[serde(skip)]
    pub meta: Option<Value>,
    #[serde(skip)]
    pub component_results: Vec<ComponentResult>,
}

macro_rules! impl_api_object {
    ($ty:ty, $primary:ident, $label:literal) => {
        impl ApiObject for $ty {
            fn component_results(&self) -> &[ComponentResult] {
                &self.component_results
            }

            fn meta(&self) -> Option<&Value> {
                self.meta.as_ref()
            }

            fn primary(&self) -> Option<&str> {
                self.$primary.as_deref()
            }

            fn type_label(&self) -> &'static str {
                $label
            }
        }
    };
}

impl_api_object!(Property, address, "PropertyObject");
impl_api_object!(Block, block_id, "BlockObject");
impl_api_object!(ZipCode, zipcode, "ZipCodeObject");
impl_api_object!(Msa, msa, "MsaObject");

/// One deserialized response item.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainObject {
    Property(Property),
    Block(Block),
    ZipCode(ZipCode),
    Msa(Msa),
}

impl DomainObject {
    /// Build the object for `kind` from one element of the response array.
    pub fn from_json(kind: IdentifierKind, item: &Value) -> Result<Self, ApiError> {
        let object = item.as_object().ok_or_else(|| {
            ApiError::DeserializationError(format!("expected an object per item, got {item}"))
        })?;
        let info_key = kind.result_info_key();
        let info = object.get(info_key).ok_or_else(|| {
            ApiError::DeserializationError(format!("item is missing `{info_key}`"))
        })?;
        let meta = object.get("meta").cloned();
        let component_results = component_results(object, info_key)?;

        let decoded = match kind {
            IdentifierKind::Property => DomainObject::Property(Property {
                meta,
                component_results,
                ..identity(info)?
            }),
            IdentifierKind::Block => DomainObject::Block(Block {
                meta,
                component_results,
                ..identity(info)?
            }),
            IdentifierKind::Zip => DomainObject::ZipCode(ZipCode {
                meta,
                component_results,
                ..identity(info)?
            }),
            IdentifierKind::Msa => DomainObject::Msa(Msa {
                meta,
                component_results,
                ..identity(info)?
            }),
        };
        Ok(decoded)
    }

    fn inner(&self) -> &dyn ApiObject {
        match self {
            DomainObject::Property(p) => p,
            DomainObject::Block(b) => b,
            DomainObject::ZipCode(z) => z,
            DomainObject::Msa(m) => m,
        }
    }

    pub fn as_property(&self) -> Option<&Property> {
        match self {
            DomainObject::Property(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            DomainObject::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_zipcode(&self) -> Option<&ZipCode> {
        match self {
            DomainObject::ZipCode(z) => Some(z),
            _ => None,
        }
    }

    pub fn as_msa(&self) -> Option<&Msa> {
        match self {
            DomainObject::Msa(m) => Some(m),
            _ => None,
        }
    }
}

impl ApiObject for DomainObject {
    fn component_results(&self) -> &[ComponentResult] {
        self.inner().component_results()
    }

    fn meta(&self) -> Option<&Value> {
        self.inner().meta()
    }

    fn primary(&self) -> Option<&str> {
        self.inner().primary()
    }

    fn type_label(&self) -> &'static str {
        self.inner().type_label()
    }
}

fn identity<T: for<'de> Deserialize<'de>>(info: &Value) -> Result<T, ApiError> {
    T::deserialize(info).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

fn component_results(
    object: &Map<String, Value>,
    info_key: &str,
) -> Result<Vec<ComponentResult>, ApiError> {
    object
        .iter()
        .filter(|(key, _)| key.as_str() != info_key && key.as_str() != "meta")
        .map(|(key, value)| {
            let raw = RawComponent::deserialize(value).map_err(|e| {
                ApiError::DeserializationError(format!("component `{key}`: {e}"))
            })?;
            Ok(ComponentResult {
                component_name: key.clone(),
                json_data: raw.result,
                api_code: raw.api_code,
                api_code_description: raw.api_code_description.unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn property_item() -> Value {
        json!({
            "property/value": {
                "api_code_description": "ok",
                "api_code": 0,
                "result": {"price_pr": 2938.0, "price_lwr": 2160.0, "price_mean": 2296.0, "fsd": 0.17}
            },
            "address_info": {
                "city": "Peabody", "county_fips": "25009", "zipcode": "01960",
                "address_full": "47 Perley Ave Peabody MA 01960", "state": "MA",
                "zipcode_plus4": "3459", "address": "47 Perley Ave",
                "lat": 42.549, "lng": -71.029, "unit": null
            },
            "meta": "Test Meta"
        })
    }

    #[test]
    fn property_from_json() {
        let object = DomainObject::from_json(IdentifierKind::Property, &property_item()).unwrap();
        let prop = object.as_property().unwrap();
        assert_eq!(prop.address.as_deref(), Some("47 Perley Ave"));
        assert_eq!(prop.county_fips.as_deref(), Some("25009"));
        assert_eq!(prop.zipcode.as_deref(), Some("01960"));
        assert_eq!(prop.zipcode_plus4.as_deref(), Some("3459"));
        assert_eq!(prop.city.as_deref(), Some("Peabody"));
        assert_eq!(prop.lat, Some(42.549));
        assert_eq!(prop.lng, Some(-71.029));
        assert_eq!(prop.unit, None);
        assert_eq!(prop.block_id, None);
        assert_eq!(prop.meta, Some(json!("Test Meta")));
        assert_eq!(prop.component_results.len(), 1);

        let value = &prop.component_results[0];
        assert_eq!(value.component_name, "property/value");
        assert_eq!(value.api_code, 0);
        assert_eq!(value.api_code_description, "ok");
        assert_eq!(
            value.json_data,
            json!({"price_pr": 2938.0, "price_lwr": 2160.0, "price_mean": 2296.0, "fsd": 0.17})
        );
        assert!(!object.has_error());
    }

    #[test]
    fn every_non_identity_key_is_a_component() {
        let mut item = property_item();
        item["property/census"] = json!({
            "api_code_description": "ok", "api_code": 0, "result": {"tract": "2102.00"}
        });
        let object = DomainObject::from_json(IdentifierKind::Property, &item).unwrap();
        let names: Vec<_> = object
            .component_results()
            .iter()
            .map(|c| c.component_name.as_str())
            .collect();
        assert_eq!(names, vec!["property/census", "property/value"]);
        assert!(object.component("property/census").is_some());
    }

    #[test]
    fn business_errors_are_aggregated_per_object() {
        let item = json!({
            "zipcode_info": {"zipcode": "00000"},
            "zip/details": {"api_code": 1001, "api_code_description": "bad zip", "result": null},
            "zip/volatility": {"api_code": 1002, "api_code_description": "no data", "result": null},
            "zip/hpi_ts": {"api_code": 0, "api_code_description": "ok", "result": []}
        });
        let object = DomainObject::from_json(IdentifierKind::Zip, &item).unwrap();
        assert!(object.has_error());
        let errors = object.get_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].component_name, "zip/details");
        assert_eq!(errors[0].description, "bad zip");
        assert_eq!(errors[1].description, "no data");
    }

    #[test]
    fn block_and_msa_identity() {
        let block = DomainObject::from_json(
            IdentifierKind::Block,
            &json!({
                "block_info": {"block_id": "060750615003005", "num_bins": 5, "property_type": "SFD"},
                "block/value_ts": {"api_code": 0, "api_code_description": "ok", "result": []}
            }),
        )
        .unwrap();
        let b = block.as_block().unwrap();
        assert_eq!(b.block_id.as_deref(), Some("060750615003005"));
        assert_eq!(b.num_bins, Some(json!(5)));
        assert_eq!(b.property_type.as_deref(), Some("SFD"));
        assert_eq!(block.identity(), "060750615003005");

        let msa = DomainObject::from_json(
            IdentifierKind::Msa,
            &json!({"msa_info": {"msa": "41860"}, "meta": "SF"}),
        )
        .unwrap();
        assert_eq!(msa.as_msa().unwrap().msa.as_deref(), Some("41860"));
        assert!(msa.component_results().is_empty());
    }

    #[test]
    fn identity_falls_back_to_meta_then_label() {
        let with_meta = DomainObject::from_json(
            IdentifierKind::Property,
            &json!({"address_info": {"address": null}, "meta": "row-7"}),
        )
        .unwrap();
        assert_eq!(with_meta.identity(), "row-7");

        let bare = DomainObject::from_json(IdentifierKind::Zip, &json!({"zipcode_info": {}}));
        assert_eq!(bare.unwrap().identity(), "ZipCodeObject");
    }

    #[test]
    fn missing_identity_block_is_an_error() {
        let err = DomainObject::from_json(IdentifierKind::Msa, &json!({"meta": "x"})).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn malformed_component_is_an_error() {
        let err = DomainObject::from_json(
            IdentifierKind::Zip,
            &json!({"zipcode_info": {"zipcode": "90274"}, "zip/details": "oops"}),
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn object_error_message_joins_descriptions() {
        let err = ObjectError {
            identity: "90274".to_string(),
            components: vec![
                ComponentError {
                    component_name: "zip/details".to_string(),
                    description: "bad zip".to_string(),
                },
                ComponentError {
                    component_name: "zip/hpi_ts".to_string(),
                    description: "no data".to_string(),
                },
            ],
        };
        assert_eq!(err.message(), "bad zip. no data");
    }
}
