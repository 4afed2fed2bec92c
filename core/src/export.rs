//! Flattening API results into tabular rows.
//!
//! # Design
//! An export turns the JSON array of one (usually `component_mget`) response
//! into one table per component. Each table row is a flat JSON object; file
//! formats are left to the caller. The pipeline is:
//!
//! 1. `clean_item`: replace every component envelope with its `result`.
//! 2. `worksheet_keys`: pick the component names from the first item.
//! 3. `endpoint_rows`: reshape each component's result into rows, with a few
//!    endpoints getting special treatment, then copy identifier columns from
//!    the result-info block onto every row.
//! 4. `ExportTable::from_rows`: order columns (identifiers first) and render
//!    cells.
//!
//! Nested objects are flattened one level with `_-_` between the parent and
//! child key so `snake_to_title` can render `"Single Family - Median Price"`.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ApiError;
use crate::identifier::IdentifierKind;
use crate::response::ApiResponse;

pub type Row = Map<String, Value>;

pub const FLATTEN_SEPARATOR: &str = "_-_";

/// Sheet titles are capped at this many characters.
pub const MAX_TITLE_LEN: usize = 31;

/// Identifier columns, in display order, ahead of all data columns.
pub const LEADING_COLUMNS: &[&str] = &[
    "address",
    "unit",
    "city",
    "state",
    "zipcode",
    "slug",
    "block_id",
    "msa",
    "num_bins",
    "property_type",
    "client_value",
    "client_value_sqft",
    "meta",
];

/// Request-only identifier keys the API does not echo back in the
/// result-info block.
const REQUEST_ONLY_KEYS: &[&str] = &["client_value", "client_value_sqft", "num_bins", "property_type"];

const WITHIN_BLOCK_KEYS: &[&str] = &[
    "housecanary_value_percentile_range",
    "housecanary_value_sqft_percentile_range",
    "client_value_percentile_range",
    "client_value_sqft_percentile_range",
];

/// Flatten one level of `data` under each of `top_level_keys`.
///
/// `{"a": {"b": 1}}` becomes `{"a_-_b": 1}`. A null or missing value becomes
/// `{top: null}`; any other non-object value is kept under `top`. Deeper
/// levels are left as they are.
pub fn flatten_top_level_keys(data: &Row, top_level_keys: &[&str]) -> Row {
    let mut flat = Row::new();
    for top in top_level_keys {
        match data.get(*top) {
            Some(Value::Object(nested)) => {
                for (key, value) in nested {
                    flat.insert(format!("{top}{FLATTEN_SEPARATOR}{key}"), value.clone());
                }
            }
            None | Some(Value::Null) => {
                flat.insert(top.to_string(), Value::Null);
            }
            Some(other) => {
                flat.insert(top.to_string(), other.clone());
            }
        }
    }
    flat
}

/// `"single_family"` to `"Single Family"`. Each word gets an uppercase first
/// letter and lowercase rest.
pub fn snake_to_title(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// `"Single Family"` to `"single_family"`.
pub fn title_to_snake(key: &str) -> String {
    key.split(' ')
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Render a value for a single cell. Lists and maps become JSON text.
pub fn cell_value(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        other => other.clone(),
    }
}

/// Sheet title for an endpoint: `"msa/details"` becomes `"MSA Details"`.
pub fn worksheet_title(endpoint: &str) -> String {
    let leaf = endpoint.split_once('/').map_or(endpoint, |(_, leaf)| leaf);
    let title = match snake_to_title(leaf).as_str() {
        "Msa Details" => "MSA Details".to_string(),
        other => other.to_string(),
    };
    title.chars().take(MAX_TITLE_LEN).collect()
}

/// Component names of `item`, sorted, without the info block and `meta`.
pub fn worksheet_keys(item: &Row, result_info_key: &str) -> Vec<String> {
    let mut keys: Vec<String> = item
        .keys()
        .filter(|key| key.as_str() != result_info_key && key.as_str() != "meta")
        .cloned()
        .collect();
    keys.sort();
    keys
}

/// Replace each component envelope in `item` with its `result`.
pub fn clean_item(item: &Value, result_info_key: &str) -> Result<Row, ApiError> {
    let object = item.as_object().ok_or_else(|| {
        ApiError::DeserializationError(format!("expected an object per item, got {item}"))
    })?;
    let mut cleaned = Row::new();
    for (key, value) in object {
        let cleaned_value = if key == result_info_key || key == "meta" {
            value.clone()
        } else {
            value.get("result").cloned().unwrap_or(Value::Null)
        };
        cleaned.insert(key.clone(), cleaned_value);
    }
    if !cleaned.contains_key(result_info_key) {
        cleaned.insert(result_info_key.to_string(), Value::Object(Row::new()));
    }
    Ok(cleaned)
}

/// Rows for `endpoint` across all cleaned items.
///
/// `identifier_keys` are the keys the caller requested with (copied from the
/// result-info block onto each row). `extra_identifiers[i]`, when present,
/// is merged into every row of item `i`.
pub fn endpoint_rows(
    endpoint: &str,
    items: &[Row],
    result_info_key: &str,
    identifier_keys: &[&str],
    extra_identifiers: &[Row],
) -> Vec<Row> {
    let mut rows = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        let extra = extra_identifiers.get(idx);
        for mut row in item_rows(endpoint, item) {
            set_identifier_fields(&mut row, item, result_info_key, identifier_keys, extra);
            rows.push(row);
        }
    }
    rows
}

fn item_rows(endpoint: &str, item: &Row) -> Vec<Row> {
    let data = match item.get(endpoint) {
        None | Some(Value::Null) => return vec![Row::new()],
        Some(data) => data,
    };
    let empty = Row::new();
    let object = data.as_object().unwrap_or(&empty);

    match endpoint {
        "property/value" => vec![object
            .get("value")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()],
        "property/details" => vec![flatten_top_level_keys(object, &["property", "assessment"])],
        "property/school" => school_rows(object),
        "property/value_forecast" => {
            let row: Row = object
                .iter()
                .map(|(month, forecast)| {
                    let value = forecast.get("value").cloned().unwrap_or(Value::Null);
                    (month.clone(), value)
                })
                .collect();
            vec![row]
        }
        "property/value_within_block" | "property/rental_value_within_block" => {
            vec![flatten_top_level_keys(object, WITHIN_BLOCK_KEYS)]
        }
        "property/zip_details" | "zip/details" => {
            vec![flatten_top_level_keys(object, &["multi_family", "single_family"])]
        }
        "property/geocode" => vec![item
            .get("address_info")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()],
        _ => generic_rows(endpoint, data),
    }
}

fn school_rows(data: &Row) -> Vec<Row> {
    let Some(Value::Object(by_type)) = data.get("school") else {
        return Vec::new();
    };
    let mut rows = Vec::new();
    for (school_type, schools) in by_type {
        for school in schools.as_array().into_iter().flatten() {
            let Some(school) = school.as_object() else {
                continue;
            };
            let mut row = school.clone();
            row.insert("school_type".to_string(), Value::String(school_type.clone()));
            row.insert(
                "school_address".to_string(),
                school.get("address").cloned().unwrap_or(Value::Null),
            );
            row.insert(
                "school_zipcode".to_string(),
                school.get("zipcode").cloned().unwrap_or(Value::Null),
            );
            rows.push(row);
        }
    }
    rows
}

fn generic_rows(endpoint: &str, data: &Value) -> Vec<Row> {
    match data {
        Value::Object(object) => vec![object.clone()],
        Value::Array(elements) => elements
            .iter()
            .filter_map(|element| match element {
                Value::Object(object) => Some(object.clone()),
                other => {
                    warn!(endpoint, element = %other, "skipping non-object list element");
                    None
                }
            })
            .collect(),
        scalar => {
            let mut row = Row::new();
            row.insert("value".to_string(), scalar.clone());
            vec![row]
        }
    }
}

fn set_identifier_fields(
    row: &mut Row,
    item: &Row,
    result_info_key: &str,
    identifier_keys: &[&str],
    extra: Option<&Row>,
) {
    let result_info = item.get(result_info_key);
    for key in identifier_keys {
        if *key == "meta" {
            row.insert("meta".to_string(), item.get("meta").cloned().unwrap_or(Value::Null));
        } else if !REQUEST_ONLY_KEYS.contains(key) {
            let value = result_info
                .and_then(|info| info.get(*key))
                .cloned()
                .unwrap_or(Value::Null);
            row.insert(key.to_string(), value);
        }
    }
    if let Some(extra) = extra {
        row.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Every key across `rows`: `leading` keys that occur first, in the given
/// order, then the rest sorted.
pub fn column_keys(rows: &[Row], leading: &[&str]) -> Vec<String> {
    let mut all: Vec<&String> = rows.iter().flat_map(|row| row.keys()).collect();
    all.sort();
    all.dedup();

    let mut keys: Vec<String> = leading
        .iter()
        .filter(|key| all.iter().any(|k| k.as_str() == **key))
        .map(|key| key.to_string())
        .collect();
    keys.extend(
        all.into_iter()
            .filter(|key| !leading.contains(&key.as_str()))
            .cloned(),
    );
    keys
}

/// One rendered table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportTable {
    pub title: String,
    /// Snake-case keys, in column order.
    pub keys: Vec<String>,
    /// Title-case column headers.
    pub headers: Vec<String>,
    /// Cells per row. Missing keys render as `""`.
    pub rows: Vec<Vec<Value>>,
}

impl ExportTable {
    /// Lay out `rows` with identifier columns (and any `extra_keys`) first.
    pub fn from_rows(title: impl Into<String>, rows: &[Row], extra_keys: &[&str]) -> Self {
        let leading: Vec<&str> = LEADING_COLUMNS.iter().copied().chain(extra_keys.iter().copied()).collect();
        let keys = column_keys(rows, &leading);
        let headers = keys.iter().map(|key| snake_to_title(key)).collect();
        let rows = rows
            .iter()
            .map(|row| {
                keys.iter()
                    .map(|key| {
                        row.get(key)
                            .map(cell_value)
                            .unwrap_or_else(|| Value::String(String::new()))
                    })
                    .collect()
            })
            .collect();
        Self {
            title: title.into(),
            keys,
            headers,
            rows,
        }
    }
}

/// One table per component of `items` (the JSON array of a response at
/// `level`).
pub fn export_tables(
    items: &[Value],
    level: IdentifierKind,
    identifier_keys: &[&str],
    extra_identifiers: &[Row],
) -> Result<Vec<ExportTable>, ApiError> {
    let info_key = level.result_info_key();
    let cleaned = items
        .iter()
        .map(|item| clean_item(item, info_key))
        .collect::<Result<Vec<_>, _>>()?;
    let Some(first) = cleaned.first() else {
        return Ok(Vec::new());
    };

    let extra_keys: Vec<&str> = extra_identifiers
        .first()
        .map(|row| row.keys().map(String::as_str).collect())
        .unwrap_or_default();

    Ok(worksheet_keys(first, info_key)
        .iter()
        .map(|endpoint| {
            let rows = endpoint_rows(endpoint, &cleaned, info_key, identifier_keys, extra_identifiers);
            ExportTable::from_rows(worksheet_title(endpoint), &rows, &extra_keys)
        })
        .collect())
}

/// `export_tables` over a typed response. Report responses export nothing.
pub fn response_tables(
    response: &ApiResponse,
    identifier_keys: &[&str],
    extra_identifiers: &[Row],
) -> Result<Vec<ExportTable>, ApiError> {
    let (Some(level), Some(items)) = (response.kind().identifier_kind(), response.json().as_array())
    else {
        return Ok(Vec::new());
    };
    export_tables(items, level, identifier_keys, extra_identifiers)
}
