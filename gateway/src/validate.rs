//! Inbound payload validation.
//!
//! Each DTO has an explicit validation function that either returns the
//! strongly typed payload or a [`GatewayError::Validation`] listing every
//! violation. Nothing here touches the backend.

use std::collections::HashMap;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{GatewayError, Result};
use crate::timecodec;

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 1000;
/// The backend carries offsets as `int32`.
pub const MAX_OFFSET: u32 = i32::MAX as u32;

/// Numeric measurements every reading must carry.
pub const MEASUREMENT_FIELDS: [&str; 5] = [
    "temperature_c",
    "humidity_percent",
    "light_lux",
    "co2_ppm",
    "humidity_ratio",
];

const READING_FIELDS: [&str; 8] = [
    "source_id",
    "ts",
    "temperature_c",
    "humidity_percent",
    "light_lux",
    "co2_ppm",
    "humidity_ratio",
    "occupancy",
];
const LIST_QUERY_FIELDS: [&str; 5] = ["from", "to", "limit", "offset", "order"];
const AGGREGATE_QUERY_FIELDS: [&str; 3] = ["from", "to", "fields"];

// ------------------------------------------------------------------ //
//  Validated payloads                                                 //
// ------------------------------------------------------------------ //

/// Body of `POST /readings` and `PUT /readings/{id}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingInput {
    pub source_id: i64,
    pub ts: String,
    pub temperature_c: f64,
    pub humidity_percent: f64,
    pub light_lux: f64,
    pub co2_ppm: f64,
    pub humidity_ratio: f64,
    pub occupancy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: u32,
    pub offset: u32,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateQuery {
    pub from: String,
    pub to: String,
    pub fields: Option<String>,
}

// ------------------------------------------------------------------ //
//  Violation collector                                                //
// ------------------------------------------------------------------ //

#[derive(Default)]
struct Violations(Vec<String>);

impl Violations {
    fn push(&mut self, msg: impl Into<String>) {
        self.0.push(msg.into());
    }

    fn reject_unknown<'a>(&mut self, keys: impl IntoIterator<Item = &'a String>, allowed: &[&str]) {
        let mut unknown: Vec<&str> = keys
            .into_iter()
            .map(String::as_str)
            .filter(|k| !allowed.contains(k))
            .collect();
        unknown.sort_unstable();
        unknown.dedup();
        for key in unknown {
            self.push(format!("property {key} should not exist"));
        }
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T> {
        if self.0.is_empty() {
            Ok(value())
        } else {
            Err(GatewayError::Validation(self.0.join("; ")))
        }
    }
}

/// Index query pairs by key. Every key may appear at most once.
fn index_query<'a>(
    pairs: &'a [(String, String)],
    errs: &mut Violations,
) -> HashMap<&'a str, &'a String> {
    let mut params = HashMap::with_capacity(pairs.len());
    let mut repeated = Vec::new();
    for (key, value) in pairs {
        if params.insert(key.as_str(), value).is_some() && !repeated.contains(&key.as_str()) {
            repeated.push(key.as_str());
        }
    }
    repeated.sort_unstable();
    for key in repeated {
        errs.push(format!("property {key} must not be repeated"));
    }
    params
}

// ------------------------------------------------------------------ //
//  Field coercion                                                     //
// ------------------------------------------------------------------ //

/// A finite number, either a JSON number or a numeric string.
fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) if !s.trim().is_empty() => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// An integral number; `5` and `"5"` qualify, `5.5` does not.
fn coerce_integer(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let n = coerce_number(value)?;
    (n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64).then_some(n as i64)
}

fn iso_string(value: &Value) -> Option<&str> {
    value
        .as_str()
        .filter(|s| timecodec::parse_iso8601(s).is_some())
}

fn required_number(body: &Map<String, Value>, field: &str, errs: &mut Violations) -> f64 {
    match body.get(field) {
        None | Some(Value::Null) => {
            errs.push(format!("{field} is required"));
            0.0
        }
        Some(v) => coerce_number(v).unwrap_or_else(|| {
            errs.push(format!("{field} must be a finite number"));
            0.0
        }),
    }
}

fn bounded_integer(
    raw: Option<&String>,
    field: &str,
    default: u32,
    min: u32,
    max: u32,
    errs: &mut Violations,
) -> u32 {
    let Some(raw) = raw else {
        return default;
    };
    match coerce_integer(&Value::String(raw.clone())) {
        Some(n) if n < i64::from(min) => {
            errs.push(format!("{field} must not be less than {min}"));
            default
        }
        Some(n) if n > i64::from(max) => {
            errs.push(format!("{field} must not be greater than {max}"));
            default
        }
        Some(n) => n as u32,
        None => {
            errs.push(format!("{field} must be an integer number"));
            default
        }
    }
}

fn optional_iso(raw: Option<&String>, field: &str, errs: &mut Violations) -> Option<String> {
    let raw = raw?;
    if timecodec::parse_iso8601(raw).is_none() {
        errs.push(format!("{field} must be a valid ISO 8601 date string"));
    }
    Some(raw.clone())
}

fn required_iso(raw: Option<&String>, field: &str, errs: &mut Violations) -> String {
    if raw.is_none() {
        errs.push(format!("{field} is required"));
    }
    optional_iso(raw, field, errs).unwrap_or_default()
}

// ------------------------------------------------------------------ //
//  DTO validation                                                     //
// ------------------------------------------------------------------ //

/// Validate a create/update body.
pub fn validate_reading(body: &Value) -> Result<ReadingInput> {
    let Some(body) = body.as_object() else {
        return Err(GatewayError::Validation(
            "request body must be a JSON object".to_string(),
        ));
    };

    let mut errs = Violations::default();
    errs.reject_unknown(body.keys(), &READING_FIELDS);

    let source_id = match body.get("source_id") {
        None | Some(Value::Null) => 0,
        Some(v) => match coerce_integer(v) {
            Some(n) if n >= 0 => n,
            Some(_) => {
                errs.push("source_id must not be less than 0");
                0
            }
            None => {
                errs.push("source_id must be an integer number");
                0
            }
        },
    };

    let ts = match body.get("ts") {
        None | Some(Value::Null) => {
            errs.push("ts is required");
            String::new()
        }
        Some(v) => match iso_string(v) {
            Some(s) => s.to_string(),
            None => {
                errs.push("ts must be a valid ISO 8601 date string");
                String::new()
            }
        },
    };

    let [temperature_c, humidity_percent, light_lux, co2_ppm, humidity_ratio] =
        MEASUREMENT_FIELDS.map(|field| required_number(body, field, &mut errs));

    let occupancy = match body.get("occupancy") {
        Some(Value::Bool(b)) => *b,
        None | Some(Value::Null) => {
            errs.push("occupancy is required");
            false
        }
        Some(_) => {
            errs.push("occupancy must be a boolean value");
            false
        }
    };

    errs.finish(|| ReadingInput {
        source_id,
        ts,
        temperature_c,
        humidity_percent,
        light_lux,
        co2_ppm,
        humidity_ratio,
        occupancy,
    })
}

/// Validate the query string of `GET /readings`.
pub fn validate_list_query(pairs: &[(String, String)]) -> Result<ListQuery> {
    let mut errs = Violations::default();
    errs.reject_unknown(pairs.iter().map(|(k, _)| k), &LIST_QUERY_FIELDS);
    let params = index_query(pairs, &mut errs);
    let param = |key: &str| params.get(key).copied();

    let from = optional_iso(param("from"), "from", &mut errs);
    let to = optional_iso(param("to"), "to", &mut errs);
    let limit = bounded_integer(param("limit"), "limit", DEFAULT_LIMIT, 1, MAX_LIMIT, &mut errs);
    let offset = bounded_integer(param("offset"), "offset", 0, 0, MAX_OFFSET, &mut errs);

    let order = match param("order").map(String::as_str) {
        None | Some("asc") => SortOrder::Asc,
        Some("desc") => SortOrder::Desc,
        Some(_) => {
            errs.push("order must be one of the following values: asc, desc");
            SortOrder::Asc
        }
    };

    errs.finish(|| ListQuery {
        from,
        to,
        limit,
        offset,
        order,
    })
}

/// Validate the query string of `GET /readings/aggregate`.
pub fn validate_aggregate_query(pairs: &[(String, String)]) -> Result<AggregateQuery> {
    let mut errs = Violations::default();
    errs.reject_unknown(pairs.iter().map(|(k, _)| k), &AGGREGATE_QUERY_FIELDS);
    let params = index_query(pairs, &mut errs);
    let param = |key: &str| params.get(key).copied();

    let from = required_iso(param("from"), "from", &mut errs);
    let to = required_iso(param("to"), "to", &mut errs);
    let fields = param("fields").cloned();

    errs.finish(|| AggregateQuery { from, to, fields })
}

/// Validate a reading identifier taken from the path.
///
/// Only the hyphenated form is an id; the simple, braced and URN spellings
/// are rejected. The returned id is lowercased.
pub fn validate_id(id: &str) -> Result<String> {
    let invalid = || GatewayError::Validation("id must be a UUID".to_string());
    if id.len() != 36 {
        return Err(invalid());
    }
    Uuid::parse_str(id)
        .map(|uuid| uuid.hyphenated().to_string())
        .map_err(|_| invalid())
}
