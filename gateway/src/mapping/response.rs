//! Backend response messages → client-facing JSON shapes.

use std::collections::BTreeMap;

use proto::iot::{AggFunc, AggregateResponse, ListReadingsResponse, Reading, ReadingResponse};
use serde::Serialize;

use crate::error::{GatewayError, Result};
use crate::timecodec;
use crate::validate::AggregateQuery;

/// A reading as the REST API returns it. `ts` is ISO-8601, or `null` when
/// the backend sent none.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingView {
    pub id: String,
    pub source_id: i64,
    pub ts: Option<String>,
    pub temperature_c: f64,
    pub humidity_percent: f64,
    pub light_lux: f64,
    pub co2_ppm: f64,
    pub humidity_ratio: f64,
    pub occupancy: bool,
}

/// Body of the single-reading endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingEnvelope {
    pub reading: ReadingView,
}

/// Body of `GET /readings`. `total` counts the full match set, not the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingPage {
    pub items: Vec<ReadingView>,
    pub total: i64,
}

/// Function name → value for a single field.
pub type FieldAggregates = BTreeMap<&'static str, f64>;

/// Body of `GET /readings/aggregate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateView {
    pub from: String,
    pub to: String,
    pub values: BTreeMap<String, FieldAggregates>,
}

pub fn reading_view(reading: Reading) -> Result<ReadingView> {
    let ts = reading.ts.as_ref().map(timecodec::decode).transpose()?;
    Ok(ReadingView {
        id: reading.id,
        source_id: reading.source_id,
        ts,
        temperature_c: reading.temperature_c,
        humidity_percent: reading.humidity_percent,
        light_lux: reading.light_lux,
        co2_ppm: reading.co2_ppm,
        humidity_ratio: reading.humidity_ratio,
        occupancy: reading.occupancy,
    })
}

pub fn reading_envelope(resp: ReadingResponse) -> Result<ReadingEnvelope> {
    let reading = resp
        .reading
        .ok_or_else(|| GatewayError::Internal("backend response carried no reading".to_string()))?;
    Ok(ReadingEnvelope {
        reading: reading_view(reading)?,
    })
}

pub fn reading_page(resp: ListReadingsResponse) -> Result<ReadingPage> {
    let items = resp
        .readings
        .into_iter()
        .map(reading_view)
        .collect::<Result<Vec<_>>>()?;
    Ok(ReadingPage {
        items,
        total: resp.total,
    })
}

/// Key used for a backend aggregation function code.
pub fn func_key(code: i32) -> &'static str {
    match AggFunc::try_from(code) {
        Ok(AggFunc::Min) => "min",
        Ok(AggFunc::Max) => "max",
        Ok(AggFunc::Avg) => "avg",
        Ok(AggFunc::Sum) => "sum",
        Ok(AggFunc::Unspecified) | Err(_) => "unknown",
    }
}

/// Group the flat `(field, func, value)` list by field.
///
/// Only pairs the backend actually returned appear; `from`/`to` echo the
/// client's strings untouched.
pub fn aggregate_view(query: &AggregateQuery, resp: AggregateResponse) -> AggregateView {
    let mut values: BTreeMap<String, FieldAggregates> = BTreeMap::new();
    for v in resp.values {
        values
            .entry(v.field)
            .or_default()
            .insert(func_key(v.func), v.value);
    }
    AggregateView {
        from: query.from.clone(),
        to: query.to.clone(),
        values,
    }
}
