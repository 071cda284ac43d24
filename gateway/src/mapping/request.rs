//! Validated REST input → backend request messages.

use proto::iot::{
    AggFunc, AggregateRequest, CreateReadingRequest, DeleteReadingRequest, GetReadingRequest,
    ListReadingsRequest, Reading, UpdateReadingRequest,
};

use crate::error::Result;
use crate::timecodec;
use crate::validate::{AggregateQuery, ListQuery, ReadingInput};

/// Every aggregate call asks for all four functions; clients only pick fields.
pub const REQUESTED_FUNCS: [AggFunc; 4] = [AggFunc::Min, AggFunc::Max, AggFunc::Avg, AggFunc::Sum];

fn reading_payload(input: &ReadingInput) -> Result<Reading> {
    Ok(Reading {
        // Assigned by the backend.
        id: String::new(),
        source_id: input.source_id,
        ts: Some(timecodec::encode(&input.ts)?),
        temperature_c: input.temperature_c,
        humidity_percent: input.humidity_percent,
        light_lux: input.light_lux,
        co2_ppm: input.co2_ppm,
        humidity_ratio: input.humidity_ratio,
        occupancy: input.occupancy,
    })
}

pub fn create_request(input: &ReadingInput) -> Result<CreateReadingRequest> {
    Ok(CreateReadingRequest {
        reading: Some(reading_payload(input)?),
    })
}

pub fn get_request(id: &str) -> GetReadingRequest {
    GetReadingRequest { id: id.to_string() }
}

pub fn update_request(id: &str, input: &ReadingInput) -> Result<UpdateReadingRequest> {
    Ok(UpdateReadingRequest {
        id: id.to_string(),
        reading: Some(reading_payload(input)?),
    })
}

pub fn delete_request(id: &str) -> DeleteReadingRequest {
    DeleteReadingRequest { id: id.to_string() }
}

/// Absent bounds stay `None` so the backend applies its own range defaults.
pub fn list_request(query: &ListQuery) -> Result<ListReadingsRequest> {
    Ok(ListReadingsRequest {
        from_ts: query.from.as_deref().map(timecodec::encode).transpose()?,
        to_ts: query.to.as_deref().map(timecodec::encode).transpose()?,
        limit: query.limit as i32,
        offset: query.offset as i32,
        order: query.order.as_str().to_string(),
    })
}

pub fn aggregate_request(query: &AggregateQuery) -> Result<AggregateRequest> {
    Ok(AggregateRequest {
        from_ts: Some(timecodec::encode(&query.from)?),
        to_ts: Some(timecodec::encode(&query.to)?),
        fields: query.fields.as_deref().map(split_fields).unwrap_or_default(),
        funcs: REQUESTED_FUNCS.iter().map(|f| *f as i32).collect(),
    })
}

/// Split a comma separated field list, trimming tokens and dropping empty ones.
/// Order and duplicates are preserved.
pub fn split_fields(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
