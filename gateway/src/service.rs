//! Readings gateway: validate → map request → backend call → map response.
//!
//! Every operation is a single linear pipeline over stack-local data. The
//! only suspension point is the backend call; dropping the returned future
//! (for example when the HTTP client goes away) cancels that call.

use std::sync::Arc;

use serde_json::Value;
use tonic::Status;
use tracing::{error, info, warn};

use crate::backend::ReadingBackend;
use crate::error::{ErrorCategory, GatewayError, Result};
use crate::mapping::{
    request,
    response::{self, AggregateView, ReadingEnvelope, ReadingPage},
};
use crate::validate;

pub struct ReadingsGateway {
    backend: Arc<dyn ReadingBackend>,
}

/// Log a backend failure and translate it for the client.
fn backend_failure(op: &'static str, status: Status) -> GatewayError {
    let err = GatewayError::from_status(&status);
    match err.category() {
        ErrorCategory::InternalError => {
            error!(op, code = ?status.code(), error = %status.message(), "backend call failed")
        }
        _ => warn!(op, code = ?status.code(), error = %status.message(), "backend rejected call"),
    }
    err
}

impl ReadingsGateway {
    pub fn new(backend: Arc<dyn ReadingBackend>) -> Self {
        Self { backend }
    }

    pub async fn create(&self, body: &Value) -> Result<ReadingEnvelope> {
        let input = validate::validate_reading(body)?;
        let req = request::create_request(&input)?;
        let resp = self
            .backend
            .create_reading(req)
            .await
            .map_err(|s| backend_failure("create", s))?;
        let out = response::reading_envelope(resp)?;
        info!(id = %out.reading.id, "reading created");
        Ok(out)
    }

    pub async fn get(&self, id: &str) -> Result<ReadingEnvelope> {
        let id = validate::validate_id(id)?;
        let resp = self
            .backend
            .get_reading(request::get_request(&id))
            .await
            .map_err(|s| backend_failure("get", s))?;
        response::reading_envelope(resp)
    }

    pub async fn update(&self, id: &str, body: &Value) -> Result<ReadingEnvelope> {
        let id = validate::validate_id(id)?;
        let input = validate::validate_reading(body)?;
        let req = request::update_request(&id, &input)?;
        let resp = self
            .backend
            .update_reading(req)
            .await
            .map_err(|s| backend_failure("update", s))?;
        info!(id, "reading updated");
        response::reading_envelope(resp)
    }

    /// Deleting an unknown id surfaces `NotFound` from the backend.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let id = validate::validate_id(id)?;
        let resp = self
            .backend
            .delete_reading(request::delete_request(&id))
            .await
            .map_err(|s| backend_failure("delete", s))?;
        info!(id, deleted = resp.deleted, "reading deleted");
        Ok(())
    }

    pub async fn list(&self, params: &[(String, String)]) -> Result<ReadingPage> {
        let query = validate::validate_list_query(params)?;
        let req = request::list_request(&query)?;
        let resp = self
            .backend
            .list_readings(req)
            .await
            .map_err(|s| backend_failure("list", s))?;
        response::reading_page(resp)
    }

    pub async fn aggregate(&self, params: &[(String, String)]) -> Result<AggregateView> {
        let query = validate::validate_aggregate_query(params)?;
        let req = request::aggregate_request(&query)?;
        let resp = self
            .backend
            .aggregate(req)
            .await
            .map_err(|s| backend_failure("aggregate", s))?;
        Ok(response::aggregate_view(&query, resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FakeReadingBackend;
    use proto::iot::{AggFunc, AggValue};
    use serde_json::json;

    fn gateway() -> (ReadingsGateway, FakeReadingBackend) {
        let fake = FakeReadingBackend::new();
        (ReadingsGateway::new(Arc::new(fake.clone())), fake)
    }

    fn body() -> Value {
        json!({
            "ts": "2023-11-14T22:13:20.000Z",
            "temperature_c": 21.5,
            "humidity_percent": 40,
            "light_lux": 100,
            "co2_ppm": 450,
            "humidity_ratio": 0.004,
            "occupancy": true
        })
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn create_round_trips_timestamp() {
        let (gw, fake) = gateway();
        let out = gw.create(&body()).await.unwrap();
        assert_eq!(out.reading.ts.as_deref(), Some("2023-11-14T22:13:20.000Z"));
        assert_eq!(out.reading.source_id, 0);

        let stored = fake.snapshot();
        assert_eq!(stored.len(), 1);
        let ts = stored[0].ts.clone().unwrap();
        assert_eq!((ts.seconds, ts.nanos), (1_700_000_000, 0));
    }

    #[tokio::test]
    async fn validation_failure_never_calls_backend() {
        let (gw, fake) = gateway();
        let mut bad = body();
        bad["extra"] = json!(1);
        assert!(matches!(gw.create(&bad).await, Err(GatewayError::Validation(_))));
        assert!(matches!(gw.get("not-a-uuid").await, Err(GatewayError::Validation(_))));
        assert!(matches!(
            gw.list(&params(&[("limit", "0")])).await,
            Err(GatewayError::Validation(_))
        ));
        assert!(matches!(gw.aggregate(&[]).await, Err(GatewayError::Validation(_))));
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn backend_not_found_is_mapped() {
        let (gw, _fake) = gateway();
        let err = gw.remove("550e8400-e29b-41d4-a716-446655440000").await.unwrap_err();
        assert_eq!(err, GatewayError::NotFound("Not found".into()));
    }

    #[tokio::test]
    async fn backend_failure_is_mapped() {
        let (gw, fake) = gateway();
        fake.fail_next(Status::internal("db down"));
        let err = gw.list(&[]).await.unwrap_err();
        assert_eq!(err, GatewayError::Internal("db down".into()));
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn update_then_get() {
        let (gw, _fake) = gateway();
        let id = gw.create(&body()).await.unwrap().reading.id;

        let mut changed = body();
        changed["co2_ppm"] = json!(900);
        changed["ts"] = json!("2023-11-14T22:13:21.500Z");
        gw.update(&id, &changed).await.unwrap();

        let got = gw.get(&id).await.unwrap().reading;
        assert_eq!(got.co2_ppm, 900.0);
        assert_eq!(got.ts.as_deref(), Some("2023-11-14T22:13:21.500Z"));
    }

    #[tokio::test]
    async fn aggregate_requests_all_funcs_and_groups() {
        let (gw, fake) = gateway();
        fake.set_aggregate_values(vec![
            AggValue {
                field: "temperature_c".into(),
                func: AggFunc::Avg as i32,
                value: 21.5,
            },
            AggValue {
                field: "co2_ppm".into(),
                func: AggFunc::Max as i32,
                value: 900.0,
            },
        ]);
        let out = gw
            .aggregate(&params(&[
                ("from", "2023-11-14T00:00:00.000Z"),
                ("to", "2023-11-15T00:00:00.000Z"),
                ("fields", "temperature_c,co2_ppm"),
            ]))
            .await
            .unwrap();

        let sent = fake.last_aggregate_request().unwrap();
        assert_eq!(sent.fields, vec!["temperature_c", "co2_ppm"]);
        assert_eq!(sent.funcs, vec![1, 2, 3, 4]);
        assert_eq!(out.values["temperature_c"]["avg"], 21.5);
        assert_eq!(out.values["co2_ppm"]["max"], 900.0);
        assert!(!out.values["co2_ppm"].contains_key("min"));
    }
}
