//! ReadingBackend trait and implementations.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use proto::iot::{
    reading_service_client::ReadingServiceClient, AggValue, AggregateRequest, AggregateResponse,
    CreateReadingRequest, DeleteReadingRequest, DeleteReadingResponse, GetReadingRequest,
    ListReadingsRequest, ListReadingsResponse, Reading, ReadingResponse, UpdateReadingRequest,
};
use proto::Timestamp;
use tonic::{transport::Channel, Status};
use tracing::info;
use uuid::Uuid;

// ------------------------------------------------------------------ //
//  Trait                                                              //
// ------------------------------------------------------------------ //

/// The readings backend as seen by the gateway: one method per RPC.
#[async_trait]
pub trait ReadingBackend: Send + Sync {
    async fn create_reading(&self, req: CreateReadingRequest) -> Result<ReadingResponse, Status>;
    async fn get_reading(&self, req: GetReadingRequest) -> Result<ReadingResponse, Status>;
    async fn update_reading(&self, req: UpdateReadingRequest) -> Result<ReadingResponse, Status>;
    async fn delete_reading(
        &self,
        req: DeleteReadingRequest,
    ) -> Result<DeleteReadingResponse, Status>;
    async fn list_readings(&self, req: ListReadingsRequest)
        -> Result<ListReadingsResponse, Status>;
    async fn aggregate(&self, req: AggregateRequest) -> Result<AggregateResponse, Status>;
}

// ------------------------------------------------------------------ //
//  GrpcReadingBackend (production)                                    //
// ------------------------------------------------------------------ //

/// tonic client for the datamanager `ReadingService`.
pub struct GrpcReadingBackend {
    client: ReadingServiceClient<Channel>,
}

impl GrpcReadingBackend {
    /// Build a client for `url`. The channel connects on first use, so a
    /// backend that is down at startup surfaces as per-request failures.
    pub fn connect(url: &str) -> Result<Self> {
        let channel = Channel::from_shared(url.to_string())?.connect_lazy();
        info!(url, "readings backend channel created");
        Ok(Self::from_channel(channel))
    }

    pub fn from_channel(channel: Channel) -> Self {
        Self {
            client: ReadingServiceClient::new(channel),
        }
    }

    /// Release the channel. In-flight calls holding clones finish first.
    pub fn close(self) {
        drop(self.client);
        info!("readings backend channel closed");
    }
}

#[async_trait]
impl ReadingBackend for GrpcReadingBackend {
    async fn create_reading(&self, req: CreateReadingRequest) -> Result<ReadingResponse, Status> {
        let mut client = self.client.clone();
        Ok(client.create_reading(req).await?.into_inner())
    }

    async fn get_reading(&self, req: GetReadingRequest) -> Result<ReadingResponse, Status> {
        let mut client = self.client.clone();
        Ok(client.get_reading(req).await?.into_inner())
    }

    async fn update_reading(&self, req: UpdateReadingRequest) -> Result<ReadingResponse, Status> {
        let mut client = self.client.clone();
        Ok(client.update_reading(req).await?.into_inner())
    }

    async fn delete_reading(
        &self,
        req: DeleteReadingRequest,
    ) -> Result<DeleteReadingResponse, Status> {
        let mut client = self.client.clone();
        Ok(client.delete_reading(req).await?.into_inner())
    }

    async fn list_readings(
        &self,
        req: ListReadingsRequest,
    ) -> Result<ListReadingsResponse, Status> {
        let mut client = self.client.clone();
        Ok(client.list_readings(req).await?.into_inner())
    }

    async fn aggregate(&self, req: AggregateRequest) -> Result<AggregateResponse, Status> {
        let mut client = self.client.clone();
        Ok(client.aggregate(req).await?.into_inner())
    }
}

// ------------------------------------------------------------------ //
//  FakeReadingBackend (for tests)                                     //
// ------------------------------------------------------------------ //

#[derive(Debug, Default)]
struct FakeState {
    /// Insertion order is kept so listing is deterministic.
    readings: Vec<Reading>,
    aggregate_values: Vec<AggValue>,
    next_failure: Option<Status>,
    calls: usize,
    last_list: Option<ListReadingsRequest>,
    last_aggregate: Option<AggregateRequest>,
}

/// In-memory backend that behaves like the datamanager for CRUD and list
/// calls, returns scripted aggregate values and records what it was sent.
#[derive(Debug, Default, Clone)]
pub struct FakeReadingBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeReadingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a reading directly, bypassing the gateway.
    pub fn insert(&self, reading: Reading) {
        self.state.lock().unwrap().readings.push(reading);
    }

    /// Values returned by every subsequent `aggregate` call.
    pub fn set_aggregate_values(&self, values: Vec<AggValue>) {
        self.state.lock().unwrap().aggregate_values = values;
    }

    /// Make the next call, whichever it is, fail with `status`.
    pub fn fail_next(&self, status: Status) {
        self.state.lock().unwrap().next_failure = Some(status);
    }

    /// Number of RPCs received so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn snapshot(&self) -> Vec<Reading> {
        self.state.lock().unwrap().readings.clone()
    }

    pub fn last_list_request(&self) -> Option<ListReadingsRequest> {
        self.state.lock().unwrap().last_list.clone()
    }

    pub fn last_aggregate_request(&self) -> Option<AggregateRequest> {
        self.state.lock().unwrap().last_aggregate.clone()
    }

    fn begin(&self) -> Result<std::sync::MutexGuard<'_, FakeState>, Status> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        match state.next_failure.take() {
            Some(status) => Err(status),
            None => Ok(state),
        }
    }
}

fn check_id(id: &str) -> Result<(), Status> {
    Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| Status::invalid_argument("Invalid id UUID"))
}

fn instant(ts: Option<&Timestamp>) -> Option<(i64, i32)> {
    ts.map(|t| (t.seconds, t.nanos))
}

#[async_trait]
impl ReadingBackend for FakeReadingBackend {
    async fn create_reading(&self, req: CreateReadingRequest) -> Result<ReadingResponse, Status> {
        let mut state = self.begin()?;
        let mut reading = req
            .reading
            .ok_or_else(|| Status::invalid_argument("Missing reading"))?;
        if reading.ts.is_none() {
            return Err(Status::invalid_argument("Missing ts"));
        }
        reading.id = Uuid::new_v4().to_string();
        state.readings.push(reading.clone());
        Ok(ReadingResponse {
            reading: Some(reading),
        })
    }

    async fn get_reading(&self, req: GetReadingRequest) -> Result<ReadingResponse, Status> {
        let state = self.begin()?;
        check_id(&req.id)?;
        state
            .readings
            .iter()
            .find(|r| r.id == req.id)
            .cloned()
            .map(|r| ReadingResponse { reading: Some(r) })
            .ok_or_else(|| Status::not_found("Not found"))
    }

    async fn update_reading(&self, req: UpdateReadingRequest) -> Result<ReadingResponse, Status> {
        let mut state = self.begin()?;
        check_id(&req.id)?;
        let patch = req
            .reading
            .ok_or_else(|| Status::invalid_argument("Missing reading"))?;
        let existing = state
            .readings
            .iter_mut()
            .find(|r| r.id == req.id)
            .ok_or_else(|| Status::not_found("Not found"))?;
        let ts = patch.ts.or_else(|| existing.ts.clone());
        *existing = Reading {
            id: req.id,
            ts,
            ..patch
        };
        Ok(ReadingResponse {
            reading: Some(existing.clone()),
        })
    }

    async fn delete_reading(
        &self,
        req: DeleteReadingRequest,
    ) -> Result<DeleteReadingResponse, Status> {
        let mut state = self.begin()?;
        check_id(&req.id)?;
        let before = state.readings.len();
        state.readings.retain(|r| r.id != req.id);
        if state.readings.len() == before {
            return Err(Status::not_found("Not found"));
        }
        Ok(DeleteReadingResponse { deleted: true })
    }

    async fn list_readings(
        &self,
        req: ListReadingsRequest,
    ) -> Result<ListReadingsResponse, Status> {
        let mut state = self.begin()?;
        state.last_list = Some(req.clone());

        let from = instant(req.from_ts.as_ref());
        let to = instant(req.to_ts.as_ref());
        let mut matching: Vec<Reading> = state
            .readings
            .iter()
            .filter(|r| {
                let ts = instant(r.ts.as_ref());
                from.map_or(true, |f| ts >= Some(f)) && to.map_or(true, |t| ts <= Some(t))
            })
            .cloned()
            .collect();
        matching.sort_by_key(|r| instant(r.ts.as_ref()));
        if req.order == "desc" {
            matching.reverse();
        }

        let total = matching.len() as i64;
        let readings = matching
            .into_iter()
            .skip(req.offset.max(0) as usize)
            .take(req.limit.max(0) as usize)
            .collect();
        Ok(ListReadingsResponse { readings, total })
    }

    async fn aggregate(&self, req: AggregateRequest) -> Result<AggregateResponse, Status> {
        let mut state = self.begin()?;
        if req.from_ts.is_none() || req.to_ts.is_none() {
            return Err(Status::invalid_argument("from_ts and to_ts are required"));
        }
        if instant(req.from_ts.as_ref()) > instant(req.to_ts.as_ref()) {
            return Err(Status::invalid_argument("from_ts must be <= to_ts"));
        }
        state.last_aggregate = Some(req);
        Ok(AggregateResponse {
            values: state.aggregate_values.clone(),
        })
    }
}
