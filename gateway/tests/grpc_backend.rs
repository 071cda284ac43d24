//! Gateway → tonic transport → in-process `ReadingService`.

use std::net::SocketAddr;
use std::sync::Arc;

use proto::iot::{
    reading_service_server::{ReadingService, ReadingServiceServer},
    AggregateRequest, AggregateResponse, CreateReadingRequest, DeleteReadingRequest,
    DeleteReadingResponse, GetReadingRequest, ListReadingsRequest, ListReadingsResponse,
    ReadingResponse, UpdateReadingRequest,
};
use readings_gateway::{
    backend::{FakeReadingBackend, GrpcReadingBackend, ReadingBackend},
    error::GatewayError,
    service::ReadingsGateway,
};
use serde_json::json;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{transport::Server, Request, Response, Status};

/// Serves the fake backend over real gRPC.
struct FakeService(FakeReadingBackend);

#[tonic::async_trait]
impl ReadingService for FakeService {
    async fn create_reading(
        &self,
        request: Request<CreateReadingRequest>,
    ) -> Result<Response<ReadingResponse>, Status> {
        self.0.create_reading(request.into_inner()).await.map(Response::new)
    }

    async fn get_reading(
        &self,
        request: Request<GetReadingRequest>,
    ) -> Result<Response<ReadingResponse>, Status> {
        self.0.get_reading(request.into_inner()).await.map(Response::new)
    }

    async fn update_reading(
        &self,
        request: Request<UpdateReadingRequest>,
    ) -> Result<Response<ReadingResponse>, Status> {
        self.0.update_reading(request.into_inner()).await.map(Response::new)
    }

    async fn delete_reading(
        &self,
        request: Request<DeleteReadingRequest>,
    ) -> Result<Response<DeleteReadingResponse>, Status> {
        self.0.delete_reading(request.into_inner()).await.map(Response::new)
    }

    async fn list_readings(
        &self,
        request: Request<ListReadingsRequest>,
    ) -> Result<Response<ListReadingsResponse>, Status> {
        self.0.list_readings(request.into_inner()).await.map(Response::new)
    }

    async fn aggregate(
        &self,
        request: Request<AggregateRequest>,
    ) -> Result<Response<AggregateResponse>, Status> {
        self.0.aggregate(request.into_inner()).await.map(Response::new)
    }
}

async fn spawn_backend(fake: FakeReadingBackend) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        Server::builder()
            .add_service(ReadingServiceServer::new(FakeService(fake)))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    addr
}

#[tokio::test]
async fn crud_over_grpc() {
    let fake = FakeReadingBackend::new();
    let addr = spawn_backend(fake.clone()).await;
    let backend = GrpcReadingBackend::connect(&format!("http://{addr}")).unwrap();
    let gateway = ReadingsGateway::new(Arc::new(backend));

    let created = gateway
        .create(&json!({
            "source_id": 4,
            "ts": "2023-11-14T22:13:20.123Z",
            "temperature_c": 21.5,
            "humidity_percent": 40,
            "light_lux": 100,
            "co2_ppm": 450,
            "humidity_ratio": 0.004,
            "occupancy": true
        }))
        .await
        .unwrap()
        .reading;
    assert_eq!(created.ts.as_deref(), Some("2023-11-14T22:13:20.123Z"));
    assert_eq!(created.source_id, 4);

    let fetched = gateway.get(&created.id).await.unwrap().reading;
    assert_eq!(fetched, created);

    gateway.remove(&created.id).await.unwrap();
    let err = gateway.get(&created.id).await.unwrap_err();
    assert_eq!(err, GatewayError::NotFound("Not found".into()));
}

#[tokio::test]
async fn status_codes_survive_the_wire() {
    let fake = FakeReadingBackend::new();
    let addr = spawn_backend(fake.clone()).await;
    let gateway = ReadingsGateway::new(Arc::new(
        GrpcReadingBackend::connect(&format!("http://{addr}")).unwrap(),
    ));

    fake.fail_next(Status::invalid_argument("limit must be 1..1000"));
    let err = gateway.list(&[]).await.unwrap_err();
    assert_eq!(err, GatewayError::BadRequest("limit must be 1..1000".into()));

    fake.fail_next(Status::internal("database unavailable"));
    let err = gateway.list(&[]).await.unwrap_err();
    assert_eq!(err, GatewayError::Internal("database unavailable".into()));
}

#[tokio::test]
async fn unreachable_backend_is_internal() {
    // Nothing listens here once the listener is dropped.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let gateway = ReadingsGateway::new(Arc::new(
        GrpcReadingBackend::connect(&format!("http://{addr}")).unwrap(),
    ));
    let err = gateway.list(&[]).await.unwrap_err();
    assert!(matches!(err, GatewayError::Internal(_)), "got {err:?}");
}
