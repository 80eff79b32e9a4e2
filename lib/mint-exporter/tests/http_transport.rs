use std::{net::SocketAddr, time::Duration};

use http::{StatusCode, Uri};
use mint_exporter::{
    config::MintExporterConfiguration,
    record::{DataPoint, MetricData, MetricRecord},
    transport::{HttpTransport, IngestTransport as _, TransportError, USER_AGENT},
    ExportOutcome, MintExporter,
};
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::{TcpListener, TcpStream},
    sync::mpsc,
};

#[derive(Debug)]
struct CapturedRequest {
    request_line: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl CapturedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Spawns a minimal HTTP/1.1 server that captures every request and answers with the given status.
async fn spawn_ingest_server(status: StatusCode) -> (SocketAddr, mpsc::UnboundedReceiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (requests_tx, requests_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let requests_tx = requests_tx.clone();
            tokio::spawn(async move {
                if let Some(request) = handle_connection(stream, status).await {
                    let _ = requests_tx.send(request);
                }
            });
        }
    });

    (addr, requests_rx)
}

async fn handle_connection(mut stream: TcpStream, status: StatusCode) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let header_end = loop {
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|window| window == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?.to_string();
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect::<Vec<_>>();

    let content_length = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    let response = format!(
        "HTTP/1.1 {} {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    );
    stream.write_all(response.as_bytes()).await.ok()?;
    stream.shutdown().await.ok()?;

    Some(CapturedRequest {
        request_line,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn endpoint(addr: SocketAddr) -> Uri {
    format!("http://{}/api/v2/metrics/ingest", addr).parse().unwrap()
}

#[tokio::test]
async fn sends_payload_with_headers() {
    let (addr, mut requests) = spawn_ingest_server(StatusCode::ACCEPTED).await;
    let transport = HttpTransport::new(endpoint(addr), Some("secret-token"), Duration::from_secs(5)).unwrap();

    let status = transport
        .send("my.metric gauge,1 1000\nmy.other count,delta=2 1000".to_string())
        .await
        .unwrap();
    assert_eq!(status, StatusCode::ACCEPTED);

    let request = requests.recv().await.unwrap();
    assert_eq!(request.request_line, "POST /api/v2/metrics/ingest HTTP/1.1");
    assert_eq!(request.header("authorization"), Some("Api-Token secret-token"));
    assert_eq!(request.header("user-agent"), Some(USER_AGENT));
    assert_eq!(request.header("content-type"), Some("text/plain; charset=utf-8"));
    assert_eq!(request.body, "my.metric gauge,1 1000\nmy.other count,delta=2 1000");
}

#[tokio::test]
async fn omits_authorization_without_token() {
    let (addr, mut requests) = spawn_ingest_server(StatusCode::ACCEPTED).await;
    let transport = HttpTransport::new(endpoint(addr), None, Duration::from_secs(5)).unwrap();

    transport.send("my.metric gauge,1 1000".to_string()).await.unwrap();

    let request = requests.recv().await.unwrap();
    assert_eq!(request.header("authorization"), None);
}

#[tokio::test]
async fn reports_rejection_status() {
    let (addr, _requests) = spawn_ingest_server(StatusCode::BAD_REQUEST).await;
    let transport = HttpTransport::new(endpoint(addr), None, Duration::from_secs(5)).unwrap();

    let status = transport.send("my.metric gauge,1 1000".to_string()).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unanswered_request_times_out() {
    // Accept connections but never respond.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let transport = HttpTransport::new(endpoint(addr), None, Duration::from_millis(200)).unwrap();

    let result = transport.send("my.metric gauge,1 1000".to_string()).await;
    match result {
        Err(TransportError::Timeout { timeout }) => assert_eq!(timeout, Duration::from_millis(200)),
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn connection_refused_is_transport_error() {
    // Bind and immediately drop a listener to get a port that nothing listens on.
    let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let transport = HttpTransport::new(endpoint(addr), None, Duration::from_secs(5)).unwrap();

    let result = transport.send("my.metric gauge,1 1000".to_string()).await;
    assert!(matches!(result, Err(TransportError::SendRequest { .. })));
}

#[tokio::test]
async fn exports_records_end_to_end() {
    let (addr, mut requests) = spawn_ingest_server(StatusCode::ACCEPTED).await;
    let config = MintExporterConfiguration::default()
        .with_url(endpoint(addr).to_string())
        .with_api_token("secret-token")
        .with_default_dimension("env", "test")
        .with_metadata_enrichment(false);
    let exporter = MintExporter::from_configuration(&config).unwrap();

    let record = MetricRecord::new(
        "metric1",
        MetricData::Sum(vec![DataPoint::new(100.0, 1604660628881)
            .with_attribute("dim1", "value1")
            .with_attribute("dim2", "value2")]),
    )
    .with_namespace("namespace1");

    let outcome = exporter.export([record]).await.unwrap();
    assert_eq!(outcome, ExportOutcome::Success);

    let request = requests.recv().await.unwrap();
    assert_eq!(
        request.body,
        "namespace1.metric1,dim1=value1,dim2=value2,env=test count,delta=100 1604660628881"
    );
}
