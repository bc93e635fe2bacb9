//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use region_router::config::RouterConfig;
use region_router::health::{ProbeReading, ScriptedProbe};
use region_router::region::GeoPoint;
use region_router::storage::MemoryStore;
use region_router::{HttpServer, RouterCore, Shutdown};

pub const API_KEY: &str = "test-admin-key";

pub fn berlin() -> GeoPoint {
    GeoPoint::new(52.52, 13.40)
}

/// Default config with a known admin key.
pub fn test_config() -> RouterConfig {
    let mut config = RouterConfig::default();
    config.admin.api_key = API_KEY.to_string();
    config
}

/// A core over the in-memory store, driven by a scripted probe.
pub fn scripted_core(config: RouterConfig) -> (Arc<RouterCore>, Arc<ScriptedProbe>) {
    let probe = Arc::new(ScriptedProbe::new());
    let core = RouterCore::new(config, Arc::new(MemoryStore::new()), probe.clone()).unwrap();
    (Arc::new(core), probe)
}

/// Script every default region healthy at `latency_ms`.
#[allow(dead_code)]
pub fn all_healthy(probe: &ScriptedProbe, latency_ms: f64) {
    for id in ["eu", "us", "asia"] {
        probe.set_reading(id, ProbeReading::healthy(latency_ms));
    }
}

/// Script every default region unhealthy, each for a different reason.
#[allow(dead_code)]
pub fn all_unhealthy(probe: &ScriptedProbe) {
    probe.set_reading("eu", ProbeReading::healthy(50.0).with_cpu(0.95));
    probe.set_reading("us", ProbeReading::healthy(450.0));
    probe.set_failure("asia", "connection refused");
}

/// Serve the API on an ephemeral port.
#[allow(dead_code)]
pub async fn spawn_api(core: Arc<RouterCore>) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        HttpServer::new(core).run(listener, rx).await.unwrap();
    });
    (addr, shutdown)
}

/// Start a programmable HTTP status endpoint on an ephemeral port.
///
/// `f` yields the status code and body of each response.
#[allow(dead_code)]
pub async fn start_status_server<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        // Drain the request head before answering.
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A status server that always answers the same JSON document.
#[allow(dead_code)]
pub async fn start_fixed_status_server(status: u16, body: &'static str) -> SocketAddr {
    start_status_server(move || async move { (status, body.to_string()) }).await
}
