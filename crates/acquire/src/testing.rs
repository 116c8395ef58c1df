//! Throwaway HTTP/1.1 server for download tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52];
pub const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";

/// Serves the same response to every request and counts full (non-ranged)
/// downloads and ranged sniffs separately.
pub struct TestServer {
    addr: SocketAddr,
    downloads: Arc<AtomicUsize>,
    sniffs: Arc<AtomicUsize>,
}

impl TestServer {
    pub async fn start(status: &'static str, body: &'static [u8]) -> Self {
        Self::start_with_delay(status, body, Duration::ZERO).await
    }

    /// Wait `delay` before answering each request.
    pub async fn start_with_delay(status: &'static str, body: &'static [u8], delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let downloads = Arc::new(AtomicUsize::new(0));
        let sniffs = Arc::new(AtomicUsize::new(0));
        let (seen_downloads, seen_sniffs) = (downloads.clone(), sniffs.clone());
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                let (downloads, sniffs) = (seen_downloads.clone(), seen_sniffs.clone());
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        let Ok(n) = socket.read(&mut buf).await else { return };
                        if n == 0 {
                            return;
                        }
                        request.extend_from_slice(&buf[..n]);
                    }
                    if String::from_utf8_lossy(&request).to_ascii_lowercase().contains("\r\nrange:") {
                        sniffs.fetch_add(1, Ordering::SeqCst);
                    } else {
                        downloads.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::time::sleep(delay).await;
                    let head =
                        format!("HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", body.len());
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        Self { addr, downloads, sniffs }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn sniffs(&self) -> usize {
        self.sniffs.load(Ordering::SeqCst)
    }
}
