//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a single static body. HEAD responds with Content-Length and
//! Content-Type; GET streams the body. Options simulate misbehaving media
//! hosts (truncated responses, blocked HEAD).

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Copy)]
pub struct MediaServerOptions {
    /// Content-Type sent on HEAD and GET responses.
    pub content_type: &'static str,
    /// If false, HEAD returns 405 (simulates hosts that block HEAD).
    pub head_allowed: bool,
    /// If set, the FIRST GET advertises the full Content-Length but sends
    /// only this many body bytes before closing the connection.
    pub truncate_first_get: Option<usize>,
}

impl Default for MediaServerOptions {
    fn default() -> Self {
        Self {
            content_type: "video/mp4",
            head_allowed: true,
            truncate_first_get: None,
        }
    }
}

/// Running server plus its request counters.
pub struct MediaServer {
    pub url: String,
    pub gets: Arc<AtomicUsize>,
    pub heads: Arc<AtomicUsize>,
}

/// Starts a server in a background thread serving `body`. The server runs
/// until the process exits.
pub fn start(body: Vec<u8>) -> MediaServer {
    start_with_options(body, MediaServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: MediaServerOptions) -> MediaServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let gets = Arc::new(AtomicUsize::new(0));
    let heads = Arc::new(AtomicUsize::new(0));
    let url = format!("http://127.0.0.1:{}/clip.mp4", port);

    let (gets_srv, heads_srv) = (Arc::clone(&gets), Arc::clone(&heads));
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let gets = Arc::clone(&gets_srv);
            let heads = Arc::clone(&heads_srv);
            thread::spawn(move || handle(stream, &body, opts, &gets, &heads));
        }
    });

    MediaServer { url, gets, heads }
}

fn handle(
    mut stream: std::net::TcpStream,
    body: &[u8],
    opts: MediaServerOptions,
    gets: &AtomicUsize,
    heads: &AtomicUsize,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let method = request.split_whitespace().next().unwrap_or("");
    let total = body.len();

    if method.eq_ignore_ascii_case("HEAD") {
        heads.fetch_add(1, Ordering::SeqCst);
        if !opts.head_allowed {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nConnection: close\r\n\r\n");
            return;
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
            total, opts.content_type
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    if method.eq_ignore_ascii_case("GET") {
        let nth = gets.fetch_add(1, Ordering::SeqCst);
        let header = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
            total, opts.content_type
        );
        let _ = stream.write_all(header.as_bytes());
        let slice = match opts.truncate_first_get {
            // Advertised length stays `total`; the client sees a short body.
            Some(cut) if nth == 0 => &body[..cut.min(total)],
            _ => body,
        };
        let _ = stream.write_all(slice);
        let _ = stream.flush();
    }
}
