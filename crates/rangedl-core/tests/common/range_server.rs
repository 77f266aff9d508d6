//! Minimal HTTP/1.1 server with HEAD and Range GET support for integration tests.
//!
//! Serves the same body on every path except `/missing*`, which answers 404,
//! and `/unavailable*`, whose GETs always answer 503.
//! Every request is logged so tests can assert on what the client sent.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, omit `Accept-Ranges: bytes` even if ranges work.
    pub advertise_ranges: bool,
    /// Pause before sending a GET response body.
    pub get_delay: Duration,
    /// Answer this many GETs (counted across all paths) with 503 before serving.
    pub fail_first_gets: usize,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            advertise_ranges: true,
            get_delay: Duration::ZERO,
            fail_first_gets: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedRequest {
    pub method: String,
    pub path: String,
    /// Raw `Range` header value, if any.
    pub range: Option<String>,
}

#[derive(Default)]
struct Shared {
    log: Mutex<Vec<LoggedRequest>>,
    in_flight_gets: AtomicUsize,
    gets_seen: AtomicUsize,
    max_in_flight_gets: AtomicUsize,
}

pub struct RangeServer {
    /// Base URL ending in `/`.
    pub url: String,
    shared: Arc<Shared>,
}

impl RangeServer {
    /// URL for `path` (no leading slash).
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.shared.log.lock().unwrap().clone()
    }

    pub fn gets(&self) -> Vec<LoggedRequest> {
        self.requests().into_iter().filter(|r| r.method == "GET").collect()
    }

    /// Highest number of GET responses being served at the same time.
    pub fn max_concurrent_gets(&self) -> usize {
        self.shared.max_in_flight_gets.load(Ordering::SeqCst)
    }
}

pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

/// Starts a server in a background thread serving `body` until the process exits.
pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let shared = Arc::new(Shared::default());
    let accept_shared = Arc::clone(&shared);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let shared = Arc::clone(&accept_shared);
            thread::spawn(move || handle(stream, &body, opts, &shared));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{port}/"),
        shared,
    }
}

fn handle(mut stream: TcpStream, body: &[u8], opts: RangeServerOptions, shared: &Shared) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else { return };
    shared.log.lock().unwrap().push(req.clone());

    let total = body.len() as u64;
    let accept_ranges = if opts.advertise_ranges && opts.support_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };

    if req.path.starts_with("/missing") {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }

    match req.method.as_str() {
        "HEAD" => {
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {total}\r\n{accept_ranges}Connection: close\r\n\r\n"
            );
            let _ = stream.write_all(response.as_bytes());
        }
        "GET" => {
            let seen = shared.gets_seen.fetch_add(1, Ordering::SeqCst);
            if seen < opts.fail_first_gets || req.path.starts_with("/unavailable") {
                let _ = stream.write_all(
                    b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                );
                return;
            }
            let now = shared.in_flight_gets.fetch_add(1, Ordering::SeqCst) + 1;
            shared.max_in_flight_gets.fetch_max(now, Ordering::SeqCst);
            if !opts.get_delay.is_zero() {
                thread::sleep(opts.get_delay);
            }
            let range = req.range.as_deref().and_then(parse_range);
            let (status, extra, slice) = match (opts.support_ranges, range) {
                (true, Some((start, end))) => {
                    let end = end.min(total.saturating_sub(1));
                    if start > end {
                        ("416 Range Not Satisfiable", format!("Content-Range: bytes */{total}\r\n"), &body[0..0])
                    } else {
                        (
                            "206 Partial Content",
                            format!("Content-Range: bytes {start}-{end}/{total}\r\n"),
                            &body[start as usize..=end as usize],
                        )
                    }
                }
                _ => ("200 OK", String::new(), body),
            };
            let header = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\n{extra}{accept_ranges}Connection: close\r\n\r\n",
                slice.len()
            );
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(slice);
            shared.in_flight_gets.fetch_sub(1, Ordering::SeqCst);
        }
        _ => {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        }
    }
}

fn read_request(stream: &mut TcpStream) -> Option<LoggedRequest> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > 64 * 1024 {
            return None;
        }
    }
    let text = String::from_utf8_lossy(&buf);
    let mut lines = text.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let path = first.next()?.to_string();
    let range = lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("range"))
        .map(|(_, v)| v.trim().to_string());
    Some(LoggedRequest { method, path, range })
}

/// `bytes=X-Y` → (X, Y); open-ended `bytes=X-` → (X, u64::MAX).
fn parse_range(value: &str) -> Option<(u64, u64)> {
    let spec = value.strip_prefix("bytes=")?;
    let (a, b) = spec.split_once('-')?;
    let start = a.trim().parse().ok()?;
    let end = if b.trim().is_empty() {
        u64::MAX
    } else {
        b.trim().parse().ok()?
    };
    Some((start, end))
}
