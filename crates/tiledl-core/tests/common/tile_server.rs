//! Minimal HTTP/1.1 tile server for integration tests.
//!
//! Serves `GET /{z}/{x}/{y}.png` with a small generated RGBA PNG per tile.
//! Tracks request counts per path and the peak number of requests being
//! served at once. Individual paths can be scripted to return error statuses.

use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};

#[derive(Default)]
struct State {
    hits: Mutex<HashMap<String, usize>>,
    /// Statuses returned (in order) for a path before it starts succeeding.
    scripted: Mutex<HashMap<String, VecDeque<u16>>>,
    /// Paths that always fail with the given status.
    always: Mutex<HashMap<String, u16>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

#[derive(Clone)]
pub struct TileServer {
    pub base_url: String,
    state: Arc<State>,
}

impl TileServer {
    /// Start serving in a background thread; each request takes `latency`.
    pub fn start(latency: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(State::default());
        let st = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let st = Arc::clone(&st);
                thread::spawn(move || handle(stream, &st, latency));
            }
        });
        Self {
            base_url: format!("http://127.0.0.1:{}/", port),
            state,
        }
    }

    /// Fail `path` (e.g. "1/0/1.png") with `status` forever.
    pub fn fail_always(&self, path: &str, status: u16) {
        self.state.always.lock().unwrap().insert(path.to_string(), status);
    }

    /// Fail `path` with each status in turn, then serve normally.
    pub fn fail_first(&self, path: &str, statuses: &[u16]) {
        self.state
            .scripted
            .lock()
            .unwrap()
            .insert(path.to_string(), statuses.iter().copied().collect());
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.state.total.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }
}

/// Deterministic 8x8 tile whose colours depend on the path.
pub fn tile_png(path: &str) -> Vec<u8> {
    let seed = path.bytes().fold(7u8, |a, b| a.wrapping_mul(31).wrapping_add(b));
    let img = RgbaImage::from_fn(8, 8, |x, y| Rgba([seed, (x * 32) as u8, (y * 32) as u8, 255]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageOutputFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn handle(mut stream: TcpStream, st: &State, latency: Duration) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 4096];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = String::from_utf8_lossy(&buf[..n]);
    let path = request
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/")
        .trim_start_matches('/')
        .to_string();

    let now = st.active.fetch_add(1, Ordering::SeqCst) + 1;
    st.peak.fetch_max(now, Ordering::SeqCst);
    st.total.fetch_add(1, Ordering::SeqCst);
    *st.hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;
    thread::sleep(latency);

    let scripted = st
        .scripted
        .lock()
        .unwrap()
        .get_mut(&path)
        .and_then(|q| q.pop_front());
    let status = scripted.or_else(|| st.always.lock().unwrap().get(&path).copied());
    let response = match status {
        Some(code) => format!("HTTP/1.1 {code} Scripted\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").into_bytes(),
        None => {
            let body = tile_png(&path);
            let mut r = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            )
            .into_bytes();
            r.extend_from_slice(&body);
            r
        }
    };
    let _ = stream.write_all(&response);
    st.active.fetch_sub(1, Ordering::SeqCst);
}
