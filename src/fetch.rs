//! Blocking I/O for rule sources: HTTP downloads and local files.
//!
//! Every call takes a [`RefreshContext`], which carries the shutdown signal and
//! the deadline of the current refresh attempt. HTTP requests are given the
//! remaining time as their timeout, so a stuck server cannot hold a refresh
//! past its deadline.

use flate2::read::GzDecoder;
use parking_lot::{Condvar, Mutex};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::provider::CLOUDFLARE_API;
use crate::{Error, Result};

const USER_AGENT: &str = concat!("ipgate/", env!("CARGO_PKG_VERSION"));

/// Shutdown signal shared between the owner of a filter and its background work.
///
/// Cloning yields a handle to the same signal.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

#[derive(Default)]
struct CancelState {
    cancelled: Mutex<bool>,
    cond: Condvar,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel and wake every waiter.
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        *cancelled = true;
        self.inner.cond.notify_all();
    }

    /// Check whether the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Sleep for `timeout` or until cancelled, whichever comes first.
    ///
    /// Returns `true` if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.inner.cancelled.lock();
        while !*cancelled {
            if self
                .inner
                .cond
                .wait_until(&mut cancelled, deadline)
                .timed_out()
            {
                break;
            }
        }
        *cancelled
    }
}

/// Deadline and cancellation for one refresh attempt.
#[derive(Clone)]
pub struct RefreshContext {
    cancel: CancelToken,
    deadline: Instant,
    timeout: Duration,
}

impl RefreshContext {
    /// Create a context bounded by `timeout` and tied to `cancel`.
    pub fn new(cancel: &CancelToken, timeout: Duration) -> Self {
        Self {
            cancel: cancel.clone(),
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    /// Create a context with its own, never-cancelled token.
    pub fn detached(timeout: Duration) -> Self {
        Self::new(&CancelToken::new(), timeout)
    }

    /// Check whether shutdown was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail if cancelled or past the deadline, otherwise return the time left.
    pub fn check(&self) -> Result<Duration> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::Timeout(self.timeout));
        }
        Ok(remaining)
    }

    /// Run blocking `work` on a helper thread and wait for its result.
    ///
    /// Returns [`Error::Cancelled`] as soon as the token is cancelled and
    /// [`Error::Timeout`] once the deadline passes. The helper is then left to
    /// finish on its own and its result is dropped.
    pub fn run_blocking<T, F>(&self, name: &str, work: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let slot: Arc<Mutex<Option<Result<T>>>> = Arc::new(Mutex::new(None));
        let result = Arc::clone(&slot);
        let state = Arc::clone(&self.cancel.inner);

        thread::Builder::new().name(name.to_string()).spawn(move || {
            let outcome = work();
            *result.lock() = Some(outcome);
            // Notify under the state lock so a waiter between its slot check
            // and its wait cannot miss the wakeup.
            let _guard = state.cancelled.lock();
            state.cond.notify_all();
        })?;

        let inner = &self.cancel.inner;
        let mut cancelled = inner.cancelled.lock();
        loop {
            if *cancelled {
                return Err(Error::Cancelled);
            }
            if let Some(outcome) = slot.lock().take() {
                return outcome;
            }
            if inner.cond.wait_until(&mut cancelled, self.deadline).timed_out() {
                if *cancelled {
                    return Err(Error::Cancelled);
                }
                return slot
                    .lock()
                    .take()
                    .unwrap_or_else(|| Err(Error::Timeout(self.timeout)));
            }
        }
    }
}

/// Performs the I/O behind remote, file and provider sources.
pub struct Fetcher {
    client: reqwest::blocking::Client,
    cloudflare_endpoint: String,
}

impl Fetcher {
    /// Create a fetcher with its own HTTP connection pool.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Config(format!("building HTTP client: {}", e)))?;
        Ok(Self::with_client(client))
    }

    /// Create a fetcher around an existing HTTP client.
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self {
            client,
            cloudflare_endpoint: CLOUDFLARE_API.to_string(),
        }
    }

    /// Point the Cloudflare provider at a different endpoint (mirrors, tests).
    pub fn with_cloudflare_endpoint(mut self, url: &str) -> Self {
        self.cloudflare_endpoint = url.to_string();
        self
    }

    /// Endpoint used for the Cloudflare provider.
    pub fn cloudflare_endpoint(&self) -> &str {
        &self.cloudflare_endpoint
    }

    /// Download a URL and return its body, gunzipped if needed.
    ///
    /// Non-2xx answers are errors. The request runs on a helper thread so
    /// that cancelling `ctx` abandons it immediately.
    pub fn fetch_bytes(&self, url: &str, ctx: &RefreshContext) -> Result<Vec<u8>> {
        let remaining = ctx.check()?;
        let client = self.client.clone();
        let location = url.to_string();

        let body = ctx.run_blocking("ipgate-fetch", move || {
            download(&client, &location, remaining)
        })?;

        log::debug!("Downloaded {} bytes from {}", body.len(), url);
        decompress(body)
    }

    /// Download a URL as text.
    pub fn fetch_text(&self, url: &str, ctx: &RefreshContext) -> Result<String> {
        let bytes = self.fetch_bytes(url, ctx)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a local list file as text.
    pub fn read_file(&self, path: &Path, ctx: &RefreshContext) -> Result<String> {
        ctx.check()?;
        let data = fs::read(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let data = decompress(data)?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}

/// Blocking GET of `url`, failing on transport errors and non-2xx answers.
fn download(client: &reqwest::blocking::Client, url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let fetch_err = |source: reqwest::Error| Error::Fetch {
        location: url.to_string(),
        source,
    };

    let response = client.get(url).timeout(timeout).send().map_err(fetch_err)?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            location: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes().map_err(fetch_err)?;
    Ok(body.to_vec())
}

/// Check if data is gzip compressed.
fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

/// Gunzip `data` if it carries the gzip magic, otherwise hand it back.
fn decompress(data: Vec<u8>) -> Result<Vec<u8>> {
    if !is_gzip(&data) {
        return Ok(data);
    }
    let mut decoder = GzDecoder::new(&data[..]);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::net::TcpListener;

    #[test]
    fn test_cancel_token_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();

        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(50));
        token.cancel();

        assert!(handle.join().unwrap());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_token_times_out() {
        let token = CancelToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(10)));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_context_check() {
        let token = CancelToken::new();
        let ctx = RefreshContext::new(&token, Duration::from_secs(5));
        assert!(ctx.check().is_ok());

        token.cancel();
        assert!(matches!(ctx.check(), Err(Error::Cancelled)));

        let expired = RefreshContext::detached(Duration::ZERO);
        assert!(matches!(expired.check(), Err(Error::Timeout(_))));
    }

    #[test]
    fn test_run_blocking_returns_result() {
        let ctx = RefreshContext::detached(Duration::from_secs(5));
        assert_eq!(ctx.run_blocking("test", || Ok(42)).unwrap(), 42);

        let err = ctx
            .run_blocking::<(), _>("test", || Err(Error::Config("bad".to_string())))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_run_blocking_abandons_work_on_cancel() {
        let token = CancelToken::new();
        let ctx = RefreshContext::new(&token, Duration::from_secs(30));

        let canceller = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            canceller.cancel();
        });

        let started = Instant::now();
        let result = ctx.run_blocking("test", || {
            thread::sleep(Duration::from_secs(10));
            Ok(())
        });
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_run_blocking_honours_deadline() {
        let ctx = RefreshContext::detached(Duration::from_millis(50));
        let started = Instant::now();
        let result = ctx.run_blocking("test", || {
            thread::sleep(Duration::from_secs(10));
            Ok(())
        });
        assert!(matches!(result, Err(Error::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cancel_aborts_hanging_download() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/list.txt", listener.local_addr().unwrap());
        thread::spawn(move || {
            // Accept and never answer.
            let held: Vec<_> = listener.incoming().take(1).collect();
            thread::sleep(Duration::from_secs(20));
            drop(held);
        });

        let client = reqwest::blocking::Client::builder().no_proxy().build().unwrap();
        let fetcher = Fetcher::with_client(client);
        let token = CancelToken::new();
        let ctx = RefreshContext::new(&token, Duration::from_secs(30));

        let canceller = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            canceller.cancel();
        });

        let started = Instant::now();
        let err = fetcher.fetch_bytes(&url, &ctx).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        fs::write(&path, "1.1.1.1\n2.2.2.0/24").unwrap();

        let fetcher = Fetcher::new().unwrap();
        let ctx = RefreshContext::detached(Duration::from_secs(5));
        assert_eq!(
            fetcher.read_file(&path, &ctx).unwrap(),
            "1.1.1.1\n2.2.2.0/24"
        );
    }

    #[test]
    fn test_read_gzip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"10.0.0.0/8\n").unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();

        let fetcher = Fetcher::new().unwrap();
        let ctx = RefreshContext::detached(Duration::from_secs(5));
        assert_eq!(fetcher.read_file(&path, &ctx).unwrap(), "10.0.0.0/8\n");
    }

    #[test]
    fn test_read_missing_file() {
        let fetcher = Fetcher::new().unwrap();
        let ctx = RefreshContext::detached(Duration::from_secs(5));
        let err = fetcher
            .read_file(Path::new("/nonexistent/ipgate/list.txt"), &ctx)
            .unwrap_err();
        assert!(matches!(err, Error::ReadFile { .. }));
    }

    #[test]
    fn test_is_gzip() {
        assert!(is_gzip(&[0x1f, 0x8b, 0x08]));
        assert!(!is_gzip(b"1.1.1.1"));
        assert!(!is_gzip(&[0x1f]));
    }
}
