//! Loopback coordinator answering with canned replies.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use multinode_config::{CoordinatorEndpoint, PollerConfig};
use serde_json::Value;

/// How long the server waits for each expected connection.
const ACCEPT_TIMEOUT: Duration = Duration::from_secs(5);

/// A coordinator that serves one scripted reply per connection.
///
/// Each connection's request is read to end of input, recorded, and answered
/// with the next reply. The server stops once every reply has been sent or a
/// connection fails to arrive in time.
pub struct FakeCoordinator {
    port: u16,
    requests: Arc<Mutex<Vec<String>>>,
    result: Arc<Mutex<Option<Result<()>>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FakeCoordinator {
    /// Spawns the server on an ephemeral loopback port.
    ///
    /// # Errors
    ///
    /// Fails if the listener cannot be bound.
    pub fn spawn<I, R>(replies: I) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        let replies: Vec<String> = replies.into_iter().map(Into::into).collect();
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake coordinator")?;
        listener
            .set_nonblocking(true)
            .context("fake coordinator nonblocking")?;
        let port = listener.local_addr().context("local addr")?.port();
        let requests: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let result: Arc<Mutex<Option<Result<()>>>> = Arc::new(Mutex::new(None));
        let requests_clone = Arc::clone(&requests);
        let result_clone = Arc::clone(&result);
        let handle = thread::spawn(move || {
            let outcome = Self::serve(&listener, &replies, &requests_clone);
            if let Ok(mut guard) = result_clone.lock() {
                *guard = Some(outcome);
            }
        });
        Ok(Self {
            port,
            requests,
            result,
            handle: Some(handle),
        })
    }

    /// Port the server listens on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Address of the server.
    #[must_use]
    pub fn endpoint(&self) -> CoordinatorEndpoint {
        CoordinatorEndpoint::new("127.0.0.1", self.port)
    }

    /// Poller configuration pointing at the server with short delays.
    #[must_use]
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig::default()
            .with_endpoint(&self.endpoint())
            .with_poll_delay(Duration::from_millis(10))
            .with_backoff_increment(Duration::from_millis(10))
    }

    /// Waits for the server to finish and returns the decoded requests.
    ///
    /// # Errors
    ///
    /// Fails if the server thread failed or a request was not JSON.
    pub fn take_requests(&mut self) -> Result<Vec<Value>> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| anyhow!("fake coordinator thread panicked"))?;
        }
        if let Some(outcome) = self
            .result
            .lock()
            .map_err(|error| anyhow!("lock fake coordinator result: {error}"))?
            .take()
        {
            outcome.context("fake coordinator failed")?;
        }
        let requests = self
            .requests
            .lock()
            .map_err(|error| anyhow!("lock requests: {error}"))?;
        requests
            .iter()
            .map(|request| {
                serde_json::from_str(request)
                    .with_context(|| format!("request is not JSON: {request:?}"))
            })
            .collect()
    }

    fn serve(
        listener: &TcpListener,
        replies: &[String],
        requests: &Arc<Mutex<Vec<String>>>,
    ) -> Result<()> {
        for reply in replies {
            let Some(stream) = Self::accept(listener)? else {
                return Ok(());
            };
            Self::answer(stream, reply, requests)?;
        }
        Ok(())
    }

    fn accept(listener: &TcpListener) -> Result<Option<TcpStream>> {
        let deadline = Instant::now() + ACCEPT_TIMEOUT;
        loop {
            match listener.accept() {
                Ok((stream, _)) => {
                    stream
                        .set_nonblocking(false)
                        .context("blocking accepted stream")?;
                    return Ok(Some(stream));
                }
                Err(ref error)
                    if error.kind() == io::ErrorKind::WouldBlock && Instant::now() < deadline =>
                {
                    thread::sleep(Duration::from_millis(5));
                }
                // The client gave up or finished early; stop without failing.
                Err(ref error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(error) => return Err(error).context("accept connection"),
            }
        }
    }

    fn answer(mut stream: TcpStream, reply: &str, requests: &Arc<Mutex<Vec<String>>>) -> Result<()> {
        let mut request = String::new();
        stream
            .read_to_string(&mut request)
            .context("read coordinator request")?;
        requests
            .lock()
            .map_err(|error| anyhow!("lock requests: {error}"))?
            .push(request);
        stream
            .write_all(reply.as_bytes())
            .context("write coordinator reply")?;
        Ok(())
    }
}

impl Drop for FakeCoordinator {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            drop(handle.join());
        }
    }
}
