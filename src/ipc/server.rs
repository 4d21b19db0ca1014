//! Unix socket JSON-RPC server.
//!
//! One task per connection, one newline-delimited request per round trip,
//! strictly in order on each connection. All connection tasks are tracked so
//! shutdown can wait for in-flight requests to finish writing.

use super::dispatcher;
use super::registry::{Handler, MethodRegistry};
use anyhow::{Context, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Longest accepted request line. Longer lines have no recoverable boundary,
/// so the connection is closed.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Outcome of [`SocketServer::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Whether every connection finished before the drain timeout.
    pub drained: bool,
    /// Connections still running when shutdown returned.
    pub remaining: usize,
}

pub struct SocketServer {
    path: PathBuf,
    registry: Arc<MethodRegistry>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    listener: Mutex<Option<UnixListener>>,
    drain_timeout: Duration,
}

impl SocketServer {
    /// Creates a server whose lifetime is bounded by `parent`.
    pub fn new(
        path: impl Into<PathBuf>,
        registry: Arc<MethodRegistry>,
        parent: &CancellationToken,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            path: path.into(),
            registry,
            cancel: parent.child_token(),
            tracker: TaskTracker::new(),
            listener: Mutex::new(None),
            drain_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    pub fn register(&self, name: impl Into<String>, handler: Handler) {
        self.registry.register(name, handler);
    }

    /// Token cancelled when the server stops accepting.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Binds the socket, replacing a stale socket file.
    ///
    /// Fails when another daemon already answers on the path, or when the
    /// path holds anything other than a socket.
    pub async fn bind(&self) -> Result<()> {
        if let Ok(metadata) = self.path.symlink_metadata() {
            use std::os::unix::fs::FileTypeExt;
            if !metadata.file_type().is_socket() {
                anyhow::bail!(
                    "Refusing to replace {}: not a socket",
                    self.path.display()
                );
            }
            if UnixStream::connect(&self.path).await.is_ok() {
                anyhow::bail!(
                    "Another daemon is already listening on {}",
                    self.path.display()
                );
            }
            tracing::info!(path = %self.path.display(), "Removing stale socket");
            std::fs::remove_file(&self.path).with_context(|| {
                format!("Failed to remove stale socket: {}", self.path.display())
            })?;
        }

        let listener = UnixListener::bind(&self.path)
            .with_context(|| format!("Failed to bind Unix socket: {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| {
                    format!("Failed to set socket permissions: {}", self.path.display())
                })?;
        }

        *self.listener.lock().await = Some(listener);
        Ok(())
    }

    /// Accepts connections until the server is cancelled.
    pub async fn serve(&self) -> Result<()> {
        let listener = self
            .listener
            .lock()
            .await
            .take()
            .context("Socket is not bound")?;
        tracing::info!(path = %self.path.display(), "Listening");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let registry = Arc::clone(&self.registry);
                        let cancel = self.cancel.clone();
                        self.tracker.spawn(handle_connection(stream, registry, cancel));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    }
                },
            }
        }

        tracing::debug!("Stopped accepting connections");
        Ok(())
    }

    /// `bind` followed by `serve`.
    pub async fn start(&self) -> Result<()> {
        self.bind().await?;
        self.serve().await
    }

    /// Stops accepting, waits for connections to drain and removes the socket
    /// file. The file is removed even when the drain times out.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.cancel.cancel();
        self.tracker.close();
        drop(self.listener.lock().await.take());

        let drained = tokio::time::timeout(self.drain_timeout, self.tracker.wait())
            .await
            .is_ok();
        let report = ShutdownReport {
            drained,
            remaining: self.tracker.len(),
        };

        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove socket")
            }
        }

        if drained {
            tracing::info!("Server shut down cleanly");
        } else {
            tracing::warn!(remaining = report.remaining, "Shutdown timed out with open connections");
        }
        report
    }
}

enum Frame {
    Line,
    TooLong,
    Eof,
}

/// Reads one newline-terminated frame into `buf`.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let limit = (MAX_FRAME_BYTES + 1) as u64;
    let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(Frame::Eof);
    }
    if buf.last() != Some(&b'\n') && buf.len() > MAX_FRAME_BYTES {
        return Ok(Frame::TooLong);
    }
    Ok(Frame::Line)
}

async fn handle_connection(
    stream: UnixStream,
    registry: Arc<MethodRegistry>,
    cancel: CancellationToken,
) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = read_frame(&mut reader, &mut line) => frame,
        };
        match frame {
            Ok(Frame::Line) => {}
            Ok(Frame::Eof) => break,
            Ok(Frame::TooLong) => {
                tracing::warn!(limit = MAX_FRAME_BYTES, "Request line too long, closing connection");
                break;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Connection read failed");
                break;
            }
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let response = dispatcher::handle_line(&registry, &line).await;
        let mut payload = match serde_json::to_vec(&response) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response");
                break;
            }
        };
        payload.push(b'\n');
        if let Err(e) = writer.write_all(&payload).await {
            tracing::debug!(error = %e, "Connection write failed");
            break;
        }
    }
}

#[cfg(test)]
#[path = "tests/server_tests.rs"]
mod tests;
