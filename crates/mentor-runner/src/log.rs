//! Append-only run log fed by concurrent stream readers.
//!
//! Readers never touch the file. They send decoded chunks over a channel to
//! one writer task, so chunks from different streams are never interleaved
//! mid-chunk and a slow disk never stalls a pipe reader.

use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Upper bound on a single chunk read from a pipe.
const CHUNK_CAPACITY: usize = 4096;

/// Sending half of a run log. Cheap to clone, one per reader.
#[derive(Clone)]
pub(crate) struct LogSink {
    tx: mpsc::UnboundedSender<String>,
}

impl LogSink {
    /// Append a line (a newline is added).
    pub(crate) fn line(&self, message: impl AsRef<str>) {
        self.chunk(format!("{}\n", message.as_ref()));
    }

    fn chunk(&self, text: String) {
        if self.tx.send(text).is_err() {
            debug!("Run log writer already closed; dropping chunk");
        }
    }
}

/// Run log file plus its writer task.
pub(crate) struct RunLog {
    sink: LogSink,
    writer: JoinHandle<io::Result<()>>,
}

impl RunLog {
    /// Open `path` for appending and start the writer task.
    pub(crate) async fn open(path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let writer = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                file.write_all(chunk.as_bytes()).await?;
                file.flush().await?;
            }
            Ok::<(), io::Error>(())
        });

        Ok(Self {
            sink: LogSink { tx },
            writer,
        })
    }

    pub(crate) fn sink(&self) -> LogSink {
        self.sink.clone()
    }

    pub(crate) fn line(&self, message: impl AsRef<str>) {
        self.sink.line(message);
    }

    /// Drop this handle's sender and wait (bounded) for the writer to drain.
    ///
    /// The writer finishes once every reader holding a sink has finished.
    /// A reader detached by [`join_readers`] keeps it alive past the timeout.
    pub(crate) async fn close(self, wait: Duration) {
        let Self { sink, writer } = self;
        drop(sink);
        match timeout(wait, writer).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(error = %e, "Failed writing run log"),
            Ok(Err(e)) => warn!(error = %e, "Run log writer panicked"),
            Err(_) => warn!("Run log writer still busy; leaving it in the background"),
        }
    }
}

/// Drain `stream` into `sink` until EOF. Returns the number of bytes read.
///
/// Chunks end at a newline when one is buffered, otherwise at the buffer
/// size, and are decoded lossily as UTF-8.
pub(crate) fn pump<R>(stream: R, sink: LogSink) -> JoinHandle<io::Result<u64>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::with_capacity(CHUNK_CAPACITY, stream);
        let mut total = 0u64;
        loop {
            let buf = reader.fill_buf().await?;
            if buf.is_empty() {
                return Ok::<u64, io::Error>(total);
            }
            let take = buf
                .iter()
                .position(|b| *b == b'\n')
                .map_or(buf.len(), |idx| idx + 1);
            sink.chunk(String::from_utf8_lossy(&buf[..take]).into_owned());
            reader.consume(take);
            total += take as u64;
        }
    })
}

/// Join reader tasks, giving each at most `wait`. Slow readers are left
/// running in the background.
pub(crate) async fn join_readers(readers: Vec<JoinHandle<io::Result<u64>>>, wait: Duration) {
    for reader in readers {
        match timeout(wait, reader).await {
            Ok(Ok(Ok(bytes))) => debug!(bytes, "Stream reader finished"),
            Ok(Ok(Err(e))) => warn!(error = %e, "Stream reader failed"),
            Ok(Err(e)) => warn!(error = %e, "Stream reader panicked"),
            Err(_) => warn!("Stream reader did not finish in time; detaching it"),
        }
    }
}
