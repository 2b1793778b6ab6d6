//! Newline-delimited JSON framing over a pair of byte streams.
//!
//! # Responsibilities
//! - Decode one envelope per line from any `AsyncRead`
//! - Serialize envelopes from many senders onto one `AsyncWrite`
//!
//! # Design Decisions
//! - A single writer task owns the stream, so frames never interleave
//! - Malformed lines are logged and skipped; only I/O errors end a channel
//! - Each frame is flushed immediately (replies are latency bound)
//! - Blocking inputs (a worker's stdin) are read on a detached OS thread, so
//!   a read that never returns cannot hold the runtime open at exit

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Bytes pulled per blocking read.
const READ_CHUNK: usize = 8 * 1024;
/// Chunks buffered between the reader thread and the runtime.
const PIPE_CHUNKS: usize = 16;

/// IPC error type.
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("IPC I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode IPC frame: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("IPC channel closed")]
    Closed,
}

/// Read frames until EOF, handing each decoded frame to `on_frame`.
///
/// Returns the number of frames delivered.
pub async fn read_frames<R, T, F>(reader: R, peer: &str, mut on_frame: F) -> Result<u64, IpcError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
    F: FnMut(T),
{
    let mut lines = BufReader::new(reader).lines();
    let mut delivered = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(frame) => {
                delivered += 1;
                on_frame(frame);
            }
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "Discarding malformed IPC frame");
            }
        }
    }

    tracing::debug!(peer = %peer, frames = delivered, "IPC stream reached EOF");
    Ok(delivered)
}

/// Spawn the task that owns `writer`.
///
/// Frames sent on the returned queue are written in order. The task ends when
/// every sender is dropped or the stream fails.
pub fn spawn_writer<W, T>(writer: W, peer: String) -> (mpsc::UnboundedSender<T>, JoinHandle<Result<(), IpcError>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
    T: Serialize + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<T>();

    let handle = tokio::spawn(async move {
        let mut writer = BufWriter::new(writer);
        while let Some(frame) = rx.recv().await {
            let mut line = serde_json::to_vec(&frame)?;
            line.push(b'\n');
            if let Err(e) = writer.write_all(&line).await {
                tracing::debug!(peer = %peer, error = %e, "IPC write failed");
                return Err(e.into());
            }
            writer.flush().await?;
        }
        writer.shutdown().await?;
        Ok(())
    });

    (tx, handle)
}

/// Move a blocking reader onto its own OS thread and expose it as an async
/// stream.
///
/// The thread is never joined. EOF or a read error on `reader` becomes EOF on
/// the returned stream. Must be called inside a runtime.
pub fn spawn_blocking_reader<R>(reader: R, peer: &str) -> std::io::Result<DuplexStream>
where
    R: Read + Send + 'static,
{
    let (chunks_tx, mut chunks_rx) = mpsc::channel::<Vec<u8>>(PIPE_CHUNKS);

    let thread_peer = peer.to_string();
    std::thread::Builder::new()
        .name(format!("ipc-read-{peer}"))
        .spawn(move || {
            let mut reader = reader;
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if chunks_tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        tracing::debug!(peer = %thread_peer, error = %e, "IPC read failed");
                        break;
                    }
                }
            }
        })?;

    let (local, mut remote) = tokio::io::duplex(READ_CHUNK * PIPE_CHUNKS);
    tokio::spawn(async move {
        while let Some(chunk) = chunks_rx.recv().await {
            if remote.write_all(&chunk).await.is_err() {
                return;
            }
        }
        let _ = remote.shutdown().await;
    });

    Ok(local)
}
