//! Async decoder runner for tokio applications
//!
//! Same contract as [`DecoderInvocation::run`], without tying up a thread
//! for the lifetime of the decoder. The merged output pipe is read through
//! a tokio pipe receiver, which is why this runner is unix only.

use std::fs::File;
use std::os::fd::OwnedFd;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::decoder::{decode_line, DecoderConfig, DecoderInvocation};
use crate::error::{ChannelError, Result};
use crate::frame::FrameMap;
use crate::parser::{CollectStats, FrameCollector};

/// Line reader that survives being polled from `select!`
///
/// `read_until` keeps partially read bytes in `buf` when its future is
/// dropped, so the next call picks up where the last one stopped.
struct LineStream<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineStream<R> {
    fn new(stream: R) -> Self {
        Self {
            reader: BufReader::new(stream),
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let n = self.reader.read_until(b'\n', &mut self.buf).await?;
        if n == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        let line = decode_line(&self.buf);
        self.buf.clear();
        Ok(Some(line))
    }
}

async fn wait_cancelled(cancel: Option<&CancelToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

impl DecoderInvocation {
    /// Run the decoder to completion on the current tokio runtime
    pub async fn run_async(
        &self,
        config: &DecoderConfig,
        cancel: Option<&CancelToken>,
    ) -> Result<(FrameMap, CollectStats)> {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            info!("Decode cancelled before the decoder was started");
            return Err(ChannelError::Cancelled);
        }
        info!("Starting decoder: {}", self);

        let (output, mut child) = self.spawn_merged_async()?;
        // Nothing is ever written to the decoder
        drop(child.stdin.take());

        let mut lines = LineStream::new(output);
        let mut collector = FrameCollector::new(config.malformed_policy);

        let cancelled = wait_cancelled(cancel);
        tokio::pin!(cancelled);

        loop {
            tokio::select! {
                _ = &mut cancelled => {
                    info!("Decoder cancelled after {} lines", collector.stats().lines);
                    // kill_on_drop reaps the child
                    return Err(ChannelError::Cancelled);
                }
                line = lines.next_line() => match line? {
                    Some(line) => collector.push_line(&line)?,
                    None => break,
                },
            }
        }

        if let Err(e) = child.kill().await {
            debug!("Decoder already gone: {}", e);
        }

        let (frames, stats) = collector.finish();
        info!(
            "Decoder finished: {} frames from {} lines ({} duplicates, {} malformed)",
            frames.len(),
            stats.lines,
            stats.duplicates,
            stats.malformed
        );
        Ok((frames, stats))
    }

    /// Spawn the decoder with stdout and stderr writing into one pipe
    fn spawn_merged_async(&self) -> Result<(pipe::Receiver, Child)> {
        let (reader, writer) = std::io::pipe()?;

        let mut command = Command::new(self.program());
        command
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(writer.try_clone()?)
            .stderr(writer)
            .kill_on_drop(true);
        let spawned = command.spawn();
        // Close the parent's write ends so EOF follows the decoder's exit
        drop(command);
        let child = spawned?;

        let output = pipe::Receiver::from_file(File::from(OwnedFd::from(reader)))?;
        Ok((output, child))
    }
}
