//! External decoder invocation
//!
//! Every channel variant maps onto one mode of the external decoder. This
//! module turns a channel's coordinates plus the cell and key material into
//! a command line:
//!
//! ```text
//! airprobe_decode.py -m SDCCH8 -t 1 -u 3 -c /captures/cell.cfile -f 935.2e6 [-k <kc> -e <a5>] -v
//! ```
//!
//! and runs it with stdout and stderr redirected into a single pipe, feeding
//! the lines through a [`FrameCollector`] in the order they were written.

use std::ffi::OsString;
use std::fmt;
use std::io::{self, BufRead, BufReader, PipeReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::cell::{Cell, KeyMaterial};
use crate::error::{ChannelError, Result};
use crate::frame::FrameMap;
use crate::parser::{CollectStats, FrameCollector, MalformedPolicy};

/// Decoder executable used when none is configured
pub const DEFAULT_DECODER: &str = "airprobe_decode.py";

/// How to reach and drive the external decoder
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DecoderConfig {
    /// Decoder executable
    pub program: PathBuf,
    /// Arguments placed before the decoder arguments (e.g. a script path
    /// when `program` is an interpreter)
    pub program_args: Vec<String>,
    /// Handling of frame lines with unusable numbers
    pub malformed_policy: MalformedPolicy,
    /// How often a blocking decode checks for cancellation (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_DECODER),
            program_args: Vec::new(),
            malformed_policy: MalformedPolicy::Skip,
            poll_interval_ms: 50,
        }
    }
}

impl DecoderConfig {
    /// Config running `program` with default settings
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Channel coordinates the decoder is pointed at
#[derive(Debug, Clone, Copy)]
pub struct DecodeTarget<'a> {
    /// Decoder mode (`-m`)
    pub mode: &'static str,
    pub timeslot: u8,
    /// `None` when the channel has no sub-slot
    pub subslot: Option<u8>,
    pub capture_file: &'a Path,
}

/// A fully built decoder command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderInvocation {
    program: PathBuf,
    args: Vec<OsString>,
}

impl DecoderInvocation {
    /// Build the command line for `target`
    ///
    /// `key_tokens` must hold either nothing or `[algorithm, key]`.
    pub fn build(
        config: &DecoderConfig,
        target: &DecodeTarget<'_>,
        cell: &Cell,
        key_tokens: &[String],
    ) -> Result<Self> {
        let key = KeyMaterial::from_tokens(key_tokens)?;

        if target.capture_file.as_os_str().is_empty() {
            return Err(ChannelError::invalid("capture file path is empty"));
        }
        let capture = std::path::absolute(target.capture_file)?;

        let mut args: Vec<OsString> = config.program_args.iter().map(OsString::from).collect();
        args.push("-m".into());
        args.push(target.mode.into());
        args.push("-t".into());
        args.push(target.timeslot.to_string().into());
        if let Some(subslot) = target.subslot {
            args.push("-u".into());
            args.push(subslot.to_string().into());
        }
        args.push("-c".into());
        args.push(capture.into_os_string());
        args.push("-f".into());
        args.push(cell.frequency.clone().into());
        if let Some(key) = key {
            args.push("-k".into());
            args.push(key.key.into());
            args.push("-e".into());
            args.push(key.algorithm.into());
        }
        args.push("-v".into());

        Ok(Self {
            program: config.program.clone(),
            args,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Arguments as strings, for display and tests
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Run the decoder to completion on the calling thread
    ///
    /// stdin is closed immediately. stdout and stderr share one pipe, so
    /// lines arrive in the order the decoder wrote them. The process is
    /// killed once the pipe hits EOF, when the token is cancelled, or when
    /// any error ends the read loop.
    pub fn run(
        &self,
        config: &DecoderConfig,
        cancel: Option<&CancelToken>,
    ) -> Result<(FrameMap, CollectStats)> {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            info!("Decode cancelled before the decoder was started");
            return Err(ChannelError::Cancelled);
        }
        info!("Starting decoder: {}", self);

        let (output, mut child) = self.spawn_merged()?;
        // Nothing is ever written to the decoder
        drop(child.stdin.take());
        let mut guard = ChildGuard::new(child);

        let (tx, rx) = mpsc::channel();
        let reader = spawn_line_reader(output, tx)?;

        let mut collector = FrameCollector::new(config.malformed_policy);
        let poll = config.poll_interval();
        loop {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                // The reader stays detached: a grandchild may still hold the pipe
                info!("Decoder cancelled after {} lines", collector.stats().lines);
                return Err(ChannelError::Cancelled);
            }
            match rx.recv_timeout(poll) {
                Ok(Ok(line)) => collector.push_line(&line)?,
                Ok(Err(e)) => return Err(e.into()),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        guard.terminate();
        if reader.join().is_err() {
            warn!("Decoder output reader panicked");
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
    fn spawn_merged(&self) -> Result<(PipeReader, Child)> {
        let (reader, writer) = io::pipe()?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(writer.try_clone()?)
            .stderr(writer);
        let spawned = command.spawn();
        // Close the parent's write ends so EOF follows the decoder's exit
        drop(command);

        Ok((reader, spawned?))
    }
}

impl fmt::Display for DecoderInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Forward every line of `stream` to `tx` until EOF
///
/// Invalid UTF-8 is replaced rather than treated as a read failure.
fn spawn_line_reader<R>(stream: R, tx: Sender<io::Result<String>>) -> Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("decoder-output".to_string())
        .spawn(move || {
            let mut reader = BufReader::new(stream);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(Ok(decode_line(&buf))).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        })?;
    Ok(handle)
}

pub(crate) fn decode_line(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// Kills and reaps the decoder however the read loop ends
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        self.reaped = true;

        if let Err(e) = self.child.kill() {
            debug!("Decoder already gone: {}", e);
        }
        match self.child.wait() {
            Ok(status) => debug!("Decoder exited: {}", status),
            Err(e) => warn!("Failed to reap decoder: {}", e),
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(capture: &Path) -> DecodeTarget<'_> {
        DecodeTarget {
            mode: "SDCCH8",
            timeslot: 1,
            subslot: Some(3),
            capture_file: capture,
        }
    }

    fn build(key: &[&str]) -> Result<DecoderInvocation> {
        let key: Vec<String> = key.iter().map(|k| k.to_string()).collect();
        DecoderInvocation::build(
            &DecoderConfig::default(),
            &target(Path::new("/captures/cell.cfile")),
            &Cell::new("935.2e6"),
            &key,
        )
    }

    #[test]
    fn test_args_without_key() {
        let inv = build(&[]).unwrap();
        assert_eq!(inv.program(), Path::new(DEFAULT_DECODER));
        assert_eq!(
            inv.args_lossy(),
            vec![
                "-m",
                "SDCCH8",
                "-t",
                "1",
                "-u",
                "3",
                "-c",
                "/captures/cell.cfile",
                "-f",
                "935.2e6",
                "-v"
            ]
        );
    }

    #[test]
    fn test_args_with_key() {
        let inv = build(&["1", "1122334455667788"]).unwrap();
        let args = inv.args_lossy();
        assert_eq!(
            &args[10..],
            &["-k", "1122334455667788", "-e", "1", "-v"].map(String::from)
        );
    }

    #[test]
    fn test_single_key_token_rejected() {
        assert!(matches!(build(&["1"]), Err(ChannelError::InvalidArgument(_))));
    }

    #[test]
    fn test_subslot_not_applicable() {
        let capture = Path::new("/captures/cell.cfile");
        let target = DecodeTarget {
            mode: "BCCH",
            timeslot: 0,
            subslot: None,
            capture_file: capture,
        };
        let inv =
            DecoderInvocation::build(&DecoderConfig::default(), &target, &Cell::new("1"), &[])
                .unwrap();
        assert!(!inv.args_lossy().contains(&"-u".to_string()));
    }

    #[test]
    fn test_relative_capture_made_absolute() {
        let inv = DecoderInvocation::build(
            &DecoderConfig::default(),
            &target(Path::new("cell.cfile")),
            &Cell::new("1"),
            &[],
        )
        .unwrap();
        let capture = PathBuf::from(&inv.args()[7]);
        assert!(capture.is_absolute());
        assert!(capture.ends_with("cell.cfile"));
    }

    #[test]
    fn test_empty_capture_rejected() {
        let result = DecoderInvocation::build(
            &DecoderConfig::default(),
            &target(Path::new("")),
            &Cell::new("1"),
            &[],
        );
        assert!(matches!(result, Err(ChannelError::InvalidArgument(_))));
    }

    #[test]
    fn test_program_args_come_first() {
        let config = DecoderConfig {
            program: PathBuf::from("python3"),
            program_args: vec!["/opt/airprobe/airprobe_decode.py".into()],
            ..Default::default()
        };
        let inv = DecoderInvocation::build(
            &config,
            &target(Path::new("/c.cfile")),
            &Cell::new("1"),
            &[],
        )
        .unwrap();
        assert_eq!(inv.program(), Path::new("python3"));
        assert_eq!(inv.args_lossy()[0], "/opt/airprobe/airprobe_decode.py");
        assert_eq!(inv.args_lossy()[1], "-m");
    }

    #[test]
    fn test_display() {
        let inv = build(&[]).unwrap();
        assert_eq!(
            inv.to_string(),
            "airprobe_decode.py -m SDCCH8 -t 1 -u 3 -c /captures/cell.cfile -f 935.2e6 -v"
        );
    }

    #[test]
    fn test_decode_line_lossy() {
        assert_eq!(decode_line(b"12 3 aa\r\n"), "12 3 aa");
        assert_eq!(decode_line(b"\xff 1\n"), "\u{fffd} 1");
    }

    #[test]
    fn test_spawn_failure_is_io() {
        let config = DecoderConfig::with_program("/nonexistent/airprobe_decode.py");
        let inv = DecoderInvocation::build(
            &config,
            &target(Path::new("/c.cfile")),
            &Cell::new("1"),
            &[],
        )
        .unwrap();
        assert!(matches!(inv.run(&config, None), Err(ChannelError::Io(_))));
    }

    #[test]
    fn test_cancelled_token_skips_spawn() {
        // A missing program would fail with Io if a spawn were attempted
        let config = DecoderConfig::with_program("/nonexistent/airprobe_decode.py");
        let inv = DecoderInvocation::build(
            &config,
            &target(Path::new("/c.cfile")),
            &Cell::new("1"),
            &[],
        )
        .unwrap();
        let token = CancelToken::new();
        token.cancel();

        assert!(matches!(
            inv.run(&config, Some(&token)),
            Err(ChannelError::Cancelled)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_keeps_write_order_across_streams() {
        let config = DecoderConfig {
            program: PathBuf::from("sh"),
            program_args: vec![
                "-c".into(),
                "echo '5 0 first' >&2; echo '5 0 second'; echo '6 0 a'; echo '6 0 b' >&2".into(),
                "decoder".into(),
            ],
            ..Default::default()
        };
        let inv = DecoderInvocation::build(
            &config,
            &target(Path::new("/c.cfile")),
            &Cell::new("1"),
            &[],
        )
        .unwrap();

        for _ in 0..50 {
            let (frames, stats) = inv.run(&config, None).unwrap();
            assert_eq!(frames[&5].tokens(), ["second"]);
            assert_eq!(frames[&6].tokens(), ["b"]);
            assert_eq!(stats.duplicates, 2);
        }
    }
}
