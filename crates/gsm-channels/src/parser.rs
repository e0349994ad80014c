//! Frame-line parser for decoder output
//!
//! The decoder prints one frame per line in verbose mode:
//!
//! ```text
//! 1234567 3: 01 06 3f 00 ...
//! ```
//!
//! i.e. a frame number, a secondary index (optionally followed by a colon)
//! and the space-separated byte tokens. Every other line (banners, progress,
//! errors) is ignored.

use std::io::BufRead;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace, warn};

use crate::error::{ChannelError, Result};
use crate::frame::{Frame, FrameMap};

/// Grammar of a frame line: frame number, secondary index, tokens
static FRAME_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([0-9]+)\s+([0-9]+):?\s+(\S+(?: \S+)*)\s*$").expect("frame grammar compiles")
});

/// What to do with a line that matches the grammar but cannot be parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MalformedPolicy {
    /// Log and drop the line, keep decoding
    #[default]
    Skip,
    /// Fail the whole decode with [`ChannelError::MalformedFrame`]
    Abort,
}

/// Parse one line of decoder output
///
/// Returns `Ok(None)` when the line is not a frame record.
pub fn parse_frame_line(line: &str) -> Result<Option<Frame>> {
    let Some(caps) = FRAME_LINE.captures(line) else {
        return Ok(None);
    };

    let frame_number = parse_field(line, &caps[1], "frame number")?;
    let block_index = parse_field(line, &caps[2], "block index")?;
    let tokens = caps[3].split(' ').map(str::to_string).collect();

    Ok(Some(Frame::new(frame_number, block_index, tokens)))
}

fn parse_field(line: &str, field: &str, name: &str) -> Result<u32> {
    field
        .parse::<u32>()
        .map_err(|e| ChannelError::MalformedFrame {
            line: line.to_string(),
            reason: format!("{} {:?}: {}", name, field, e),
        })
}

/// Summary of one collection run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Lines seen, frame or not
    pub lines: usize,
    /// Frame lines accepted (duplicates included)
    pub frames: usize,
    /// Accepted frames that replaced an earlier frame with the same number
    pub duplicates: usize,
    /// Lines dropped under [`MalformedPolicy::Skip`]
    pub malformed: usize,
}

/// Accumulates frames from decoder output lines
///
/// Frames are kept locally until [`finish`](Self::finish) so that a failed
/// decode never leaves a partial frame set on the channel. A later frame
/// with an already-seen frame number replaces the earlier one.
#[derive(Debug, Default)]
pub struct FrameCollector {
    frames: FrameMap,
    stats: CollectStats,
    policy: MalformedPolicy,
}

impl FrameCollector {
    /// Create a collector with the given malformed-line policy
    pub fn new(policy: MalformedPolicy) -> Self {
        Self {
            frames: FrameMap::new(),
            stats: CollectStats::default(),
            policy,
        }
    }

    /// Feed one output line
    pub fn push_line(&mut self, line: &str) -> Result<()> {
        self.stats.lines += 1;
        trace!("decoder: {}", line);

        match parse_frame_line(line) {
            Ok(Some(frame)) => {
                self.insert(frame);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => match self.policy {
                MalformedPolicy::Skip => {
                    warn!("Skipping decoder line: {}", e);
                    self.stats.malformed += 1;
                    Ok(())
                }
                MalformedPolicy::Abort => Err(e),
            },
        }
    }

    fn insert(&mut self, frame: Frame) {
        self.stats.frames += 1;
        let number = frame.frame_number();
        if self.frames.insert(number, frame).is_some() {
            debug!("Frame {} reported again, keeping the latest", number);
            self.stats.duplicates += 1;
        }
    }

    /// Number of distinct frames collected so far
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frame has been collected yet
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Counters for the lines seen so far
    pub fn stats(&self) -> CollectStats {
        self.stats
    }

    /// Consume the collector and return the frame set
    pub fn finish(self) -> (FrameMap, CollectStats) {
        (self.frames, self.stats)
    }
}

/// Collect every frame from a line-oriented reader until EOF
pub fn collect_frames<R: BufRead>(reader: R, policy: MalformedPolicy) -> Result<FrameMap> {
    let mut collector = FrameCollector::new(policy);
    for line in reader.lines() {
        collector.push_line(&line?)?;
    }
    Ok(collector.finish().0)
}
