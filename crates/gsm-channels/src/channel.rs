//! Logical GSM channels
//!
//! A [`Channel`] names one logical channel inside a capture (its kind,
//! timeslot and sub-slot) and, once [`start`](Channel::start) has run the
//! external decoder, owns the frames decoded from it.
//!
//! Channel kinds:
//!
//! - **StandaloneControl**: SDCCH/8, eight dedicated sub-channels on one
//!   timeslot. Decoded through the `SDCCH8` decoder mode.
//! - **NonCombined**: BCCH on timeslot 0 of the C0 carrier. Declared so the
//!   taxonomy is complete; decoding it is not implemented yet.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::cell::{Cell, DeviceConfig};
use crate::decoder::{DecodeTarget, DecoderConfig, DecoderInvocation};
use crate::error::{ChannelError, Result};
use crate::frame::FrameMap;
use crate::message::RrMessage;

/// Kind of logical channel, one per external decoder mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelKind {
    /// SDCCH/8 stand-alone dedicated control channel
    StandaloneControl,
    /// Non-combined BCCH on the C0 carrier
    NonCombined,
}

impl ChannelKind {
    /// Mode name understood by the external decoder (`-m`)
    pub fn mode_name(&self) -> &'static str {
        match self {
            ChannelKind::StandaloneControl => "SDCCH8",
            ChannelKind::NonCombined => "BCCH",
        }
    }

    /// Whether `start` can actually decode this kind
    pub fn is_implemented(&self) -> bool {
        match self {
            ChannelKind::StandaloneControl => true,
            ChannelKind::NonCombined => false,
        }
    }

    /// Check a timeslot/sub-slot pair against this kind's domain
    pub fn validate_slots(&self, timeslot: u8, subslot: Option<u8>) -> Result<()> {
        match self {
            ChannelKind::StandaloneControl => {
                if timeslot > 7 {
                    return Err(ChannelError::invalid(format!(
                        "SDCCH8 timeslot must be 0-7, got {}",
                        timeslot
                    )));
                }
                match subslot {
                    Some(s) if s <= 7 => Ok(()),
                    Some(s) => Err(ChannelError::invalid(format!(
                        "SDCCH8 sub-slot must be 0-7, got {}",
                        s
                    ))),
                    None => Err(ChannelError::invalid("SDCCH8 requires a sub-slot")),
                }
            }
            ChannelKind::NonCombined => {
                if timeslot != 0 {
                    return Err(ChannelError::invalid(format!(
                        "BCCH lives on timeslot 0, got {}",
                        timeslot
                    )));
                }
                match subslot {
                    None => Ok(()),
                    Some(s) => Err(ChannelError::invalid(format!(
                        "BCCH has no sub-slot, got {}",
                        s
                    ))),
                }
            }
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mode_name())
    }
}

impl FromStr for ChannelKind {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SDCCH8" | "SDCCH/8" => Ok(ChannelKind::StandaloneControl),
            "BCCH" => Ok(ChannelKind::NonCombined),
            _ => Err(ChannelError::invalid(format!("unknown channel type: {}", s))),
        }
    }
}

/// Everything a decode needs besides the channel itself
#[derive(Debug, Clone)]
pub struct DecodeContext {
    /// Cell the capture was recorded from
    pub cell: Cell,
    /// Receiver settings of the capture
    pub device: DeviceConfig,
    /// Either empty or `[algorithm, key]`
    pub key_tokens: Vec<String>,
    /// External decoder settings
    pub decoder: DecoderConfig,
    /// Optional handle to abort the decode
    pub cancel: Option<CancelToken>,
}

impl DecodeContext {
    /// Context for an unencrypted decode with default settings
    pub fn new(cell: Cell) -> Self {
        Self {
            cell,
            device: DeviceConfig::default(),
            key_tokens: Vec::new(),
            decoder: DecoderConfig::default(),
            cancel: None,
        }
    }

    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Set the key tokens (`[algorithm, key]`)
    pub fn with_key<S: Into<String>>(mut self, tokens: impl IntoIterator<Item = S>) -> Self {
        self.key_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_decoder(mut self, decoder: DecoderConfig) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Decode state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Not decoded yet, no frames
    Empty,
    /// Decoder ran to completion; the frame map may be empty
    Populated,
}

/// A logical channel and, once decoded, its frames
#[derive(Debug, Clone)]
pub struct Channel {
    kind: ChannelKind,
    timeslot: u8,
    subslot: Option<u8>,
    capture_file: Option<PathBuf>,
    frames: Option<FrameMap>,
}

impl Channel {
    /// Create an empty channel of `kind`
    pub fn new(
        kind: ChannelKind,
        timeslot: u8,
        subslot: Option<u8>,
        capture_file: Option<PathBuf>,
    ) -> Result<Self> {
        kind.validate_slots(timeslot, subslot)?;
        Ok(Self {
            kind,
            timeslot,
            subslot,
            capture_file,
            frames: None,
        })
    }

    /// Create an empty channel from a channel type name (`SDCCH8`, `BCCH`)
    pub fn decoder(
        channel_type: &str,
        timeslot: u8,
        subslot: Option<u8>,
        capture_file: Option<PathBuf>,
    ) -> Result<Self> {
        Self::new(channel_type.parse()?, timeslot, subslot, capture_file)
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn timeslot(&self) -> u8 {
        self.timeslot
    }

    /// Sub-slot, `None` when not applicable
    pub fn subslot(&self) -> Option<u8> {
        self.subslot
    }

    pub fn capture_file(&self) -> Option<&Path> {
        self.capture_file.as_deref()
    }

    pub fn state(&self) -> ChannelState {
        match self.frames {
            Some(_) => ChannelState::Populated,
            None => ChannelState::Empty,
        }
    }

    pub fn is_populated(&self) -> bool {
        self.frames.is_some()
    }

    /// Decoded frames, `None` until a decode has completed
    pub fn recorded_frames(&self) -> Option<&FrameMap> {
        self.frames.as_ref()
    }

    /// Consume the channel and return its decoded frames
    pub fn into_frames(self) -> Option<FrameMap> {
        self.frames
    }

    /// Frame numbers whose layer 3 header is `msg`, in frame order
    pub fn find_message(&self, msg: RrMessage) -> Vec<u32> {
        self.recorded_frames()
            .map(|frames| {
                frames
                    .values()
                    .filter(|f| msg.matches(f))
                    .map(|f| f.frame_number())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Decode the channel, blocking until the decoder exits
    ///
    /// On success the channel holds the decoded frames (possibly none). On
    /// any error the channel stays empty. A channel decodes once; a second
    /// call fails with [`ChannelError::AlreadyDecoded`].
    pub fn start(&mut self, ctx: &DecodeContext) -> Result<&FrameMap> {
        let invocation = self.prepare(ctx)?;
        let (frames, _) = invocation.run(&ctx.decoder, ctx.cancel.as_ref())?;
        Ok(self.populate(frames))
    }

    /// Async variant of [`start`](Self::start)
    #[cfg(unix)]
    pub async fn start_async(&mut self, ctx: &DecodeContext) -> Result<&FrameMap> {
        let invocation = self.prepare(ctx)?;
        let (frames, _) = invocation
            .run_async(&ctx.decoder, ctx.cancel.as_ref())
            .await?;
        Ok(self.populate(frames))
    }

    /// Validate state and arguments and build the decoder command line
    pub fn invocation(&self, ctx: &DecodeContext) -> Result<DecoderInvocation> {
        if !self.kind.is_implemented() {
            return Err(ChannelError::NotImplemented(self.kind));
        }
        let capture_file = self.capture_file.as_deref().ok_or_else(|| {
            ChannelError::invalid(format!("{} channel has no capture file", self.kind))
        })?;

        let target = DecodeTarget {
            mode: self.kind.mode_name(),
            timeslot: self.timeslot,
            subslot: self.subslot,
            capture_file,
        };
        DecoderInvocation::build(&ctx.decoder, &target, &ctx.cell, &ctx.key_tokens)
    }

    fn prepare(&self, ctx: &DecodeContext) -> Result<DecoderInvocation> {
        if self.is_populated() {
            return Err(ChannelError::AlreadyDecoded);
        }
        let invocation = self.invocation(ctx)?;
        debug!(
            "Decoding {} ts={} sub={:?} with device {:?}",
            self.kind, self.timeslot, self.subslot, ctx.device
        );
        Ok(invocation)
    }

    fn populate(&mut self, frames: FrameMap) -> &FrameMap {
        info!(
            "{} ts={} decoded: {} frames",
            self.kind,
            self.timeslot,
            frames.len()
        );
        self.frames.insert(frames)
    }
}
