//! GSM Logical Channel Decoding
//!
//! This crate models GSM logical channels and extracts their frames from
//! the output of an external decoder (`airprobe_decode.py` by default).
//!
//! # Architecture
//!
//! - [`Channel`] identifies a logical channel (kind, timeslot, sub-slot,
//!   capture file) and owns its decoded frames once [`Channel::start`] ran
//! - [`ChannelKind`] is the set of channel variants; each maps onto one
//!   decoder mode
//! - [`DecoderInvocation`] builds the decoder command line and runs it,
//!   blocking or, on unix, on tokio
//! - [`parse_frame_line`] and [`FrameCollector`] turn decoder output lines
//!   into [`Frame`]s keyed by frame number
//!
//! The decoder's stdout and stderr are redirected into one pipe and read as
//! a single line stream in write order. Lines that are not frame records are
//! ignored.
//!
//! # Example
//!
//! ```rust,no_run
//! use gsm_channels::{Cell, Channel, DecodeContext, RrMessage};
//!
//! let mut sdcch = Channel::decoder("SDCCH8", 1, Some(3), Some("capture.cfile".into()))?;
//! let ctx = DecodeContext::new(Cell::new("935.2e6")).with_key(["1", "1122334455667788"]);
//!
//! let frames = sdcch.start(&ctx)?;
//! println!("{} frames", frames.len());
//!
//! for number in sdcch.find_message(RrMessage::IMMEDIATE_ASSIGNMENT) {
//!     println!("Immediate assignment at frame {}", number);
//! }
//! # Ok::<(), gsm_channels::ChannelError>(())
//! ```

#[cfg(unix)]
mod async_decoder;
pub mod cancel;
pub mod cell;
pub mod channel;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod message;
pub mod parser;

pub use cancel::CancelToken;
pub use cell::{Cell, DeviceConfig, KeyMaterial};
pub use channel::{Channel, ChannelKind, ChannelState, DecodeContext};
pub use decoder::{DecodeTarget, DecoderConfig, DecoderInvocation, DEFAULT_DECODER};
pub use error::{ChannelError, Result};
pub use frame::{Frame, FrameMap};
pub use message::RrMessage;
pub use parser::{collect_frames, parse_frame_line, CollectStats, FrameCollector, MalformedPolicy};
