//! GNSS Receiver Protocol Framing
//!
//! This crate deframes the single UART byte stream of a u-blox style GNSS
//! receiver, which interleaves two independent framing protocols: NMEA 0183
//! text sentences and UBX binary packets. The [`Framer`] consumes the stream
//! one byte at a time, auto-detects the protocol from its start token,
//! accumulates and validates the frame, and hands out the raw payload of
//! every frame whose checksum verifies. Frame *meaning* (sentence fields,
//! message IDs) is a consumer concern.
//!
//! # Frame formats
//!
//! NMEA sentences are ASCII with an XOR checksum in two hex digits:
//! ```text
//! ┌─────┬──────────────┬─────┬───────────┬─────────┐
//! │ '$' │ BODY         │ '*' │ CS (hex2) │ CR LF   │
//! │ 1B  │ 0–82B ASCII  │ 1B  │ 2B        │ 2B      │
//! └─────┴──────────────┴─────┴───────────┴─────────┘
//! ```
//!
//! UBX packets are binary with a little-endian length and a running-sum
//! checksum pair:
//! ```text
//! ┌──────┬──────┬──────────┬──────────┬──────┬──────┐
//! │ 0xB5 │ 0x62 │ LEN (LE) │ PAYLOAD  │ CK_A │ CK_B │
//! │ 1B   │ 1B   │ 2B       │ 0–256B   │ 1B   │ 1B   │
//! └──────┴──────┴──────────┴──────────┴──────┴──────┘
//! ```
//!
//! Malformed input never surfaces as a caller-visible failure: the framer
//! silently drops the frame in progress and resumes scanning for start
//! tokens on the very next byte, so a noisy link resynchronizes on its own.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod framer;
pub mod nmea;
pub mod session;
pub mod ubx;

pub use framer::{Event, Framer, FramingError, ValidFrame, BUF_CAPACITY, FRAME_TIMEOUT_MS};
pub use session::{FrameSink, FramingStats, Session, TimeoutSignal};
