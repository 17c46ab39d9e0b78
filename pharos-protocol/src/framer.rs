//! Byte-at-a-time deframing of the receiver's interleaved NMEA/UBX stream.
//!
//! The [`Framer`] is a state machine fed one byte per call, the way a UART
//! receive interrupt delivers them. It auto-detects which protocol a frame
//! belongs to from its start token, accumulates the frame into a fixed
//! buffer, folds every byte into the protocol's checksum as it arrives, and
//! reports a [`ValidFrame`] only once the trailing checksum verifies.
//!
//! Malformed input is never an error the caller has to handle: the framer
//! drops the frame in progress, returns to start-token scanning and picks
//! up the next frame on its own. The discard reason is still reported so an
//! outer diagnostic layer can count drops.

use heapless::Vec;

use crate::nmea;
use crate::ubx;

/// Frame-completion deadline requested after every accepted byte, in
/// milliseconds. Matches the stall timeout of the receiver's own UART.
pub const FRAME_TIMEOUT_MS: u32 = 1_000;

/// Capacity of the shared accumulation buffer: the larger of the two
/// protocols' storage needs. The UBX track stores its length field ahead
/// of the payload, so its requirement is the field width plus the payload
/// cap.
pub const BUF_CAPACITY: usize =
    if nmea::MAX_BODY_LEN > ubx::LEN_FIELD_LEN + ubx::MAX_PAYLOAD_LEN {
        nmea::MAX_BODY_LEN
    } else {
        ubx::LEN_FIELD_LEN + ubx::MAX_PAYLOAD_LEN
    };

/// Reason a frame in progress was discarded.
///
/// By the time the caller sees one of these the framer is already back to
/// scanning; no recovery action is needed or possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FramingError {
    /// A byte outside the character set its position allows.
    InvalidCharacter,
    /// A received checksum that does not match the accumulated one.
    ChecksumMismatch,
    /// A declared UBX payload length above [`ubx::MAX_PAYLOAD_LEN`].
    LengthOverflow,
    /// A sentence terminator byte other than CR then LF.
    TerminatorMismatch,
    /// A sentence body longer than the buffer allows.
    BufferOverflow,
}

/// A validated frame, borrowed from the framer's internal buffer.
///
/// The payload is only valid until the next call to [`Framer::feed`];
/// consumers that keep it must copy it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValidFrame<'a> {
    /// Sentence body between `$` and `*`, checksum verified.
    Nmea(&'a [u8]),
    /// Packet payload with sync, length field and checksum stripped.
    Ubx(&'a [u8]),
}

impl<'a> ValidFrame<'a> {
    /// The frame's raw payload bytes.
    pub fn payload(&self) -> &'a [u8] {
        match *self {
            ValidFrame::Nmea(p) | ValidFrame::Ubx(p) => p,
        }
    }
}

/// Observable outcome of feeding one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event<'a> {
    /// The byte was accepted into a frame in progress. The surrounding
    /// runtime should (re)arm its stall timer for this many milliseconds;
    /// on expiry it calls [`Framer::reset`].
    ArmTimeout(u32),
    /// The byte completed a frame that passed validation.
    Frame(ValidFrame<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NmeaState {
    /// Body bytes, or the `*` that ends them.
    Body,
    ChecksumHi,
    ChecksumLo,
    End1,
    End2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UbxState {
    Sync2,
    Length,
    Payload,
    CheckA,
    CheckB,
}

/// Parsing state, tagged per protocol track so text parsing can never
/// observe binary bookkeeping and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Idle,
    Nmea { st: NmeaState, csum: u8 },
    Ubx { st: UbxState, csum: ubx::RunningSum, len: u16 },
}

/// What a single byte did to the frame in progress. Internal shape;
/// [`Framer::feed`] turns it into an [`Event`] borrowing the buffer.
enum Step {
    Noise,
    Accepted,
    NmeaDone,
    UbxDone,
}

/// State machine that deframes one interleaved NMEA/UBX byte stream.
#[derive(Debug, Clone)]
pub struct Framer {
    state: FrameState,
    buf: Vec<u8, BUF_CAPACITY>,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    /// Create a framer scanning for start tokens.
    pub fn new() -> Self {
        Self {
            state: FrameState::Idle,
            buf: Vec::new(),
        }
    }

    /// Discard any frame in progress and return to start-token scanning.
    ///
    /// This is also the frame-completion timeout hook: the runtime that
    /// armed a timer in response to [`Event::ArmTimeout`] calls it when
    /// the deadline passes. Resetting while idle is a no-op, so a timer
    /// that fires late does no harm.
    pub fn reset(&mut self) {
        self.state = FrameState::Idle;
        self.buf.clear();
    }

    /// True while a frame is being accumulated.
    pub fn in_frame(&self) -> bool {
        !matches!(self.state, FrameState::Idle)
    }

    /// Feed a single received byte.
    ///
    /// Returns `Ok(Some(event))` when the byte had an observable effect,
    /// `Ok(None)` for noise between frames, or `Err` when it caused the
    /// frame in progress to be discarded. After an error the framer has
    /// already resynchronized; the very next byte is scanned for start
    /// tokens as usual.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Event<'_>>, FramingError> {
        match self.step(byte)? {
            Step::Noise => Ok(None),
            Step::Accepted => Ok(Some(Event::ArmTimeout(FRAME_TIMEOUT_MS))),
            Step::NmeaDone => Ok(Some(Event::Frame(ValidFrame::Nmea(&self.buf)))),
            Step::UbxDone => Ok(Some(Event::Frame(ValidFrame::Ubx(
                &self.buf[ubx::LEN_FIELD_LEN..],
            )))),
        }
    }

    fn step(&mut self, byte: u8) -> Result<Step, FramingError> {
        // Start tokens outrank everything while scanning, and anywhere
        // inside a text frame: a `$` mid-sentence abandons the sentence
        // and begins a new one, and a first sync byte switches tracks.
        if matches!(self.state, FrameState::Idle | FrameState::Nmea { .. }) {
            if byte == nmea::START_TOK {
                self.buf.clear();
                self.state = FrameState::Nmea {
                    st: NmeaState::Body,
                    csum: 0,
                };
                return Ok(Step::Accepted);
            }
            if byte == ubx::SYNC1 {
                self.buf.clear();
                self.state = FrameState::Ubx {
                    st: UbxState::Sync2,
                    csum: ubx::RunningSum::new(),
                    len: 0,
                };
                return Ok(Step::Accepted);
            }
        }

        match self.state {
            FrameState::Idle => Ok(Step::Noise),
            FrameState::Nmea { st, csum } => self.step_nmea(st, csum, byte),
            FrameState::Ubx { st, csum, len } => self.step_ubx(st, csum, len, byte),
        }
    }

    fn abort(&mut self, err: FramingError) -> Result<Step, FramingError> {
        self.state = FrameState::Idle;
        Err(err)
    }

    fn step_nmea(
        &mut self,
        st: NmeaState,
        mut csum: u8,
        byte: u8,
    ) -> Result<Step, FramingError> {
        match st {
            NmeaState::Body => {
                if byte > nmea::MAX_CHAR {
                    return self.abort(FramingError::InvalidCharacter);
                }
                if byte == nmea::CHECKSUM_TOK {
                    self.state = FrameState::Nmea {
                        st: NmeaState::ChecksumHi,
                        csum,
                    };
                    return Ok(Step::Accepted);
                }
                if self.buf.len() >= nmea::MAX_BODY_LEN || self.buf.push(byte).is_err() {
                    return self.abort(FramingError::BufferOverflow);
                }
                csum ^= byte;
                self.state = FrameState::Nmea {
                    st: NmeaState::Body,
                    csum,
                };
                Ok(Step::Accepted)
            }
            NmeaState::ChecksumHi => match nmea::hex_val(byte) {
                Some(hi) => {
                    csum ^= hi << 4;
                    self.state = FrameState::Nmea {
                        st: NmeaState::ChecksumLo,
                        csum,
                    };
                    Ok(Step::Accepted)
                }
                None => self.abort(FramingError::InvalidCharacter),
            },
            NmeaState::ChecksumLo => match nmea::hex_val(byte) {
                Some(lo) => {
                    csum ^= lo;
                    self.state = FrameState::Nmea {
                        st: NmeaState::End1,
                        csum,
                    };
                    Ok(Step::Accepted)
                }
                None => self.abort(FramingError::InvalidCharacter),
            },
            NmeaState::End1 => {
                if byte != nmea::END_TOK1 {
                    return self.abort(FramingError::TerminatorMismatch);
                }
                self.state = FrameState::Nmea {
                    st: NmeaState::End2,
                    csum,
                };
                Ok(Step::Accepted)
            }
            NmeaState::End2 => {
                // Terminal either way; the buffer is kept so a completed
                // frame can be borrowed until the next feed.
                self.state = FrameState::Idle;
                if byte != nmea::END_TOK2 {
                    return Err(FramingError::TerminatorMismatch);
                }
                // A matching transmitted checksum XORs the accumulator
                // back to zero.
                if csum != 0 {
                    return Err(FramingError::ChecksumMismatch);
                }
                Ok(Step::NmeaDone)
            }
        }
    }

    fn step_ubx(
        &mut self,
        st: UbxState,
        mut csum: ubx::RunningSum,
        len: u16,
        byte: u8,
    ) -> Result<Step, FramingError> {
        match st {
            UbxState::Sync2 => {
                if byte != ubx::SYNC2 {
                    // The byte is discarded outright, not reconsidered as
                    // a possible new start token.
                    return self.abort(FramingError::InvalidCharacter);
                }
                self.state = FrameState::Ubx {
                    st: UbxState::Length,
                    csum,
                    len,
                };
                Ok(Step::Accepted)
            }
            UbxState::Length => {
                if self.buf.push(byte).is_err() {
                    return self.abort(FramingError::BufferOverflow);
                }
                csum.push(byte);
                if self.buf.len() == ubx::LEN_FIELD_LEN {
                    let declared = u16::from_le_bytes([self.buf[0], self.buf[1]]);
                    if declared as usize > ubx::MAX_PAYLOAD_LEN {
                        return self.abort(FramingError::LengthOverflow);
                    }
                    let st = if declared == 0 {
                        UbxState::CheckA
                    } else {
                        UbxState::Payload
                    };
                    self.state = FrameState::Ubx {
                        st,
                        csum,
                        len: declared,
                    };
                } else {
                    self.state = FrameState::Ubx {
                        st: UbxState::Length,
                        csum,
                        len,
                    };
                }
                Ok(Step::Accepted)
            }
            UbxState::Payload => {
                if self.buf.push(byte).is_err() {
                    return self.abort(FramingError::BufferOverflow);
                }
                csum.push(byte);
                let st = if self.buf.len() == ubx::LEN_FIELD_LEN + len as usize {
                    UbxState::CheckA
                } else {
                    UbxState::Payload
                };
                self.state = FrameState::Ubx { st, csum, len };
                Ok(Step::Accepted)
            }
            UbxState::CheckA => {
                if byte != csum.a() {
                    return self.abort(FramingError::ChecksumMismatch);
                }
                self.state = FrameState::Ubx {
                    st: UbxState::CheckB,
                    csum,
                    len,
                };
                Ok(Step::Accepted)
            }
            UbxState::CheckB => {
                self.state = FrameState::Idle;
                if byte != csum.b() {
                    return Err(FramingError::ChecksumMismatch);
                }
                Ok(Step::UbxDone)
            }
        }
    }
}
