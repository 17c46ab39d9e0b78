//! Push-style session: a [`Framer`] wired to its collaborators.
//!
//! The framer itself reports outcomes as return values. Receive loops that
//! want the classic callback shape, one `feed(byte)` per interrupt with no
//! result to route, wrap it in a [`Session`] together with a [`FrameSink`]
//! for validated frames and a [`TimeoutSignal`] for stall-timer commands.

use crate::framer::{Event, Framer, FramingError, ValidFrame};

/// Consumer of validated frames, one method per protocol.
///
/// The payload slice borrows the framer's buffer and is only valid for the
/// duration of the call; implementations that keep it must copy.
pub trait FrameSink {
    /// A verified NMEA sentence body, tokens and checksum stripped.
    fn on_nmea(&mut self, payload: &[u8]);

    /// A verified UBX packet payload, framing stripped.
    fn on_ubx(&mut self, payload: &[u8]);
}

/// Receiver of stall-timer commands.
///
/// The session only requests (re)arming; realizing the timer and calling
/// [`Session::on_timeout`] at the deadline is the runtime's business.
pub trait TimeoutSignal {
    /// (Re)arm the frame-completion timer for `deadline_ms` milliseconds.
    fn arm(&mut self, deadline_ms: u32);
}

/// Accept and drop counters for one stream.
///
/// The framing layer never logs; an outer diagnostic layer reads these to
/// see what a noisy link is dropping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FramingStats {
    /// Validated NMEA sentences delivered.
    pub nmea_frames: u32,
    /// Validated UBX packets delivered.
    pub ubx_frames: u32,
    pub invalid_character: u32,
    pub checksum_mismatch: u32,
    pub length_overflow: u32,
    pub terminator_mismatch: u32,
    pub buffer_overflow: u32,
}

impl FramingStats {
    /// Total frames discarded, over all reasons.
    pub fn dropped(&self) -> u32 {
        self.invalid_character
            + self.checksum_mismatch
            + self.length_overflow
            + self.terminator_mismatch
            + self.buffer_overflow
    }

    fn record(&mut self, err: FramingError) {
        match err {
            FramingError::InvalidCharacter => self.invalid_character += 1,
            FramingError::ChecksumMismatch => self.checksum_mismatch += 1,
            FramingError::LengthOverflow => self.length_overflow += 1,
            FramingError::TerminatorMismatch => self.terminator_mismatch += 1,
            FramingError::BufferOverflow => self.buffer_overflow += 1,
        }
    }
}

/// A [`Framer`] coupled to its sink and timer collaborators.
///
/// `feed` returns nothing: validated frames go to the sink, timer commands
/// to the timeout signal, and malformed input resynchronizes silently with
/// only a [`FramingStats`] counter to show for it.
#[derive(Debug)]
pub struct Session<S, T> {
    framer: Framer,
    sink: S,
    timeout: T,
    stats: FramingStats,
}

impl<S: FrameSink, T: TimeoutSignal> Session<S, T> {
    /// Create a session around fresh framer state.
    pub fn new(sink: S, timeout: T) -> Self {
        Self {
            framer: Framer::new(),
            sink,
            timeout,
            stats: FramingStats::default(),
        }
    }

    /// Feed one received byte, dispatching whatever it produces.
    pub fn feed(&mut self, byte: u8) {
        match self.framer.feed(byte) {
            Ok(Some(Event::ArmTimeout(ms))) => self.timeout.arm(ms),
            Ok(Some(Event::Frame(ValidFrame::Nmea(body)))) => {
                self.stats.nmea_frames += 1;
                self.sink.on_nmea(body);
            }
            Ok(Some(Event::Frame(ValidFrame::Ubx(payload)))) => {
                self.stats.ubx_frames += 1;
                self.sink.on_ubx(payload);
            }
            Ok(None) => {}
            Err(e) => self.stats.record(e),
        }
    }

    /// Feed a run of received bytes in order.
    pub fn feed_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.feed(b);
        }
    }

    /// The frame-completion deadline expired: discard the frame in
    /// progress and go back to scanning.
    pub fn on_timeout(&mut self) {
        self.framer.reset();
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &FramingStats {
        &self.stats
    }

    /// The wrapped sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The wrapped sink, mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ubx;

    type Payload = std::vec::Vec<u8>;

    #[derive(Default)]
    struct RecordingSink {
        nmea: std::vec::Vec<Payload>,
        ubx: std::vec::Vec<Payload>,
    }

    impl FrameSink for RecordingSink {
        fn on_nmea(&mut self, payload: &[u8]) {
            self.nmea.push(payload.to_vec());
        }
        fn on_ubx(&mut self, payload: &[u8]) {
            self.ubx.push(payload.to_vec());
        }
    }

    #[derive(Default)]
    struct RecordingTimer {
        armed: u32,
        last_deadline: u32,
    }

    impl TimeoutSignal for RecordingTimer {
        fn arm(&mut self, deadline_ms: u32) {
            self.armed += 1;
            self.last_deadline = deadline_ms;
        }
    }

    fn session() -> Session<RecordingSink, RecordingTimer> {
        Session::new(RecordingSink::default(), RecordingTimer::default())
    }

    /// Bench capture from a u-blox M8: 15 valid sentences interleaved
    /// with malformed runs of several flavors.
    const CAPTURE: &[u8] = b"$GPGGA,213638.949,,,,,0,00,,,M,0.0,M,,0000*5F\r\n\
$GPGSA,A,1,,,,,,,,,,,,,,,*1E\r\n\
$GPRMC,213638.949,V,,,,,,,010207,,,N*40\r\n\
$#####################################################*AB\r\n\
$GPGGA,213639.897,,,,,0,00,,,M,0.0,M,,0000*5C\r\n\
$GPGSA,A,1,,,,,,,,,,,,,,,*1E\r\n\
$GPRMC,213639.897,V,,,,,,,010207,,,N*43\r\n\
$$$$$$****$$$$$####*****\
$GPGGA,213640.886,,,,,0,00,,,M,0.0,M,,0000*52\r\n\
$\r\n\
$GPGSA,A,1,,,,,,,,,,,,,,,*1E\r\n\
$GPRMC,213640.886,V,,,,,,,010207,,,N*4D\r\n\
$GPGGA,213641.886,,,,,0,00,,,M,0.0,M,,0000*53\r\n\
************************************************\
$GPGSA,A,1,,,,,,,,,,,,,,,*1E\r\n\
$GPRMC,213641.886,V,,,,,,,010207,,,N*4C\r\n\
$GPGGA,213642.897,,,,,0,00,,,M,0.0,M,,0000*50\r\n\
$#####################################################*\r\n\
$GPGSA,A,1,,,,,,,,,,,,,,,*1E\r\n\
$GPGSV,3,1,12,20,00,000,,10,00,000,,25,00,000,,27,00,000,*79\r\n";

    #[test]
    fn test_session_dispatches_per_protocol() {
        let mut session = session();
        session.feed_bytes(b"$GPGSA,A,1,,,,,,,,,,,,,,,*1E\r\n");
        session.feed_bytes(&ubx::encode_to_vec(&[0x01, 0x02]).unwrap());

        let sink = session.sink();
        assert_eq!(sink.nmea, [b"GPGSA,A,1,,,,,,,,,,,,,,,".to_vec()]);
        assert_eq!(sink.ubx, [[0x01, 0x02].to_vec()]);
        assert_eq!(session.stats().nmea_frames, 1);
        assert_eq!(session.stats().ubx_frames, 1);
        assert_eq!(session.stats().dropped(), 0);
    }

    #[test]
    fn test_session_arms_timer_per_accepted_byte() {
        let mut session = session();
        // "$*00\r" are all accepted; the final LF completes the frame
        // without re-arming.
        session.feed_bytes(b"$*00\r\n");
        assert_eq!(session.timeout.armed, 5);
        assert_eq!(session.timeout.last_deadline, crate::FRAME_TIMEOUT_MS);
        assert_eq!(session.stats().nmea_frames, 1);
    }

    #[test]
    fn test_session_counts_drop_reasons() {
        let mut session = session();
        session.feed_bytes(b"$GPGSA,A,1,,,,,,,,,,,,,,,*1F\r\n"); // bad checksum
        session.feed_bytes(&[0xB5, 0x62, 0x01, 0x01]); // huge length
        session.feed_bytes(b"$X*58\n"); // LF where CR belongs

        let stats = session.stats();
        assert_eq!(stats.checksum_mismatch, 1);
        assert_eq!(stats.length_overflow, 1);
        assert_eq!(stats.terminator_mismatch, 1);
        assert_eq!(stats.dropped(), 3);
        assert!(session.sink().nmea.is_empty());
        assert!(session.sink().ubx.is_empty());
    }

    #[test]
    fn test_session_timeout_discards_stalled_frame() {
        let mut session = session();
        session.feed_bytes(b"$GPGGA,213638");
        session.on_timeout();
        session.feed_bytes(b"$GPGSA,A,1,,,,,,,,,,,,,,,*1E\r\n");

        assert_eq!(session.sink().nmea, [b"GPGSA,A,1,,,,,,,,,,,,,,,".to_vec()]);
        assert_eq!(session.stats().nmea_frames, 1);
    }

    #[test]
    fn test_session_capture_soak() {
        let mut session = session();
        session.feed_bytes(CAPTURE);

        let stats = *session.stats();
        assert_eq!(stats.nmea_frames, 15);
        assert_eq!(stats.ubx_frames, 0);
        assert_eq!(stats.invalid_character, 3);
        assert_eq!(stats.checksum_mismatch, 1);
        assert_eq!(stats.dropped(), 4);

        let sink = session.sink();
        assert_eq!(sink.nmea.len(), 15);
        assert_eq!(sink.nmea[0], b"GPGGA,213638.949,,,,,0,00,,,M,0.0,M,,0000");
        assert_eq!(
            sink.nmea[14],
            b"GPGSV,3,1,12,20,00,000,,10,00,000,,25,00,000,,27,00,000,"
        );
    }
}
