//! Replay a captured receiver byte stream through the framer.
//!
//! Feeds the capture one byte at a time, exactly as a UART interrupt
//! would, prints every validated frame and reports drop statistics at the
//! end. With no argument it replays a built-in u-blox capture of fifteen
//! valid sentences interleaved with malformed runs.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use pharos_protocol::{FrameSink, Session, TimeoutSignal};

/// Capture from a u-blox M8 on a noisy bench link.
const BUILTIN_CAPTURE: &[u8] = b"$GPGGA,213638.949,,,,,0,00,,,M,0.0,M,,0000*5F\r\n\
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

#[derive(Parser)]
#[command(about = "Replay a receiver capture through the NMEA/UBX framer")]
struct Args {
    /// Capture file to replay; the built-in bench capture if omitted.
    capture: Option<PathBuf>,
}

/// Prints each validated frame with a running index.
struct PrintSink {
    count: usize,
}

impl FrameSink for PrintSink {
    fn on_nmea(&mut self, payload: &[u8]) {
        println!("#{} : {}", self.count, String::from_utf8_lossy(payload));
        self.count += 1;
    }

    fn on_ubx(&mut self, payload: &[u8]) {
        println!("#{} : UBX payload, {} bytes", self.count, payload.len());
        self.count += 1;
    }
}

/// A replayed capture has no real time base, so timer commands are
/// acknowledged and dropped.
struct NoTimer;

impl TimeoutSignal for NoTimer {
    fn arm(&mut self, _deadline_ms: u32) {}
}

fn main() -> Result<()> {
    let args = Args::parse();

    let data = match &args.capture {
        Some(path) => {
            fs::read(path).with_context(|| format!("reading capture {}", path.display()))?
        }
        None => BUILTIN_CAPTURE.to_vec(),
    };

    let mut session = Session::new(PrintSink { count: 0 }, NoTimer);
    session.feed_bytes(&data);

    let stats = session.stats();
    println!(
        "{} NMEA + {} UBX frames accepted, {} dropped \
         ({} bad char, {} bad checksum, {} bad length, {} bad terminator, {} overflow)",
        stats.nmea_frames,
        stats.ubx_frames,
        stats.dropped(),
        stats.invalid_character,
        stats.checksum_mismatch,
        stats.length_overflow,
        stats.terminator_mismatch,
        stats.buffer_overflow,
    );
    Ok(())
}
