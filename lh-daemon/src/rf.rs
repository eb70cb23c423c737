//! RF code sources
//!
//! The radio receiver is driven by a separate helper that decodes pulses and
//! writes one decimal code per line to a file or FIFO. A background thread
//! tails that stream and keeps the latest reading for the control loop.

use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use lh_core::{RfReading, RfSource};

/// Poll interval once the stream is drained or not yet available
const IDLE_DELAY: Duration = Duration::from_millis(20);

/// Reads codes line by line from a file or FIFO
pub struct LineRfSource {
    latest: Arc<Mutex<Option<RfReading>>>,
}

impl LineRfSource {
    pub fn spawn(path: PathBuf, shutdown: Arc<AtomicBool>) -> Self {
        let latest = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&latest);

        let spawned = thread::Builder::new()
            .name("rf-reader".into())
            .spawn(move || read_loop(&path, &slot, &shutdown));
        if let Err(e) = spawned {
            warn!("Failed to start RF reader thread: {}", e);
        }

        Self { latest }
    }
}

impl RfSource for LineRfSource {
    fn poll(&mut self) -> Option<RfReading> {
        *self.latest.lock()
    }
}

fn read_loop(path: &Path, latest: &Mutex<Option<RfReading>>, shutdown: &AtomicBool) {
    let file = loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        match File::open(path) {
            Ok(file) => break file,
            Err(e) => {
                debug!("Cannot open RF source {:?}: {}", path, e);
                thread::sleep(IDLE_DELAY * 25);
            }
        }
    };
    info!("Reading RF codes from {:?}", path);

    // Keep reading the same handle past EOF: a regular file is tailed and a
    // FIFO picks up the next writer without replaying old codes.
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut counter: u64 = 0;

    while !shutdown.load(Ordering::SeqCst) {
        match reader.read_line(&mut line) {
            Ok(0) => thread::sleep(IDLE_DELAY),
            Ok(_) if !line.ends_with('\n') => {}
            Ok(_) => {
                counter += 1;
                match parse_line(&line, counter) {
                    Some(reading) => *latest.lock() = Some(reading),
                    None if line.trim().is_empty() => {}
                    None => debug!("Ignoring malformed RF line {:?}", line.trim()),
                }
                line.clear();
            }
            Err(e) => {
                warn!("RF source read failed: {}", e);
                line.clear();
                thread::sleep(IDLE_DELAY);
            }
        }
    }
}

/// `<code>` or `<code> <timestamp>`. Without a timestamp, every line counts
/// as a new frame.
pub fn parse_line(line: &str, sequence: u64) -> Option<RfReading> {
    let mut fields = line.split_whitespace();
    let code = fields.next()?.parse().ok()?;
    let timestamp = match fields.next() {
        Some(ts) => ts.parse().ok()?,
        None => sequence,
    };
    Some(RfReading { code, timestamp })
}

/// Used when no RF receiver is configured
pub struct NullRfSource;

impl RfSource for NullRfSource {
    fn poll(&mut self) -> Option<RfReading> {
        None
    }
}
