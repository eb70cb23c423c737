//! RF remote decoding
//!
//! The radio hardware hands over a numeric code plus a timestamp for every
//! frame it decodes. Holding a button repeats the same reading, so a code is
//! only reported once per distinct timestamp.

use std::collections::HashMap;
use tracing::{debug, trace};

use lh_protocol::{RemoteButton, RemoteSymbol};

/// One decoded RF frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfReading {
    pub code: u32,
    /// Monotonic stamp assigned by the receiver; changes with every new frame
    pub timestamp: u64,
}

/// Source of raw RF readings. `poll` must never block.
pub trait RfSource: Send {
    /// Most recent reading, or `None` if nothing has been received yet
    fn poll(&mut self) -> Option<RfReading>;
}

pub struct RemoteDecoder {
    source: Box<dyn RfSource>,
    last_timestamp: Option<u64>,
    passthrough: HashMap<u32, String>,
}

impl RemoteDecoder {
    pub fn new(source: Box<dyn RfSource>, passthrough: HashMap<u32, String>) -> Self {
        Self {
            source,
            last_timestamp: None,
            passthrough,
        }
    }

    /// New symbol since the last poll, if any
    pub fn poll(&mut self) -> Option<RemoteSymbol> {
        let reading = self.source.poll()?;
        if self.last_timestamp == Some(reading.timestamp) {
            return None;
        }
        self.last_timestamp = Some(reading.timestamp);
        trace!(code = reading.code, timestamp = reading.timestamp, "RF reading");

        let symbol = self.decode(reading.code);
        match &symbol {
            Some(symbol) => debug!(code = reading.code, %symbol, "Remote code decoded"),
            None => debug!(code = reading.code, "Unknown remote code"),
        }
        symbol
    }

    pub fn decode(&self, code: u32) -> Option<RemoteSymbol> {
        if let Some(button) = RemoteButton::from_code(code) {
            return Some(RemoteSymbol::Button(button));
        }
        self.passthrough
            .get(&code)
            .map(|s| RemoteSymbol::Passthrough(s.clone()))
    }
}
