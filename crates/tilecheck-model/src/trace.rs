//! Per-multiply trace sinks for the tiled engine
//!
//! Tracing is optional instrumentation: the sink is owned by the caller and
//! injected into [`crate::TiledEngine::convolve_traced`]. It observes every
//! multiply-accumulate but never influences the result.

use crate::error::Result;
use std::io::{BufWriter, Write};

/// One multiply-accumulate in the tiled loop nest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacEvent {
    /// Ofmap coordinate being accumulated
    pub index: [usize; 3],
    /// Input-channel lane within the tile
    pub ic0: usize,
    /// Output-channel lane within the tile
    pub oc0: usize,
    /// Activation operand
    pub ifmap: i16,
    /// Weight operand
    pub weight: i16,
    /// Partial sum before the accumulate
    pub ofmap_in: i32,
    /// Partial sum after the accumulate
    pub ofmap_out: i32,
}

/// Receiver of multiply-accumulate events
pub trait MacTrace {
    /// Record one event
    ///
    /// # Errors
    ///
    /// Returns error if the sink cannot accept the event.
    fn record(&mut self, event: &MacEvent) -> Result<()>;

    /// Flush buffered events after the last MAC
    ///
    /// # Errors
    ///
    /// Returns error if flushing fails.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sink that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrace;

impl MacTrace for NoTrace {
    #[inline(always)]
    fn record(&mut self, _event: &MacEvent) -> Result<()> {
        Ok(())
    }
}

impl MacTrace for Vec<MacEvent> {
    fn record(&mut self, event: &MacEvent) -> Result<()> {
        self.push(*event);
        Ok(())
    }
}

/// Text trace, one line per MAC:
///
/// ```text
/// ic0 = 0, oc0 = 1, ifmap = 0002, weight = 0006, ofmap_in = 00000004, ofmap_out = 00000010
/// ```
#[derive(Debug)]
pub struct TraceWriter<W: Write> {
    out: BufWriter<W>,
    events: u64,
}

impl<W: Write> TraceWriter<W> {
    /// Wrap a writer
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
            events: 0,
        }
    }

    /// Events written so far
    pub const fn events(&self) -> u64 {
        self.events
    }

    /// Flush and return the inner writer
    ///
    /// # Errors
    ///
    /// Returns error if the final flush fails.
    pub fn into_inner(self) -> Result<W> {
        self.out
            .into_inner()
            .map_err(|e| e.into_error().into())
    }
}

impl<W: Write> MacTrace for TraceWriter<W> {
    fn record(&mut self, e: &MacEvent) -> Result<()> {
        writeln!(
            self.out,
            "ic0 = {}, oc0 = {}, ifmap = {:04x}, weight = {:04x}, ofmap_in = {:08x}, ofmap_out = {:08x}",
            e.ic0, e.oc0, e.ifmap, e.weight, e.ofmap_in, e.ofmap_out
        )?;
        self.events += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        tracing::debug!("MAC trace: {} events", self.events);
        Ok(())
    }
}
