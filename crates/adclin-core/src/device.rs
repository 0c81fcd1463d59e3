//! Hardware seam: the two pins the calibration engine touches.
//!
//! The engine never talks to a concrete peripheral. It drives a
//! [`StimulusPin`] (the digital output carrying the sigma-delta bit stream,
//! low-pass filtered into the reference ramp) and reads an [`AdcChannel`]
//! (the converter under calibration). Firmware ports implement these two
//! traits over the real peripherals; tests and the CLI use
//! [`crate::SimulatedConverter`].

/// Number of distinct output codes of the 12-bit converter.
pub const NUM_CODES: usize = 4096;

/// Highest valid raw code (and highest target level).
pub const FULL_SCALE: u16 = (NUM_CODES - 1) as u16;

/// Metadata about a converter channel.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    /// Unique identifier (e.g. `"sim12"`).
    pub name: &'static str,
    /// One-line human-readable description.
    pub description: &'static str,
    /// Converter resolution in bits.
    pub resolution_bits: u8,
}

/// Digital output pin carrying the modulated bit stream.
///
/// The pin hardware shifts fed words out at a fixed bit rate. That rate must
/// exceed the analog reconstruction filter's cutoff by at least an order of
/// magnitude, or the ramp carries more than one code of ripple.
pub trait StimulusPin {
    /// Queue one 32-bit word of the bit stream, LSB shifted out first.
    ///
    /// Non-blocking. Returns `false` when the output queue is full, which is
    /// not an error: the caller stops feeding and retries later. The word is
    /// not consumed on `false`.
    fn try_feed(&mut self, word: u32) -> bool;
}

/// The converter under calibration.
pub trait AdcChannel {
    /// One raw conversion. 12-bit converters return codes in `0..=4095`;
    /// anything outside that range is discarded by the collector.
    fn read_raw(&mut self) -> u16;

    /// Channel metadata.
    fn info(&self) -> &ChannelInfo;
}
