//! Calibration profile persistence and CSV export.
//!
//! # Storage Format
//!
//! The durable snapshot is a fixed 24584-byte blob in the target's native
//! byte order: the code-density histogram the table was fitted from,
//! followed by the correction record.
//!
//! ```text
//! histogram[]  : 4096 x 4 bytes unsigned, index = raw code
//! magic        : 4 bytes, 0xCA11B8ED marks valid
//! correction[] : 4096 x 2 bytes signed, index = raw code
//! adc_min      : 2 bytes unsigned
//! adc_max      : 2 bytes unsigned
//! ```
//!
//! The magic is the sole integrity check; there is no checksum over the
//! data. A load is valid iff the file holds exactly [`PROFILE_SIZE`] bytes
//! and the magic matches — anything else is reported as "no valid
//! calibration" and never partially applied.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::device::NUM_CODES;
use crate::histogram::Histogram;
use crate::lut::CorrectionTable;

/// Sentinel marking a valid record.
pub const MAGIC: u32 = 0xCA11_B8ED;

/// Exact size of the record portion in bytes.
pub const RECORD_SIZE: usize = 4 + 2 * NUM_CODES + 2 + 2;

/// Exact size of the histogram portion in bytes.
pub const HISTOGRAM_SIZE: usize = 4 * NUM_CODES;

/// Exact on-disk size of a full profile in bytes.
pub const PROFILE_SIZE: usize = HISTOGRAM_SIZE + RECORD_SIZE;

/// Correction-table half of the durable snapshot.
#[derive(Debug, Clone)]
pub struct CalibrationRecord {
    /// [`MAGIC`] when the table is valid.
    pub magic: u32,
    /// Signed correction to add, index = raw code.
    pub correction: Box<[i16; NUM_CODES]>,
    /// Lowest raw code observed during collection.
    pub adc_min: u16,
    /// Highest raw code observed during collection.
    pub adc_max: u16,
}

impl CalibrationRecord {
    /// Snapshot a finished correction table, magic set valid.
    pub fn from_table(table: &CorrectionTable) -> Self {
        let mut correction = Box::new([0i16; NUM_CODES]);
        correction.copy_from_slice(table.offsets());
        Self {
            magic: MAGIC,
            correction,
            adc_min: table.code_min(),
            adc_max: table.code_max(),
        }
    }

    /// Whether the magic marks this record valid.
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    /// Rehydrate a correction table from this record.
    pub fn to_table(&self) -> CorrectionTable {
        CorrectionTable::from_parts(self.correction.clone(), self.adc_min, self.adc_max)
    }

    /// Serialize to the fixed native-byte-order layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(RECORD_SIZE);
        bytes.extend_from_slice(&self.magic.to_ne_bytes());
        for &offset in self.correction.iter() {
            bytes.extend_from_slice(&offset.to_ne_bytes());
        }
        bytes.extend_from_slice(&self.adc_min.to_ne_bytes());
        bytes.extend_from_slice(&self.adc_max.to_ne_bytes());
        bytes
    }

    /// Deserialize, validating size and magic. Any mismatch is `None` —
    /// the record is all-or-nothing, never partially trusted.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != RECORD_SIZE {
            return None;
        }
        let magic = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != MAGIC {
            return None;
        }

        let mut correction = Box::new([0i16; NUM_CODES]);
        let mut at = 4;
        for slot in correction.iter_mut() {
            *slot = i16::from_ne_bytes([bytes[at], bytes[at + 1]]);
            at += 2;
        }
        let adc_min = u16::from_ne_bytes([bytes[at], bytes[at + 1]]);
        let adc_max = u16::from_ne_bytes([bytes[at + 2], bytes[at + 3]]);

        Some(Self {
            magic,
            correction,
            adc_min,
            adc_max,
        })
    }

}

/// Durable snapshot of one completed calibration: the histogram the table
/// was fitted from, followed by the record.
///
/// Persisting the histogram alongside the table lets offline tooling
/// regenerate the full `code,count,correction` profile from the binary
/// snapshot alone, without re-running a sweep.
#[derive(Debug, Clone)]
pub struct CalibrationProfile {
    pub histogram: Histogram,
    pub record: CalibrationRecord,
}

impl CalibrationProfile {
    pub fn new(histogram: Histogram, record: CalibrationRecord) -> Self {
        Self { histogram, record }
    }

    /// Serialize to the fixed native-byte-order layout, histogram first.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PROFILE_SIZE);
        for &count in self.histogram.counts() {
            bytes.extend_from_slice(&count.to_ne_bytes());
        }
        bytes.extend_from_slice(&self.record.to_bytes());
        bytes
    }

    /// Deserialize, validating the total size and the record magic. Any
    /// mismatch is `None` — neither half is ever applied without the other.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != PROFILE_SIZE {
            return None;
        }
        let record = CalibrationRecord::from_bytes(&bytes[HISTOGRAM_SIZE..])?;

        let mut counts = Box::new([0u32; NUM_CODES]);
        let mut at = 0;
        for slot in counts.iter_mut() {
            *slot = u32::from_ne_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
            at += 4;
        }

        Some(Self {
            histogram: Histogram::from_counts(counts),
            record,
        })
    }

    /// Write the profile to a file.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(&self.to_bytes())?;
        file.flush()
    }

    /// Load a profile from a file.
    ///
    /// `None` covers every failure mode the same way: missing file, short
    /// or long read, wrong magic. Callers treat all of them as "no
    /// calibration present" and proceed with whatever state they had.
    pub fn load(path: &Path) -> Option<Self> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                log::info!("no calibration profile at {}: {err}", path.display());
                return None;
            }
        };
        // Read one byte past the expected size so an oversized file fails
        // the exact-length check instead of silently truncating.
        let mut bytes = Vec::with_capacity(PROFILE_SIZE + 1);
        if let Err(err) = file.take(PROFILE_SIZE as u64 + 1).read_to_end(&mut bytes) {
            log::warn!("failed reading {}: {err}", path.display());
            return None;
        }
        let profile = Self::from_bytes(&bytes);
        if profile.is_none() {
            log::warn!(
                "{}: {} bytes, not a valid calibration profile",
                path.display(),
                bytes.len()
            );
        }
        profile
    }
}

/// Human-readable export: one row per code.
///
/// Header row is `code,count,correction`, matching the analysis tooling.
pub fn export_csv<W: Write>(
    out: &mut W,
    histogram: &Histogram,
    table: &CorrectionTable,
) -> io::Result<()> {
    writeln!(out, "code,count,correction")?;
    for code in 0..NUM_CODES as u16 {
        writeln!(
            out,
            "{},{},{}",
            code,
            histogram.count(code),
            table.offset(code)
        )?;
    }
    Ok(())
}
