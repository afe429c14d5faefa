//! Detection sinks: where completed photons go. The history file is a
//! bincode stream with a small versioned header.

use crate::error::Result;
use crate::photon::{InteractionList, PhotonColor, Photon, Position};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Magic bytes opening a history file.
pub const HISTORY_MAGIC: [u8; 8] = *b"EMTRACEH";

/// Current history-file format version.
pub const HISTORY_VERSION: u32 = 1;

/// A completed, detected photon as the binner sees it.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DetectedPhoton {
    /// Decay this photon came from.
    pub decay_id: u64,
    /// Photon sequence number.
    pub photon_number: u64,
    /// Member of the annihilation pair.
    pub color: PhotonColor,
    /// Detected position in tomograph coordinates.
    pub location: Position,
    /// Detected crystal id; `-1` outside block detectors.
    pub detected_crystal: i64,
    /// Detected (possibly blurred) energy (keV).
    pub energy: f64,
    /// Travel distance (possibly blurred), the time-of-flight proxy (cm).
    pub travel_distance: f64,
    /// Current statistical weight.
    pub weight: f64,
    /// Weight of the originating decay.
    pub decay_weight: f64,
    /// The recorded interactions.
    pub interactions: InteractionList,
}

impl DetectedPhoton {
    /// Builds the record from a tracked photon.
    #[must_use]
    pub fn from_photon(decay_id: u64, photon: &Photon) -> Self {
        Self {
            decay_id,
            photon_number: photon.number,
            color: photon.color,
            location: photon.location,
            detected_crystal: photon.detected_crystal,
            energy: photon.energy,
            travel_distance: photon.travel_distance,
            weight: photon.weight,
            decay_weight: photon.decay_weight,
            interactions: photon.interactions.clone(),
        }
    }
}

/// Receives completed photons in emission order.
pub trait DetectionSink {
    /// Records one detection.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from file-backed sinks.
    fn record(&mut self, detection: &DetectedPhoton) -> Result<()>;
}

/// Discards everything.
pub struct NullSink;

impl DetectionSink for NullSink {
    fn record(&mut self, _detection: &DetectedPhoton) -> Result<()> {
        Ok(())
    }
}

/// Collects detections in memory, mostly for tests and small runs.
#[derive(Default)]
pub struct VecSink {
    /// The recorded detections, in emission order.
    pub detections: Vec<DetectedPhoton>,
}

impl VecSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DetectionSink for VecSink {
    fn record(&mut self, detection: &DetectedPhoton) -> Result<()> {
        self.detections.push(detection.clone());
        Ok(())
    }
}

/// Header opening a history stream.
#[derive(Debug, Deserialize, Serialize)]
struct HistoryHeader {
    magic: [u8; 8],
    version: u32,
}

/// Writes detections to a bincode history stream.
pub struct HistoryWriter<W: Write> {
    writer: W,
}

impl<W: Write> HistoryWriter<W> {
    /// Opens a history stream, writing the header.
    ///
    /// # Errors
    ///
    /// Propagates serialization and I/O errors.
    pub fn new(mut writer: W) -> Result<Self> {
        let header = HistoryHeader {
            magic: HISTORY_MAGIC,
            version: HISTORY_VERSION,
        };
        bincode::serialize_into(&mut writer, &header)
            .map_err(|err| anyhow::anyhow!("failed to write history header: {err}"))?;
        Ok(Self { writer })
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors.
    pub fn finish(mut self) -> Result<W> {
        self.writer
            .flush()
            .map_err(|err| anyhow::anyhow!("failed to flush history stream: {err}"))?;
        Ok(self.writer)
    }
}

impl<W: Write> DetectionSink for HistoryWriter<W> {
    fn record(&mut self, detection: &DetectedPhoton) -> Result<()> {
        bincode::serialize_into(&mut self.writer, detection)
            .map_err(|err| anyhow::anyhow!("failed to write history record: {err}"))?;
        Ok(())
    }
}

/// Reads every record of a history stream, mostly for analysis tools.
///
/// # Errors
///
/// Fails on a bad header or a corrupt record.
pub fn read_history<R: std::io::Read>(mut reader: R) -> Result<Vec<DetectedPhoton>> {
    let header: HistoryHeader = bincode::deserialize_from(&mut reader)
        .map_err(|err| anyhow::anyhow!("failed to read history header: {err}"))?;
    if header.magic != HISTORY_MAGIC {
        return Err(anyhow::anyhow!("not a history file").into());
    }
    if header.version != HISTORY_VERSION {
        return Err(anyhow::anyhow!(
            "unsupported history version {}",
            header.version
        )
        .into());
    }

    let mut detections = Vec::new();
    loop {
        match bincode::deserialize_from(&mut reader) {
            Ok(detection) => detections.push(detection),
            Err(err) => {
                if let bincode::ErrorKind::Io(io_err) = err.as_ref() {
                    if io_err.kind() == std::io::ErrorKind::UnexpectedEof {
                        break;
                    }
                }
                return Err(anyhow::anyhow!("corrupt history record: {err}").into());
            }
        }
    }
    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photon::{Direction, Photon};
    use float_cmp::assert_approx_eq;

    fn sample_photon() -> Photon {
        let mut photon = Photon::new(
            42,
            Position::new(1.0, 2.0, 3.0),
            Direction::new(1.0, 0.0, 0.0),
            321.5,
            0.75,
        );
        photon.travel_distance = 55.0;
        photon
    }

    #[test]
    fn round_trip_through_a_buffer() {
        let mut writer = HistoryWriter::new(Vec::new()).unwrap();
        let record = DetectedPhoton::from_photon(9, &sample_photon());
        writer.record(&record).unwrap();
        writer.record(&record).unwrap();
        let buffer = writer.finish().unwrap();

        let detections = read_history(buffer.as_slice()).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].decay_id, 9);
        assert_eq!(detections[0].photon_number, 42);
        assert_approx_eq!(f64, detections[0].energy, 321.5, ulps = 2);
        assert_approx_eq!(f64, detections[1].travel_distance, 55.0, ulps = 2);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let data = vec![0_u8; 64];
        assert!(read_history(data.as_slice()).is_err());
    }

    #[test]
    fn vec_sink_collects_in_order() {
        let mut sink = VecSink::new();
        let mut record = DetectedPhoton::from_photon(1, &sample_photon());
        sink.record(&record).unwrap();
        record.decay_id = 2;
        sink.record(&record).unwrap();
        assert_eq!(sink.detections[0].decay_id, 1);
        assert_eq!(sink.detections[1].decay_id, 2);
    }
}
