//! Sample type representing one delivery from a capture device.

use std::time::Instant;

/// A single delivery of raw bytes from a capture device.
///
/// The device owns its buffer only for the duration of its callback, so a
/// `Sample` always holds its own copy of the bytes.
#[derive(Clone)]
pub struct Sample {
    /// Raw bytes copied out of the device buffer.
    bytes: Vec<u8>,
    /// Arrival timestamp.
    timestamp: Instant,
    /// Monotonic sequence number within one capture window, starting at 1.
    sequence: u64,
}

impl Sample {
    /// Creates a new sample, copying the borrowed device buffer.
    pub fn copy_from(bytes: &[u8], sequence: u64) -> Self {
        Self {
            bytes: bytes.to_vec(),
            timestamp: Instant::now(),
            sequence,
        }
    }

    /// Returns the raw bytes.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the byte length.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the delivery carried no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the arrival timestamp.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl std::fmt::Debug for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sample")
            .field("sequence", &self.sequence)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_owns_copy() {
        let mut buffer = vec![1u8, 2, 3];
        let sample = Sample::copy_from(&buffer, 7);
        buffer[0] = 9;

        assert_eq!(sample.bytes(), &[1, 2, 3]);
        assert_eq!(sample.sequence(), 7);
        assert_eq!(sample.len(), 3);
    }

    #[test]
    fn test_debug_hides_bytes() {
        let sample = Sample::copy_from(&[0u8; 4096], 1);
        let debug = format!("{:?}", sample);

        assert!(debug.contains("bytes: 4096"));
    }
}
