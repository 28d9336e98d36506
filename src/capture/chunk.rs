use std::time::Duration;

/// One fragment of encoder output, in capture order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedChunk {
    /// Position in the run's chunk sequence, starting at 0 with no gaps.
    pub seq: u64,
    /// Presentation time of the first frame covered by this chunk, relative to the first
    /// captured frame.
    pub timestamp: Duration,
    /// Encoded bytes.
    pub data: Vec<u8>,
}

impl EncodedChunk {
    /// Byte length of the payload.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// What the encoder saw once the frame stream closed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Frames in the encoded stream, including repeats that filled skipped slots.
    pub frames: u64,
    /// Playback duration of the encoded stream.
    pub duration: Duration,
}
