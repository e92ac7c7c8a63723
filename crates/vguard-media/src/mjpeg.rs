//! Splitting a concatenated MJPEG byte stream into JPEG frames.

/// Start-of-image marker.
const SOI: [u8; 2] = [0xFF, 0xD8];
/// End-of-image marker.
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Default cap on buffered bytes of an incomplete frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Incremental MJPEG splitter.
///
/// Bytes are pushed as they arrive from a pipe; complete `SOI..=EOI` spans
/// are returned in order. Garbage before an `SOI` is discarded.
#[derive(Debug)]
pub struct MjpegSplitter {
    buf: Vec<u8>,
    max_frame_bytes: usize,
}

impl Default for MjpegSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl MjpegSplitter {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame_bytes,
        }
    }

    /// Feed a chunk and collect every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            let Some(start) = find_marker(&self.buf, 0, SOI) else {
                // Keep a trailing 0xFF: it may be the first half of a marker
                let keep = usize::from(self.buf.last() == Some(&0xFF));
                let cut = self.buf.len() - keep;
                self.buf.drain(..cut);
                break;
            };

            let Some(end) = find_marker(&self.buf, start + 2, EOI) else {
                self.buf.drain(..start);
                break;
            };

            frames.push(self.buf[start..end + 2].to_vec());
            self.buf.drain(..end + 2);
        }

        if self.buf.len() > self.max_frame_bytes {
            tracing::warn!(
                buffered = self.buf.len(),
                "Discarding oversized incomplete MJPEG frame"
            );
            self.buf.clear();
        }

        frames
    }

    /// Bytes held for an incomplete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn find_marker(buf: &[u8], from: usize, marker: [u8; 2]) -> Option<usize> {
    buf.get(from..)?
        .windows(2)
        .position(|w| w == &marker[..])
        .map(|pos| pos + from)
}
