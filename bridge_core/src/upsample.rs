//! Streaming 2x linear upsampler (24 kHz -> 48 kHz).
//!
//! Each input sample is copied through and a midpoint is inserted between it
//! and its successor. The last sample of a chunk is carried into the next
//! call so the midpoint across the chunk boundary is produced exactly once:
//! the first chunk of a stream yields `2n - 1` samples, every later chunk
//! yields `2n`.

/// Upsample one chunk given the carry from the previous chunk.
///
/// Returns the 2x output and the new carry (the chunk's last sample). An
/// empty chunk yields no output and leaves the carry as it was.
pub fn upsample_2x_linear(pcm: &[i16], carry: Option<i16>) -> (Vec<i16>, Option<i16>) {
    let Some(&last) = pcm.last() else {
        return (Vec::new(), carry);
    };

    let mut out = Vec::with_capacity(2 * pcm.len());
    if let Some(prev) = carry {
        out.push(midpoint(prev, pcm[0]));
    }
    for pair in pcm.windows(2) {
        out.push(pair[0]);
        out.push(midpoint(pair[0], pair[1]));
    }
    out.push(last);

    (out, Some(last))
}

/// Floor of the mean; the sum of two i16 always fits in i32.
#[inline]
fn midpoint(a: i16, b: i16) -> i16 {
    ((i32::from(a) + i32::from(b)) >> 1) as i16
}

/// Stateful wrapper that owns the carry between chunks of one stream.
#[derive(Debug, Clone, Default)]
pub struct Upsampler {
    carry: Option<i16>,
}

impl Upsampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, pcm: &[i16]) -> Vec<i16> {
        let (out, carry) = upsample_2x_linear(pcm, self.carry);
        self.carry = carry;
        out
    }

    pub fn carry(&self) -> Option<i16> {
        self.carry
    }

    /// Forget the carry; the next chunk starts a new stream.
    pub fn reset(&mut self) {
        self.carry = None;
    }
}
