//! Audio ring buffer: fixed pre-allocated circular buffer for PCM samples.
//! Sits between the device callback (writer) and the frame reader.

/// Fixed-size ring buffer for PCM i16 samples. Pre-allocated, never grows.
pub struct RingBuffer {
    buffer: Box<[i16]>,
    write_pos: usize,
    read_pos: usize,
    len: usize,
    capacity: usize,
    /// Unread samples overwritten because the reader fell behind.
    overrun: u64,
}

impl RingBuffer {
    /// Create a ring buffer sized for `duration_secs` at `sample_rate` Hz, mono.
    pub fn new(sample_rate: u32, duration_secs: f32) -> Self {
        Self::with_capacity(Self::capacity_for(sample_rate, duration_secs))
    }

    /// Sample capacity `new` allocates for `duration_secs` at `sample_rate`.
    pub fn capacity_for(sample_rate: u32, duration_secs: f32) -> usize {
        ((sample_rate as f32 * duration_secs) as usize).max(1)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: vec![0i16; capacity].into_boxed_slice(),
            write_pos: 0,
            read_pos: 0,
            len: 0,
            capacity,
            overrun: 0,
        }
    }

    /// Write samples into the ring buffer. Overwrites oldest unread data if full.
    /// Called from the audio callback: non-allocating.
    #[inline]
    pub fn write(&mut self, samples: &[i16]) {
        for &s in samples {
            self.buffer[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % self.capacity;
            if self.len == self.capacity {
                self.read_pos = (self.read_pos + 1) % self.capacity;
                self.overrun += 1;
            } else {
                self.len += 1;
            }
        }
    }

    /// Read available samples into output buffer.
    /// Returns the number of samples actually read.
    #[inline]
    pub fn read(&mut self, output: &mut [i16]) -> usize {
        let to_read = output.len().min(self.len);
        for slot in output.iter_mut().take(to_read) {
            *slot = self.buffer[self.read_pos];
            self.read_pos = (self.read_pos + 1) % self.capacity;
        }
        self.len -= to_read;
        to_read
    }

    /// Fill `output` completely, or leave the buffer untouched and return false.
    #[inline]
    pub fn read_exact(&mut self, output: &mut [i16]) -> bool {
        if self.len < output.len() {
            return false;
        }
        self.read(output);
        true
    }

    /// Number of unread samples available.
    #[inline]
    pub fn available(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total samples lost to overwrites since creation.
    pub fn overrun(&self) -> u64 {
        self.overrun
    }

    /// Discard unread data.
    pub fn reset_read(&mut self) {
        self.read_pos = self.write_pos;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_in_order() {
        let mut rb = RingBuffer::with_capacity(8);
        rb.write(&[1, 2, 3]);
        let mut out = [0i16; 2];
        assert_eq!(rb.read(&mut out), 2);
        assert_eq!(out, [1, 2]);
        assert_eq!(rb.available(), 1);
    }

    #[test]
    fn overwrite_drops_oldest_and_counts_overrun() {
        let mut rb = RingBuffer::with_capacity(4);
        rb.write(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(rb.available(), 4);
        assert_eq!(rb.overrun(), 2);
        let mut out = [0i16; 4];
        assert!(rb.read_exact(&mut out));
        assert_eq!(out, [3, 4, 5, 6]);
    }

    #[test]
    fn read_exact_waits_for_full_frame() {
        let mut rb = RingBuffer::with_capacity(16);
        rb.write(&[7; 3]);
        let mut out = [0i16; 4];
        assert!(!rb.read_exact(&mut out));
        assert_eq!(rb.available(), 3);
        rb.write(&[8]);
        assert!(rb.read_exact(&mut out));
        assert_eq!(out, [7, 7, 7, 8]);
    }

    #[test]
    fn reset_discards_unread() {
        let mut rb = RingBuffer::new(16_000, 0.5);
        assert_eq!(rb.capacity(), 8000);
        rb.write(&[1; 50]);
        rb.reset_read();
        assert_eq!(rb.available(), 0);
    }
}
