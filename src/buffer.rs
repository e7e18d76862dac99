//! Byte staging between the reader and the drivers.
//!
//! The buffer never grows on its own: `push` stores at most the free space
//! and readers compact before filling the tail. On a successful decode the
//! data is slid down once the read cursor passes the halfway mark, so `start`
//! can't run away.

pub(crate) const DEFAULT_SIZE: usize = 256;

pub(crate) struct InputBuf {
    buf: Vec<u8>,
    /// First valid offset.
    start: usize,
    /// Number of valid bytes after `start`.
    count: usize,
    /// Offset past `start` to skip on the next peek. Armed when an
    /// unrecognized CSI is reported so its bytes stay readable until the
    /// event is consumed.
    high_tide: usize,
}

impl InputBuf {
    pub(crate) fn new(size: usize) -> InputBuf {
        InputBuf {
            buf: vec![0; size],
            start: 0,
            count: 0,
            high_tide: 0,
        }
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.buf[self.start..self.start + self.count]
    }

    pub(crate) fn size(&self) -> usize {
        self.buf.len()
    }

    /// Free space, counting from the user's point of view: everything that is
    /// not currently occupied by valid bytes.
    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.count
    }

    /// Store as much of `bytes` as fits, compacting first. Returns the number
    /// of bytes actually stored.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> usize {
        self.compact();
        let n = bytes.len().min(self.buf.len() - self.count);
        self.buf[self.count..self.count + n].copy_from_slice(&bytes[..n]);
        self.count += n;
        n
    }

    /// Move the valid bytes down to offset 0.
    pub(crate) fn compact(&mut self) {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.start + self.count, 0);
            self.start = 0;
        }
    }

    /// The unfilled tail, for `read(2)` to fill. Only meaningful right after
    /// `compact`.
    pub(crate) fn tail(&mut self) -> &mut [u8] {
        &mut self.buf[self.count..]
    }

    pub(crate) fn grow_count(&mut self, n: usize) {
        self.count += n;
        debug_assert!(self.start + self.count <= self.buf.len());
    }

    pub(crate) fn eat(&mut self, n: usize) {
        if n >= self.count {
            self.start = 0;
            self.count = 0;
        } else {
            self.start += n;
            self.count -= n;
        }
    }

    /// Slide the data down by half the buffer once the cursor passes the
    /// midpoint, to stop it running away.
    pub(crate) fn slide_if_halfway(&mut self) {
        let half = self.buf.len() / 2;
        if self.start > half {
            self.buf.copy_within(half.., 0);
            self.start -= half;
        }
    }

    pub(crate) fn set_high_tide(&mut self, n: usize) {
        self.high_tide = n;
    }

    pub(crate) fn high_tide(&self) -> usize {
        self.high_tide
    }

    /// Consume the armed skip cursor, advancing past bytes that were kept in
    /// place for reparsing.
    pub(crate) fn apply_high_tide(&mut self) {
        if self.high_tide > 0 {
            let n = self.high_tide;
            self.high_tide = 0;
            self.eat(n);
        }
    }

    /// Reallocate to `size`, keeping as many buffered bytes as fit.
    pub(crate) fn resize(&mut self, size: usize) {
        self.compact();
        self.buf.resize(size, 0);
        self.count = self.count.min(size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_caps_at_free_space() {
        let mut buf = InputBuf::new(4);
        assert_eq!(buf.push(b"abc"), 3);
        assert_eq!(buf.push(b"defg"), 1);
        assert_eq!(buf.bytes(), b"abcd");
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn eat_past_count_resets() {
        let mut buf = InputBuf::new(8);
        buf.push(b"abc");
        buf.eat(2);
        assert_eq!(buf.bytes(), b"c");
        buf.eat(5);
        assert_eq!(buf.bytes(), b"");
        assert_eq!(buf.remaining(), 8);
    }

    #[test]
    fn push_compacts_before_storing() {
        let mut buf = InputBuf::new(4);
        buf.push(b"abcd");
        buf.eat(3);
        assert_eq!(buf.push(b"xyz"), 3);
        assert_eq!(buf.bytes(), b"dxyz");
    }

    #[test]
    fn slide_keeps_data_and_bounds_start() {
        let mut buf = InputBuf::new(8);
        buf.push(b"abcdefgh");
        buf.eat(5);
        buf.slide_if_halfway();
        assert_eq!(buf.bytes(), b"fgh");
        // start was 5, now 1: within the first half again
        buf.push(b"ij");
        assert_eq!(buf.bytes(), b"fghij");
    }

    #[test]
    fn high_tide_applies_once() {
        let mut buf = InputBuf::new(8);
        buf.push(b"12345");
        buf.set_high_tide(2);
        buf.apply_high_tide();
        assert_eq!(buf.bytes(), b"345");
        assert_eq!(buf.high_tide(), 0);
        buf.apply_high_tide();
        assert_eq!(buf.bytes(), b"345");
    }

    #[test]
    fn resize_preserves_content() {
        let mut buf = InputBuf::new(4);
        buf.push(b"abcd");
        buf.eat(1);
        buf.resize(8);
        assert_eq!(buf.bytes(), b"bcd");
        assert_eq!(buf.size(), 8);
        assert_eq!(buf.remaining(), 5);
    }
}
