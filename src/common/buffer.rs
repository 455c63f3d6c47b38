// src/common/buffer.rs

use arrayvec::ArrayVec;
use core::fmt;
use core::str;

/// Bounded accumulator for bytes streamed back by a module.
///
/// The buffer never grows past `C`. When an append would overflow it, the
/// oldest bytes are shifted out first, so it always holds the most recently
/// received `C` bytes in arrival order. Terminal tokens are short and sit at the
/// end of a reply, which is what makes dropping the head acceptable.
#[derive(Clone, Default)]
pub struct ResponseBuffer<const C: usize> {
    data: ArrayVec<u8, C>,
}

impl<const C: usize> ResponseBuffer<C> {
    pub const fn new() -> Self {
        ResponseBuffer {
            data: ArrayVec::new_const(),
        }
    }

    /// Appends `bytes`, evicting the oldest content as needed. Never fails.
    pub fn append(&mut self, bytes: &[u8]) {
        if C == 0 || bytes.is_empty() {
            return;
        }

        if bytes.len() >= C {
            self.data.clear();
            // Cannot fail: exactly C bytes into an empty buffer of capacity C.
            let _ = self.data.try_extend_from_slice(&bytes[bytes.len() - C..]);
            return;
        }

        let overflow = (self.data.len() + bytes.len()).saturating_sub(C);
        if overflow > 0 {
            self.data.drain(..overflow);
        }
        let _ = self.data.try_extend_from_slice(bytes);
    }

    /// Resets the length to zero, keeping the storage.
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Substring search over the live content. An empty token never matches.
    pub fn contains(&self, token: &[u8]) -> bool {
        self.contains_from(0, token)
    }

    /// Like [`contains`](Self::contains), restricted to the content from byte
    /// `start` on.
    pub fn contains_from(&self, start: usize, token: &[u8]) -> bool {
        let Some(haystack) = self.data.get(start..) else {
            return false;
        };
        if token.is_empty() || token.len() > haystack.len() {
            return false;
        }
        haystack.windows(token.len()).any(|window| window == token)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The content as text, if it is valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        str::from_utf8(&self.data).ok()
    }

    /// Non-empty lines of the content, split on CR/LF and trimmed.
    ///
    /// Lines that are not valid UTF-8 are skipped.
    pub fn lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.data
            .split(|b| *b == b'\r' || *b == b'\n')
            .filter_map(|line| str::from_utf8(line).ok())
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        C
    }
}

impl<const C: usize> fmt::Debug for ResponseBuffer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show control characters escaped, these buffers are mostly \r-separated text.
        write!(f, "ResponseBuffer<{}>(\"", C)?;
        for byte in self.data.iter() {
            write!(f, "{}", core::ascii::escape_default(*byte))?;
        }
        write!(f, "\")")
    }
}
