//! Delimiter-framed span extraction over a growing receive buffer.
//!
//! XMPP has no length prefixes: a stanza ends when its closing tag has been
//! seen, and the transport gives no guarantee that reads line up with
//! stanza boundaries. The receive buffer therefore accumulates reads, and
//! [`extract`] pulls out the first complete `start_tag ... end_tag` span once
//! both delimiters are present.
//!
//! # Buffer Discipline
//!
//! | Situation                         | Result   | Buffer afterwards            |
//! |-----------------------------------|----------|------------------------------|
//! | `start_tag` missing               | `None`   | unchanged                    |
//! | `end_tag` missing after start     | `None`   | unchanged                    |
//! | complete span                     | `Some`   | bytes after the span only    |
//!
//! Bytes in front of the start tag of a matched span are dropped: they are
//! framing the caller did not ask for (stream header, whitespace keep-alives).

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

/// Find the first occurrence of `needle` in `haystack` at or after `from`.
pub(crate) fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() || haystack.len() - from < needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// Extract the first complete `start_tag ... end_tag` span from `buffer`.
///
/// Returns `None` while either delimiter is still missing, leaving the buffer
/// untouched. On success the returned span includes both delimiters and the
/// buffer keeps only the bytes that followed the span.
pub fn extract(buffer: &mut BytesMut, start_tag: &[u8], end_tag: &[u8]) -> Option<Bytes> {
    debug_assert!(!start_tag.is_empty() && !end_tag.is_empty());

    let start = find(buffer, start_tag, 0)?;
    let end = find(buffer, end_tag, start + start_tag.len())?;
    let span_end = end + end_tag.len();

    if start > 0 {
        trace!(discarded = start, "dropping bytes ahead of span");
    }
    buffer.advance(start);
    Some(buffer.split_to(span_end - start).freeze())
}

/// Owned receive buffer for one session.
#[derive(Debug, Default, Clone)]
pub struct StreamBuffer {
    inner: BytesMut,
}

impl StreamBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with room for `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: BytesMut::with_capacity(capacity),
        }
    }

    /// Append bytes received from the transport
    pub fn extend(&mut self, bytes: &[u8]) {
        self.inner.extend_from_slice(bytes);
    }

    /// Extract the first complete span, see [`extract`]
    pub fn extract(&mut self, start_tag: &str, end_tag: &str) -> Option<Bytes> {
        extract(&mut self.inner, start_tag.as_bytes(), end_tag.as_bytes())
    }

    /// Offset of the span [`extract`] would return, without consuming it.
    ///
    /// Lets a caller waiting on several delimiter pairs handle whichever
    /// complete span comes first in the stream.
    pub fn span_start(&self, start_tag: &str, end_tag: &str) -> Option<usize> {
        let start = find(&self.inner, start_tag.as_bytes(), 0)?;
        find(&self.inner, end_tag.as_bytes(), start + start_tag.len()).map(|_| start)
    }

    /// Buffered bytes not yet consumed
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Discard everything
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FEATURES: &str = "<stream:features><mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
        <mechanism>PLAIN</mechanism><mechanism>SCRAM-SHA-1</mechanism></mechanisms></stream:features>";

    fn buffer(content: &str) -> BytesMut {
        BytesMut::from(content.as_bytes())
    }

    #[test]
    fn test_missing_start_tag_leaves_buffer() {
        let mut buf = buffer("<stream:stream id='abc'>");
        assert!(extract(&mut buf, b"<stream:features>", b"</stream:features>").is_none());
        assert_eq!(&buf[..], b"<stream:stream id='abc'>");
    }

    #[test]
    fn test_stalled_extraction_is_idempotent() {
        let mut buf = buffer("<stream:features><mechanisms>");
        for _ in 0..5 {
            assert!(extract(&mut buf, b"<stream:features>", b"</stream:features>").is_none());
            assert_eq!(&buf[..], b"<stream:features><mechanisms>");
        }
    }

    #[test]
    fn test_end_tag_before_start_is_ignored() {
        let mut buf = buffer("</challenge>junk<challenge>abc");
        assert!(extract(&mut buf, b"<challenge", b"</challenge>").is_none());
        assert_eq!(buf.len(), 30);
    }

    #[test]
    fn test_extracts_exact_span() {
        let mut buf = buffer(FEATURES);
        let span = extract(&mut buf, b"<stream:features>", b"</stream:features>").unwrap();
        assert_eq!(&span[..], FEATURES.as_bytes());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_adjacent_tags_give_minimal_span() {
        let mut buf = buffer("<a></a>rest");
        let span = extract(&mut buf, b"<a>", b"</a>").unwrap();
        assert_eq!(&span[..], b"<a></a>");
        assert_eq!(&buf[..], b"rest");
    }

    #[test]
    fn test_prefix_dropped_and_trailing_kept() {
        let header = "<?xml version='1.0'?><stream:stream from='example.com'>";
        let mut buf = buffer(&format!("{header}{FEATURES}<challenge>"));
        let span = extract(&mut buf, b"<stream:features>", b"</stream:features>").unwrap();
        assert_eq!(&span[..], FEATURES.as_bytes());
        assert_eq!(&buf[..], b"<challenge>");
    }

    #[test]
    fn test_one_span_per_call() {
        let mut buf = buffer("<c>one</c><c>two</c>");
        assert_eq!(&extract(&mut buf, b"<c>", b"</c>").unwrap()[..], b"<c>one</c>");
        assert_eq!(&buf[..], b"<c>two</c>");
        assert_eq!(&extract(&mut buf, b"<c>", b"</c>").unwrap()[..], b"<c>two</c>");
        assert!(extract(&mut buf, b"<c>", b"</c>").is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_stream_buffer_wrapper() {
        let mut buf = StreamBuffer::with_capacity(64);
        assert!(buf.is_empty());
        buf.extend(b"<challenge xmlns='x'>Zm9v");
        assert_eq!(buf.span_start("<challenge", "</challenge>"), None);
        assert!(buf.extract("<challenge", "</challenge>").is_none());
        buf.extend(b"</challenge> ");
        assert_eq!(buf.span_start("<challenge", "</challenge>"), Some(0));
        let span = buf.extract("<challenge", "</challenge>").unwrap();
        assert_eq!(&span[..], b"<challenge xmlns='x'>Zm9v</challenge>");
        assert_eq!(buf.as_bytes(), b" ");
        buf.clear();
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn test_span_start_reports_first_complete_span() {
        let mut buf = StreamBuffer::new();
        buf.extend(b" <challenge>a</challenge><failure><aborted/></failure>");
        assert_eq!(buf.span_start("<challenge", "</challenge>"), Some(1));
        assert_eq!(buf.span_start("<failure", "</failure>"), Some(25));
        assert_eq!(buf.span_start("<success", "/>"), None);
        assert_eq!(buf.len(), 54);
    }

    #[test]
    fn test_find_bounds() {
        assert_eq!(find(b"abcabc", b"abc", 1), Some(3));
        assert_eq!(find(b"abc", b"abcd", 0), None);
        assert_eq!(find(b"abc", b"c", 3), None);
        assert_eq!(find(b"abc", b"", 0), None);
    }

    proptest! {
        #[test]
        fn prop_split_point_does_not_matter(split in 0usize..=FEATURES.len() + 6) {
            let message = format!("{FEATURES}<tail>");
            let split = split.min(message.len());

            let mut whole = BytesMut::new();
            whole.extend_from_slice(message.as_bytes());
            let expected = extract(&mut whole, b"<stream:features>", b"</stream:features>");

            let mut chunked = BytesMut::new();
            chunked.extend_from_slice(&message.as_bytes()[..split]);
            let mut got = extract(&mut chunked, b"<stream:features>", b"</stream:features>");
            chunked.extend_from_slice(&message.as_bytes()[split..]);
            if got.is_none() {
                got = extract(&mut chunked, b"<stream:features>", b"</stream:features>");
            }

            prop_assert_eq!(got, expected);
            prop_assert_eq!(&chunked[..], &whole[..]);
        }
    }
}
