use crate::protocol::find_boundary;

/// Per-connection byte accumulator.
///
/// A request is complete as soon as the header boundary appears; whatever
/// has arrived by then is the whole request, body included. A declared
/// `Content-Length` longer than what arrived is not waited for.
#[derive(Debug, Default)]
pub struct Framer {
    buf: Vec<u8>,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `data`; returns the complete request and clears the buffer
    /// once the boundary is present.
    pub fn push(&mut self, data: &[u8]) -> Option<Vec<u8>> {
        self.buf.extend_from_slice(data);
        find_boundary(&self.buf)?;
        Some(std::mem::take(&mut self.buf))
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_for_boundary_across_chunks() {
        let mut framer = Framer::new();
        assert!(framer.push(b"GET /status HTTP/1.1\r\nHost: x\r\n").is_none());
        assert!(framer.push(b"\r").is_none());
        let request = framer.push(b"\n").unwrap();
        assert_eq!(request, b"GET /status HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn boundary_split_between_chunks() {
        let mut framer = Framer::new();
        assert!(framer.push(b"GET / HTTP/1.1\r\n\r").is_none());
        assert!(framer.push(b"\n").is_some());
    }

    #[test]
    fn body_after_boundary_is_kept_even_if_truncated() {
        let mut framer = Framer::new();
        let request = framer
            .push(b"POST /api/status HTTP/1.1\r\nContent-Length: 100\r\n\r\n{\"a\"")
            .unwrap();
        assert!(request.ends_with(b"{\"a\""));
    }

    #[test]
    fn empty_push_keeps_buffer() {
        let mut framer = Framer::new();
        assert!(framer.push(b"GET").is_none());
        assert!(framer.push(b"").is_none());
        assert_eq!(framer.buffered(), 3);
    }
}
