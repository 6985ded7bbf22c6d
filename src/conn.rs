use std::collections::HashMap;
use std::net::SocketAddr;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::io::AsyncWrite;
use tokio::task::AbortHandle;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::controller::RecordingController;
use crate::framer::Framer;
use crate::response::{self, Response};
use crate::router::Router;

/// Never reused, so a late event cannot reach a newer connection.
pub type ConnectionId = u64;

/// What a socket reader reports back to the event loop.
#[derive(Debug)]
pub enum Event {
    Data { id: ConnectionId, bytes: Vec<u8> },
    Closed { id: ConnectionId },
}

struct Connection<W> {
    writer: W,
    framer: Framer,
    reader: Option<AbortHandle>,
    span: Span,
}

impl<W> Connection<W> {
    // Dropping the writer closes our half; aborting the reader drops the other.
    fn close(self) {
        if let Some(reader) = self.reader {
            reader.abort();
        }
    }
}

/// Owns every open connection and turns their bytes into responses.
///
/// Only ever driven from the single event loop task; nothing here is shared.
pub struct ConnectionManager<C, W> {
    router: Router<C>,
    table: HashMap<ConnectionId, Connection<W>>,
    next_id: ConnectionId,
    span: Span,
}

impl<C, W> ConnectionManager<C, W>
where
    C: RecordingController,
    W: AsyncWrite + Unpin,
{
    pub fn new(router: Router<C>, span: Span) -> Self {
        Self {
            router,
            table: HashMap::new(),
            next_id: 1,
            span,
        }
    }

    pub fn router(&self) -> &Router<C> {
        &self.router
    }

    pub fn open_connections(&self) -> usize {
        self.table.len()
    }

    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.table.contains_key(&id)
    }

    pub fn accept(&mut self, writer: W, peer: SocketAddr) -> ConnectionId {
        let id = self.next_id;
        self.next_id += 1;

        let span = info_span!(parent: &self.span, "conn", id, %peer);
        span.in_scope(|| info!("accepted"));

        self.table.insert(
            id,
            Connection {
                writer,
                framer: Framer::new(),
                reader: None,
                span,
            },
        );
        id
    }

    /// Ties the socket reader task to the connection so teardown stops it.
    pub fn attach_reader(&mut self, id: ConnectionId, reader: AbortHandle) {
        match self.table.get_mut(&id) {
            Some(conn) => conn.reader = Some(reader),
            None => reader.abort(),
        }
    }

    pub async fn handle(&mut self, event: Event) {
        match event {
            Event::Data { id, bytes } => self.on_data(id, &bytes).await,
            Event::Closed { id } => self.on_closed(id),
        }
    }

    pub async fn on_data(&mut self, id: ConnectionId, bytes: &[u8]) {
        let Some(conn) = self.table.get_mut(&id) else {
            warn!(parent: &self.span, id, "data for unknown connection ignored");
            return;
        };

        if bytes.is_empty() {
            debug!(parent: &conn.span, "empty data ignored");
            return;
        }

        let Some(raw) = conn.framer.push(bytes) else {
            debug!(parent: &conn.span, buffered = conn.framer.buffered(), "waiting for header boundary");
            return;
        };
        let span = conn.span.clone();

        let response = span.in_scope(|| self.respond(&raw));

        // One response per connection: it leaves the table before the write.
        let Some(mut conn) = self.table.remove(&id) else {
            return;
        };
        let status = response.status;
        async {
            match response::send(&mut conn.writer, &response).await {
                Ok(()) => debug!(status, "response sent"),
                Err(err) => warn!(status, "failed to write response: {err}"),
            }
        }
        .instrument(span)
        .await;
        conn.close();
    }

    pub fn on_closed(&mut self, id: ConnectionId) {
        match self.table.remove(&id) {
            Some(conn) => {
                conn.span.in_scope(|| info!("client disconnected, resources released"));
                conn.close();
            }
            // Normal after a response already closed it.
            None => debug!(parent: &self.span, id, "close for unknown connection ignored"),
        }
    }

    /// Releases every open connection, e.g. on shutdown.
    pub fn close_all(&mut self) {
        for (_, conn) in self.table.drain() {
            conn.span.in_scope(|| debug!("closed on shutdown"));
            conn.close();
        }
    }

    fn respond(&mut self, raw: &[u8]) -> Response {
        match catch_unwind(AssertUnwindSafe(|| self.router.handle(raw))) {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                let line = request_line(raw);
                error!(request = %line, "error handling request: {err:#}");
                Response::internal_error()
            }
            Err(_) => {
                let line = request_line(raw);
                error!(request = %line, "panic while handling request");
                Response::internal_error()
            }
        }
    }
}

fn request_line(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == b'\r').unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::HeadlessRecorder;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn manager() -> ConnectionManager<HeadlessRecorder, DuplexStream> {
        ConnectionManager::new(Router::new(HeadlessRecorder::new("capture.mkv")), Span::none())
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[tokio::test]
    async fn ids_are_not_reused() {
        let mut manager = manager();
        let (_c1, s1) = tokio::io::duplex(64);
        let (_c2, s2) = tokio::io::duplex(64);
        let first = manager.accept(s1, peer());
        manager.on_closed(first);
        let second = manager.accept(s2, peer());
        assert_ne!(first, second);
        assert!(!manager.is_open(first));
    }

    #[tokio::test]
    async fn unknown_ids_are_ignored() {
        let mut manager = manager();
        manager.on_data(99, b"GET / HTTP/1.1\r\n\r\n").await;
        manager.on_closed(99);
        assert_eq!(manager.open_connections(), 0);
    }

    #[tokio::test]
    async fn responds_once_and_drops_connection() {
        let mut manager = manager();
        let (mut client, server) = tokio::io::duplex(4096);
        let id = manager.accept(server, peer());

        manager.handle(Event::Data { id, bytes: b"GET /status HTTP/1.1\r\n\r\n".to_vec() }).await;
        assert!(!manager.is_open(id));

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert!(out.starts_with(b"HTTP/1.1 200 OK\r\n"));

        // The reader's close arriving afterwards is harmless.
        manager.handle(Event::Closed { id }).await;
        assert_eq!(manager.open_connections(), 0);
    }

    #[tokio::test]
    async fn partial_request_then_disconnect_sends_nothing() {
        let mut manager = manager();
        let (mut client, server) = tokio::io::duplex(4096);
        let id = manager.accept(server, peer());

        manager.on_data(id, b"").await;
        manager.on_data(id, b"GET /start HTTP/1.1\r\n").await;
        assert!(manager.is_open(id));

        manager.on_closed(id);
        assert_eq!(manager.open_connections(), 0);

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());
        assert!(!manager.router().controller().unwrap().is_recording());
    }

    #[tokio::test]
    async fn close_all_empties_the_table() {
        let mut manager = manager();
        let (_c1, s1) = tokio::io::duplex(64);
        let (_c2, s2) = tokio::io::duplex(64);
        manager.accept(s1, peer());
        manager.accept(s2, peer());
        manager.close_all();
        assert_eq!(manager.open_connections(), 0);
    }

    #[test]
    fn request_line_stops_at_cr() {
        assert_eq!(request_line(b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n"), "GET /x HTTP/1.1");
        assert_eq!(request_line(b"garbage"), "garbage");
    }
}
