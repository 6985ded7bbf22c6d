use std::future::Future;

use anyhow::Result;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn};

use crate::conn::{ConnectionId, ConnectionManager, Event};
use crate::controller::RecordingController;
use crate::router::Router;

const READ_CHUNK: usize = 4096;
const EVENT_QUEUE: usize = 256;

/// Runs the event loop until `shutdown` resolves.
///
/// Accepts, data and disconnects are handled one at a time on this task;
/// reader tasks only forward socket bytes into the queue.
pub async fn run<C, F>(listener: TcpListener, router: Router<C>, shutdown: F) -> Result<()>
where
    C: RecordingController,
    F: Future<Output = ()>,
{
    let span = info_span!("server", addr = %listener.local_addr()?);
    let mut manager = ConnectionManager::new(router, span.clone());
    let (tx, mut rx) = mpsc::channel::<Event>(EVENT_QUEUE);

    info!(parent: &span, "listening");
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(parent: &span, "accept failed: {err}");
                        continue;
                    }
                };
                let (reader, writer) = socket.into_split();
                let id = manager.accept(writer, peer);
                let task = tokio::spawn(read_loop(id, reader, tx.clone()));
                manager.attach_reader(id, task.abort_handle());
            }

            Some(event) = rx.recv() => {
                manager.handle(event).await;
            }

            _ = &mut shutdown => break,
        }
    }

    manager.close_all();
    info!(parent: &span, "server stopped");
    Ok(())
}

async fn read_loop(id: ConnectionId, mut reader: OwnedReadHalf, tx: mpsc::Sender<Event>) {
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let event = Event::Data { id, bytes: buf[..n].to_vec() };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                debug!(id, "read failed: {err}");
                break;
            }
        }
    }

    let _ = tx.send(Event::Closed { id }).await;
}
