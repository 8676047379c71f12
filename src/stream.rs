//! Streams partial decks out of a document.
//!
//! One worker thread walks the document chunk by chunk, turns each chunk into
//! a deck and hands it over a rendezvous channel. The consumer receives
//! `Ok(deck)` items in document order followed by at most one `Err`, after
//! which the stream ends.
//!
//! ```text
//! document ──▶ Chunker ──▶ DeckProducer ──▶ sync_channel(0) ──▶ consumer
//!                 (worker thread)               (handoff)
//! ```

use crate::cancel::CancellationToken;
use crate::chunker::{Chunker, ChunkerSettings};
use crate::deck::Deck;
use crate::error::{Error, Result};
use crate::producer::DeckProducer;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Receiving end of a document stream.
///
/// Iterate it to pull decks. Each `next` call unblocks the worker for one
/// more chunk, so at most one finished deck is ever waiting.
#[derive(Debug)]
pub struct DeckStream {
    receiver: Receiver<Result<Deck>>,
    worker: Option<JoinHandle<()>>,
}

impl Iterator for DeckStream {
    type Item = Result<Deck>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.receiver.recv() {
            Ok(item) => Some(item),
            Err(_) => {
                let worker = self.worker.take()?;
                match worker.join() {
                    Ok(()) => None,
                    Err(payload) => Some(Err(Error::worker(panic_message(payload.as_ref())))),
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());

    match detail {
        Some(detail) => format!("panicked: {detail}"),
        None => "panicked".to_string(),
    }
}

/// Starts streaming decks for the document at `path`.
///
/// The worker stops at the first failure: file checks, read errors,
/// cancellation and producer failures are each delivered as the final item.
/// Cancellation is checked before every chunk; a completion request already
/// in flight is allowed to finish.
///
/// # Errors
///
/// Returns an error only if the worker thread cannot be spawned. Everything
/// else arrives through the stream.
pub fn stream_document(
    path: impl Into<PathBuf>,
    producer: DeckProducer,
    settings: ChunkerSettings,
    token: CancellationToken,
) -> Result<DeckStream> {
    let path = path.into();
    let (sender, receiver) = mpsc::sync_channel(0);

    let worker = StreamWorker {
        path,
        producer,
        settings,
        token,
        sender,
    };

    let handle = thread::Builder::new()
        .name("deck-stream".to_string())
        .spawn(move || worker.run())
        .map_err(|e| Error::worker(format!("failed to spawn: {e}")))?;

    Ok(DeckStream {
        receiver,
        worker: Some(handle),
    })
}

/// State owned by the worker thread.
struct StreamWorker {
    path: PathBuf,
    producer: DeckProducer,
    settings: ChunkerSettings,
    token: CancellationToken,
    sender: SyncSender<Result<Deck>>,
}

impl StreamWorker {
    fn run(self) {
        if let Err(e) = self.drive() {
            warn!("Deck stream for '{}' stopped: {}", self.path.display(), e);
            // A closed channel means the consumer already left
            let _ = self.sender.send(Err(e));
        }
    }

    /// Produces decks until the document is exhausted or something fails.
    ///
    /// Returning `Ok` also covers the consumer hanging up early.
    fn drive(&self) -> Result<()> {
        let chunks = Chunker::open(&self.path, self.settings.clone())?;
        let mut delivered = 0_usize;

        for chunk in chunks {
            let chunk = chunk?;

            if self.token.is_cancelled() {
                debug!("Cancelled before chunk {}", chunk.index);
                return Err(Error::Cancelled);
            }

            let deck = self
                .producer
                .produce_chunk(&chunk, &self.token)
                .map_err(|e| Error::in_chunk(chunk.index, e))?;

            if self.sender.send(Ok(deck)).is_err() {
                debug!("Deck stream consumer hung up after {} decks", delivered);
                return Ok(());
            }
            delivered += 1;
        }

        info!("Streamed {} decks from '{}'", delivered, self.path.display());
        Ok(())
    }
}
