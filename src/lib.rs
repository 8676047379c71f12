//! # flashdeck
//!
//! Turns markdown and text notes into Anki flashcard decks with an LLM.
//!
//! ## Features
//!
//! - Word-bounded chunking with an optional divider token
//! - Sequential, cancellable completion calls streamed over a rendezvous channel
//! - Deterministic merge of per-chunk decks in document order
//! - Decks saved as JSON for retry, then pushed to Anki through AnkiConnect
//!
//! ## Quick Start
//!
//! ```no_run
//! use flashdeck::{CancellationToken, Config, Pipeline};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .api_key("sk-...")
//!     .dry_run(true)
//!     .build()?;
//!
//! let stats = Pipeline::new(config)?.generate(
//!     Path::new("notes.md"),
//!     None,
//!     &CancellationToken::new(),
//! )?;
//! stats.print_summary();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library follows a pipeline architecture:
//! 1. **Chunker**: Splits the document into bounded word chunks
//! 2. **Producer**: Turns each chunk into a partial deck via the completion API
//! 3. **Stream**: Runs chunking and production on a worker thread, handing decks over one at a time
//! 4. **Merger**: Folds partial decks into the final deck
//! 5. **Sink**: Saves the deck and pushes it to Anki

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod anki;
mod cancel;
mod chunker;
mod completion;
mod config;
mod deck;
mod error;
mod merger;
mod pipeline;
mod producer;
mod storage;
mod stream;

pub use anki::{notes_for, AnkiClient, Note, NoteFields, PushReport};
pub use cancel::CancellationToken;
pub use chunker::{Chunk, Chunker, ChunkerSettings, Chunks};
pub use completion::{Choice, ChoiceMessage, Completion, CompletionInvoker, OpenAiClient};
pub use config::{Config, ConfigBuilder, DEFAULT_PROMPT};
pub use deck::{deck_schema, Deck, Flashcard};
pub use error::{Error, Result};
pub use merger::{DeckMerger, MergeOutcome, MergeState};
pub use pipeline::{push_saved_deck, Pipeline, PipelineStats};
pub use producer::DeckProducer;
pub use storage::{load_deck, DeckStore};
pub use stream::{stream_document, DeckStream};

use std::path::Path;

/// Converts a note file into one merged deck.
///
/// This is the core entry point: it streams per-chunk decks from the document
/// and merges them, discarding the partial result if any chunk fails.
///
/// # Errors
///
/// Returns an error if:
/// - The file is missing, unreadable, or larger than the size limit
/// - A completion call fails or returns an unparsable deck
/// - The token is cancelled before the document is exhausted
///
/// # Examples
///
/// ```no_run
/// use flashdeck::{transform_note, CancellationToken, Config, DeckProducer, OpenAiClient};
/// use std::{path::Path, sync::Arc};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder().api_key("sk-...").build()?;
/// let producer = DeckProducer::new(Arc::new(OpenAiClient::new(&config)?));
///
/// let deck = transform_note(
///     Path::new("notes.md"),
///     producer,
///     &config,
///     &CancellationToken::new(),
/// )?;
/// println!("{}: {} cards", deck.title, deck.len());
/// # Ok(())
/// # }
/// ```
pub fn transform_note(
    path: &Path,
    producer: DeckProducer,
    config: &Config,
    token: &CancellationToken,
) -> Result<Deck> {
    let stream = stream_document(path, producer, config.chunker_settings(), token.clone())?;
    DeckMerger::new().merge(stream).into_result()
}
