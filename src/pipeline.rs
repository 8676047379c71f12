use crate::{
    anki::{AnkiClient, PushReport},
    cancel::CancellationToken,
    completion::{CompletionInvoker, OpenAiClient},
    config::Config,
    deck::Deck,
    error::{Error, Result},
    merger::DeckMerger,
    producer::DeckProducer,
    storage::{load_deck, DeckStore},
    stream::stream_document,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Statistics collected during a `generate` run.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Source document
    pub source: PathBuf,

    /// Final deck title
    pub title: String,

    /// Number of partial decks merged (one per chunk)
    pub chunks: usize,

    /// Total cards in the final deck
    pub cards: usize,

    /// Where the deck JSON was saved
    pub saved_to: PathBuf,

    /// Result of the push, `None` in dry run mode
    pub push: Option<PushReport>,

    /// Time spent generating cards
    pub generate_duration: Duration,

    /// Time spent pushing to Anki
    pub push_duration: Duration,

    /// Total execution time
    pub duration: Duration,
}

impl PipelineStats {
    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              Deck Generation Summary                  ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!("║ Source:                                               ║");
        println!("║   {}", self.source.display());
        println!("║ Deck:                                                 ║");
        println!("║   {}", self.title);
        println!("║                                                       ║");
        println!(
            "║ Chunks Processed:     {:>8}                        ║",
            self.chunks
        );
        println!(
            "║ Cards Generated:      {:>8}                        ║",
            self.cards
        );
        match &self.push {
            Some(report) => {
                println!(
                    "║ Cards Added to Anki:  {:>8}                        ║",
                    report.added
                );
                println!(
                    "║ Cards Rejected:       {:>8}                        ║",
                    report.rejected
                );
            }
            None => {
                println!("║ ⚠ Nothing pushed to Anki (dry run mode)               ║");
            }
        }
        println!("║ Saved To:                                             ║");
        println!("║   {}", self.saved_to.display());
        println!("║                                                       ║");
        println!("║ Timing Breakdown:                                     ║");
        println!(
            "║   - Generating:       {:>8.2}s                     ║",
            self.generate_duration.as_secs_f64()
        );
        println!(
            "║   - Pushing:          {:>8.2}s                     ║",
            self.push_duration.as_secs_f64()
        );
        println!(
            "║   - Total:            {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }

    /// Returns the average number of cards per chunk.
    #[must_use]
    pub fn cards_per_chunk(&self) -> f64 {
        if self.chunks == 0 {
            return 0.0;
        }
        self.cards as f64 / self.chunks as f64
    }
}

/// Main pipeline orchestrator for turning notes into Anki decks.
pub struct Pipeline {
    config: Config,
    producer: DeckProducer,
    store: DeckStore,
    anki: AnkiClient,
}

impl Pipeline {
    /// Creates a pipeline that calls the configured completion API.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - No API key is configured
    /// - The processing directory cannot be determined
    pub fn new(config: Config) -> Result<Self> {
        let invoker = OpenAiClient::new(&config)?;
        Self::with_invoker(config, Arc::new(invoker))
    }

    /// Creates a pipeline with a custom completion backend.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails or the processing
    /// directory cannot be determined.
    pub fn with_invoker(config: Config, invoker: Arc<dyn CompletionInvoker>) -> Result<Self> {
        config.validate()?;

        let store = store_for(&config)?;
        let anki = AnkiClient::new(&config)?;

        Ok(Self {
            config,
            producer: DeckProducer::new(invoker),
            store,
            anki,
        })
    }

    /// Generates a deck from `path`, saves it and pushes it to Anki.
    ///
    /// # Process
    ///
    /// 1. **Generate**: chunk the document and merge the per-chunk decks
    /// 2. **Save**: write the deck as JSON into the processing directory
    /// 3. **Push**: create the Anki deck if needed and add the notes
    ///
    /// A `title` overrides the one chosen by the model. Without either, the
    /// file stem is used.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails, produces no cards, or saving or
    /// pushing fails. Nothing is pushed when generation fails.
    #[instrument(skip(self, token), fields(path = %path.display()))]
    pub fn generate(
        &self,
        path: &Path,
        title: Option<&str>,
        token: &CancellationToken,
    ) -> Result<PipelineStats> {
        let start_time = Instant::now();

        info!("Stage 1/3: Generating flashcards...");
        let generate_start = Instant::now();
        let outcome = DeckMerger::new().merge(stream_document(
            path,
            self.producer.clone(),
            self.config.chunker_settings(),
            token.clone(),
        )?);
        let chunks = outcome.decks_merged;
        let mut deck = outcome.into_result()?;
        let generate_duration = generate_start.elapsed();

        apply_title(&mut deck, title, path);

        if deck.is_empty() {
            return Err(Error::EmptyDeck {
                path: path.to_path_buf(),
            });
        }

        info!(
            "✓ Generated {} cards from {} chunks in {:.2}s",
            deck.len(),
            chunks,
            generate_duration.as_secs_f64()
        );

        info!("Stage 2/3: Saving deck...");
        let saved_to = self.store.save(&deck)?;
        info!("✓ Saved deck to {}", saved_to.display());

        let push_start = Instant::now();
        let push = if self.config.dry_run {
            warn!("Dry run mode enabled - skipping Anki push");
            None
        } else {
            info!("Stage 3/3: Pushing to Anki...");
            let report = self.anki.send_deck(&deck)?;
            info!("✓ Pushed {} cards in {} batches", report.added, report.batches);
            Some(report)
        };
        let push_duration = push_start.elapsed();

        let duration = start_time.elapsed();
        info!(
            "✓ Pipeline completed successfully in {:.2}s",
            duration.as_secs_f64()
        );

        Ok(PipelineStats {
            source: path.to_path_buf(),
            title: deck.title,
            chunks,
            cards: deck.cards.len(),
            saved_to,
            push,
            generate_duration,
            push_duration,
            duration,
        })
    }
}

/// Pushes a deck saved by a previous run.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded, holds no cards, or the push fails.
#[instrument(skip(config), fields(path = %path.display()))]
pub fn push_saved_deck(config: &Config, path: &Path, title: Option<&str>) -> Result<PushReport> {
    let mut deck = load_deck(path)?;
    apply_title(&mut deck, title, path);

    if deck.is_empty() {
        return Err(Error::EmptyDeck {
            path: path.to_path_buf(),
        });
    }

    info!("Pushing saved deck '{}' ({} cards)", deck.title, deck.len());
    AnkiClient::new(config)?.send_deck(&deck)
}

/// Returns the deck store selected by the configuration.
fn store_for(config: &Config) -> Result<DeckStore> {
    match &config.processing_dir {
        Some(dir) => Ok(DeckStore::new(dir)),
        None => DeckStore::in_home(),
    }
}

/// Overrides the title when requested, falling back to the file stem if the
/// deck would otherwise stay untitled.
fn apply_title(deck: &mut Deck, title: Option<&str>, path: &Path) {
    if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
        deck.update_title(title);
    } else if deck.title.trim().is_empty() {
        let stem = path
            .file_stem()
            .map_or_else(|| "Flashcards".to_string(), |s| s.to_string_lossy().into_owned());
        deck.update_title(stem);
    }
}
