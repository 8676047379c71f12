use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use flashdeck::{push_saved_deck, CancellationToken, Config, ConfigBuilder, Pipeline};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "flashdeck",
    version,
    author,
    about = "Generate Anki flashcards from markdown and text notes",
    long_about = "Generate Anki flashcards from markdown and text notes.\n\n\
    The note file is split into word-bounded chunks (a line containing only --- \
    forces a break once enough words are collected), each chunk is turned into \
    flashcards by an OpenAI-compatible model, and the merged deck is saved as JSON \
    and pushed to Anki through the AnkiConnect add-on.\n\n\
    USAGE EXAMPLES:\n  \
      # Generate and push a deck\n  \
      flashdeck generate --file ~/notes/notes.md\n\n  \
      # Choose the deck title\n  \
      flashdeck generate -f notes.md --title \"Operating Systems\"\n\n  \
      # Generate only, push later\n  \
      flashdeck generate -f notes.md --dry-run\n  \
      flashdeck push --deck ~/.anki-cards-generator/deck-<id>.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generates Anki flashcards from an md/txt file
    Generate(GenerateArgs),

    /// Pushes a previously saved deck JSON file to Anki
    Push(PushArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Path to the md/txt file
    #[arg(short, long, value_name = "PATH")]
    file: PathBuf,

    /// Deck title (defaults to the title chosen by the model)
    #[arg(short, long)]
    title: Option<String>,

    /// Save the deck without pushing it to Anki
    #[arg(long)]
    dry_run: bool,

    /// Words a chunk must exceed before a divider can end it
    #[arg(long, default_value_t = 500)]
    min_words: usize,

    /// Maximum words per chunk
    #[arg(long, default_value_t = 800)]
    max_words: usize,

    /// Token that forces a chunk boundary
    #[arg(long, default_value = "---")]
    divider: String,

    /// Completion model
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// API key for the completion endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", value_name = "URL")]
    api_base: Option<String>,

    #[command(flatten)]
    anki: AnkiArgs,

    /// Directory for saved decks (default: ~/.anki-cards-generator)
    #[arg(long, value_name = "PATH")]
    processing_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PushArgs {
    /// Deck JSON file written by `generate`
    #[arg(short, long, value_name = "PATH")]
    deck: PathBuf,

    /// Override the deck title
    #[arg(short, long)]
    title: Option<String>,

    #[command(flatten)]
    anki: AnkiArgs,
}

#[derive(Args, Debug)]
struct AnkiArgs {
    /// AnkiConnect endpoint
    #[arg(long, default_value = "http://localhost:8765", value_name = "URL")]
    anki_url: String,

    /// Notes sent per AnkiConnect request
    #[arg(long, default_value_t = 50)]
    batch_size: usize,
}

impl AnkiArgs {
    fn apply(self, builder: ConfigBuilder) -> ConfigBuilder {
        builder
            .anki_endpoint(self.anki_url)
            .batch_size(self.batch_size)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    match cli.command {
        Command::Generate(args) => generate(args),
        Command::Push(args) => push(args),
    }
}

fn generate(args: GenerateArgs) -> anyhow::Result<()> {
    let mut builder = Config::builder()
        .min_words(args.min_words)
        .max_words(args.max_words)
        .divider(args.divider)
        .model(args.model)
        .dry_run(args.dry_run);

    if let Some(key) = args.api_key {
        builder = builder.api_key(key);
    }

    if let Some(base) = args.api_base {
        builder = builder.api_base(base);
    }

    if let Some(dir) = args.processing_dir {
        builder = builder.processing_dir(dir);
    }

    let config = args
        .anki
        .apply(builder)
        .build()
        .context("Failed to build configuration")?;

    let stats = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .generate(&args.file, args.title.as_deref(), &CancellationToken::new())
        .with_context(|| format!("Failed to generate flashcards from {}", args.file.display()))?;

    stats.print_summary();
    Ok(())
}

fn push(args: PushArgs) -> anyhow::Result<()> {
    let config = args
        .anki
        .apply(Config::builder())
        .build()
        .context("Failed to build configuration")?;

    let report = push_saved_deck(&config, &args.deck, args.title.as_deref())
        .with_context(|| format!("Failed to push {}", args.deck.display()))?;

    println!(
        "Pushed {} cards to Anki ({} rejected, {} batches)",
        report.added, report.rejected, report.batches
    );
    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("flashdeck=info"),
        1 => EnvFilter::new("flashdeck=debug"),
        _ => EnvFilter::new("flashdeck=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .init();

    Ok(())
}
