use crate::chunker::ChunkerSettings;
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MIN_WORDS: usize = 500;
const DEFAULT_MAX_WORDS: usize = 800;
const DEFAULT_DIVIDER: &str = "---";
const DEFAULT_SIZE_LIMIT: u64 = 500_000_000;
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_ANKI_ENDPOINT: &str = "http://localhost:8765";
const DEFAULT_BATCH_SIZE: usize = 50;

/// Instruction sent ahead of every chunk.
pub const DEFAULT_PROMPT: &str = "\
You are a tool that processes a text file (in .md or .txt format) containing detailed information. \
Your task is to generate insightful flashcards by connecting various concepts within the content.

Instructions:
1. Understand the content: identify the key concepts, processes, relationships, and ideas that are interrelated.
2. Create insightful questions: the front of each card should challenge the reader to connect different ideas \
rather than recall isolated facts.
3. Provide detailed answers: the back should integrate information from the content and explain why the \
relationship matters.
4. Output format: return a JSON object with a short \"Title\" describing the material and a \"cards\" array \
whose items have the keys \"front\" (the question) and \"back\" (the explanation). \
Do not include any text outside of the JSON structure.";

/// Configuration for the flashdeck pipeline.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Words a chunk must exceed before a divider may close it
    pub min_words: usize,

    /// Hard upper bound of words per chunk
    pub max_words: usize,

    /// Literal token that forces an early chunk boundary
    pub divider: String,

    /// Largest document accepted, in bytes
    pub size_limit: u64,

    /// Completion model name
    pub model: String,

    /// Instruction sent ahead of every chunk
    pub prompt: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Base URL of the OpenAI-compatible API
    pub api_base: String,

    /// API key; required unless the invoker is injected
    pub api_key: Option<String>,

    /// Timeout for a single completion request
    pub request_timeout: Duration,

    /// AnkiConnect endpoint
    pub anki_endpoint: String,

    /// Notes per `addNotes` request
    pub batch_size: usize,

    /// Directory for saved decks (defaults to `~/.anki-cards-generator`)
    pub processing_dir: Option<PathBuf>,

    /// Generate and save the deck without pushing it to Anki
    pub dry_run: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use flashdeck::Config;
    ///
    /// let config = Config::builder()
    ///     .min_words(200)
    ///     .max_words(400)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Word thresholds are zero or out of order
    /// - The divider is empty or contains whitespace
    /// - Size limit or batch size is zero
    /// - The model name is empty
    pub fn validate(&self) -> Result<()> {
        if self.min_words == 0 {
            return Err(Error::config("min_words must be greater than 0"));
        }

        if self.min_words >= self.max_words {
            return Err(Error::config(format!(
                "min_words ({}) must be less than max_words ({})",
                self.min_words, self.max_words
            )));
        }

        // Tokens are whitespace-delimited, so such a divider could never match
        if self.divider.is_empty() || self.divider.chars().any(char::is_whitespace) {
            return Err(Error::config(format!(
                "divider '{}' must be a single non-empty token",
                self.divider
            )));
        }

        if self.size_limit == 0 {
            return Err(Error::config("size_limit must be greater than 0"));
        }

        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be greater than 0"));
        }

        if self.model.trim().is_empty() {
            return Err(Error::config("model must not be empty"));
        }

        Ok(())
    }

    /// Returns the chunking parameters derived from this configuration.
    #[must_use]
    pub fn chunker_settings(&self) -> ChunkerSettings {
        ChunkerSettings {
            min_words: self.min_words,
            max_words: self.max_words,
            divider: self.divider.clone(),
            size_limit: self.size_limit,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_words: DEFAULT_MIN_WORDS,
            max_words: DEFAULT_MAX_WORDS,
            divider: DEFAULT_DIVIDER.to_string(),
            size_limit: DEFAULT_SIZE_LIMIT,
            model: DEFAULT_MODEL.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            anki_endpoint: DEFAULT_ANKI_ENDPOINT.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            processing_dir: None,
            dry_run: false,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    min_words: Option<usize>,
    max_words: Option<usize>,
    divider: Option<String>,
    size_limit: Option<u64>,
    model: Option<String>,
    prompt: Option<String>,
    temperature: Option<f32>,
    api_base: Option<String>,
    api_key: Option<String>,
    request_timeout: Option<Duration>,
    anki_endpoint: Option<String>,
    batch_size: Option<usize>,
    processing_dir: Option<PathBuf>,
    dry_run: bool,
}

impl ConfigBuilder {
    /// Sets the word count a chunk must exceed before a divider can close it.
    #[must_use]
    pub fn min_words(mut self, words: usize) -> Self {
        self.min_words = Some(words);
        self
    }

    /// Sets the maximum number of words per chunk.
    #[must_use]
    pub fn max_words(mut self, words: usize) -> Self {
        self.max_words = Some(words);
        self
    }

    /// Sets the divider token.
    #[must_use]
    pub fn divider(mut self, divider: impl Into<String>) -> Self {
        self.divider = Some(divider.into());
        self
    }

    /// Sets the document size ceiling in bytes.
    #[must_use]
    pub fn size_limit(mut self, bytes: u64) -> Self {
        self.size_limit = Some(bytes);
        self
    }

    /// Sets the completion model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Overrides the instruction sent ahead of every chunk.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the base URL of the completion API.
    #[must_use]
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = Some(url.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the timeout for a single completion request.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the AnkiConnect endpoint.
    #[must_use]
    pub fn anki_endpoint(mut self, url: impl Into<String>) -> Self {
        self.anki_endpoint = Some(url.into());
        self
    }

    /// Sets how many notes are sent per request.
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets the directory where generated decks are saved.
    #[must_use]
    pub fn processing_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.processing_dir = Some(path.into());
        self
    }

    /// Enables dry run mode (no push to Anki).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            min_words: self.min_words.unwrap_or(DEFAULT_MIN_WORDS),
            max_words: self.max_words.unwrap_or(DEFAULT_MAX_WORDS),
            divider: self
                .divider
                .unwrap_or_else(|| DEFAULT_DIVIDER.to_string()),
            size_limit: self.size_limit.unwrap_or(DEFAULT_SIZE_LIMIT),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            prompt: self.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            api_base: self
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: self.api_key.filter(|key| !key.trim().is_empty()),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            anki_endpoint: self
                .anki_endpoint
                .unwrap_or_else(|| DEFAULT_ANKI_ENDPOINT.to_string()),
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            processing_dir: self.processing_dir,
            dry_run: self.dry_run,
        };

        config.validate()?;
        Ok(config)
    }
}
