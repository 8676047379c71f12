use crate::config::Config;
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Longest single word accepted, in bytes.
const MAX_WORD_BYTES: usize = 64 * 1024;

/// Thresholds controlling where chunk boundaries fall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkerSettings {
    /// Words a chunk must exceed before a divider may close it
    pub min_words: usize,

    /// Hard upper bound of words per chunk
    pub max_words: usize,

    /// Literal token that forces an early boundary
    pub divider: String,

    /// Largest document accepted by [`Chunker::open`], in bytes
    pub size_limit: u64,
}

impl Default for ChunkerSettings {
    fn default() -> Self {
        Config::default().chunker_settings()
    }
}

/// An ordered run of words taken from the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Sequential chunk index (0-based)
    pub index: usize,

    /// Words in document order
    pub words: Vec<String>,
}

impl Chunk {
    /// Creates a new chunk.
    #[must_use]
    pub fn new(index: usize, words: Vec<String>) -> Self {
        Self { index, words }
    }

    /// Returns the words joined by single spaces.
    #[must_use]
    pub fn text(&self) -> String {
        self.words.join(" ")
    }

    /// Returns the number of words in this chunk.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Returns true if this chunk is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Entry points for chunking a document.
pub struct Chunker;

impl Chunker {
    /// Opens a document after checking that it exists and fits the size ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileAccess`] if the file cannot be inspected or opened,
    /// and [`Error::SizeLimitExceeded`] if it is larger than
    /// `settings.size_limit`. No chunk is produced in either case.
    pub fn open(path: &Path, settings: ChunkerSettings) -> Result<Chunks<BufReader<File>>> {
        let metadata = fs::metadata(path).map_err(|e| Error::file_access(path, e))?;

        if !metadata.is_file() {
            return Err(Error::FileAccess {
                path: path.to_path_buf(),
                message: "not a regular file".to_string(),
            });
        }

        if metadata.len() > settings.size_limit {
            return Err(Error::SizeLimitExceeded {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit: settings.size_limit,
            });
        }

        let file = File::open(path).map_err(|e| Error::file_access(path, e))?;

        debug!(
            "Chunking '{}' ({} bytes, {}..{} words per chunk)",
            path.display(),
            metadata.len(),
            settings.min_words,
            settings.max_words
        );

        Ok(Chunks::new(BufReader::new(file), path, settings))
    }

    /// Chunks an already opened reader. No size check is applied.
    pub fn from_reader<R: BufRead>(reader: R, settings: ChunkerSettings) -> Chunks<R> {
        Chunks::new(reader, Path::new("<reader>"), settings)
    }
}

/// Lazy iterator over the chunks of a document.
///
/// Yields `Ok(chunk)` in document order. A read failure is yielded once as
/// `Err` and ends the iteration.
pub struct Chunks<R> {
    words: Words<R>,
    settings: ChunkerSettings,
    builder: ChunkBuilder,
    next_index: usize,
    finished: bool,
}

impl<R: BufRead> Chunks<R> {
    fn new(reader: R, source: &Path, settings: ChunkerSettings) -> Self {
        let capacity = settings.max_words;
        Self {
            words: Words::new(reader, source.to_path_buf()),
            settings,
            builder: ChunkBuilder::with_capacity(capacity),
            next_index: 0,
            finished: false,
        }
    }

    /// Feeds one token into the accumulator, returning a chunk when a boundary is hit.
    fn accept(&mut self, word: String) -> Option<Chunk> {
        if word == self.settings.divider && self.builder.len() > self.settings.min_words {
            trace!("Divider after {} words", self.builder.len());
            return self.flush();
        }

        self.builder.push(word);

        if self.builder.len() >= self.settings.max_words {
            return self.flush();
        }

        None
    }

    fn flush(&mut self) -> Option<Chunk> {
        let builder = std::mem::replace(
            &mut self.builder,
            ChunkBuilder::with_capacity(self.settings.max_words),
        );
        let chunk = builder.build(self.next_index)?;
        self.next_index += 1;

        trace!("Chunk {} ready ({} words)", chunk.index, chunk.word_count());
        Some(chunk)
    }
}

impl<R: BufRead> Iterator for Chunks<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.words.next() {
                Some(Ok(word)) => {
                    if let Some(chunk) = self.accept(word) {
                        return Some(Ok(chunk));
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    return self.flush().map(Ok);
                }
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for Chunks<R> {}

/// Whitespace-delimited tokens streamed from the reader.
///
/// Only the word being read is buffered, never the whole line. Bytes that are
/// not valid UTF-8 are decoded lossily so they stay part of their word.
struct Words<R> {
    reader: R,
    source: PathBuf,
    token: Vec<u8>,
    pending: VecDeque<String>,
    done: bool,
}

impl<R: BufRead> Words<R> {
    fn new(reader: R, source: PathBuf) -> Self {
        Self {
            reader,
            source,
            token: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Reads until a complete word is buffered in `token`.
    ///
    /// Returns `false` once the input is exhausted with nothing buffered.
    fn fill_token(&mut self) -> Result<bool> {
        loop {
            let available = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::file_access(&self.source, e)),
            };

            if available.is_empty() {
                return Ok(!self.token.is_empty());
            }

            let mut consumed = 0;
            let mut complete = false;
            for &byte in available {
                consumed += 1;
                if byte.is_ascii_whitespace() || byte == 0x0b {
                    if !self.token.is_empty() {
                        complete = true;
                        break;
                    }
                } else {
                    self.token.push(byte);
                    if self.token.len() > MAX_WORD_BYTES {
                        break;
                    }
                }
            }
            self.reader.consume(consumed);

            if self.token.len() > MAX_WORD_BYTES {
                return Err(Error::FileAccess {
                    path: self.source.clone(),
                    message: format!("word longer than {MAX_WORD_BYTES} bytes"),
                });
            }

            if complete {
                return Ok(true);
            }
        }
    }
}

impl<R: BufRead> Iterator for Words<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(word) = self.pending.pop_front() {
                return Some(Ok(word));
            }

            if self.done {
                return None;
            }

            match self.fill_token() {
                Ok(true) => {
                    // Non-ASCII spaces only show up after decoding
                    let text = String::from_utf8_lossy(&self.token).into_owned();
                    self.token.clear();
                    self.pending
                        .extend(text.split_whitespace().map(str::to_owned));
                }
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Accumulates words for the chunk under construction.
struct ChunkBuilder {
    words: Vec<String>,
}

impl ChunkBuilder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            words: Vec::with_capacity(capacity),
        }
    }

    fn len(&self) -> usize {
        self.words.len()
    }

    fn push(&mut self, word: String) {
        self.words.push(word);
    }

    /// Builds the chunk if any words were accumulated.
    fn build(self, index: usize) -> Option<Chunk> {
        if self.words.is_empty() {
            None
        } else {
            Some(Chunk::new(index, self.words))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::cell::Cell;
    use std::io::{Cursor, Read};
    use std::rc::Rc;

    fn settings(min_words: usize, max_words: usize) -> ChunkerSettings {
        ChunkerSettings {
            min_words,
            max_words,
            ..ChunkerSettings::default()
        }
    }

    fn chunk_text(text: &str, settings: ChunkerSettings) -> Vec<Vec<String>> {
        Chunker::from_reader(Cursor::new(text.to_string()), settings)
            .map(|chunk| chunk.unwrap().words)
            .collect()
    }

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn test_empty_document_yields_nothing() {
        assert!(chunk_text("", settings(2, 5)).is_empty());
        assert!(chunk_text("  \n\t\n ", settings(2, 5)).is_empty());
    }

    #[test]
    fn test_small_document_is_single_chunk() {
        let text = "Ownership rules\nBorrowing  rules\n\nLifetimes";
        let chunks = chunk_text(text, settings(2, 10));

        assert_eq!(chunks, vec![words(text)]);
    }

    #[test]
    fn test_max_words_bounds_every_chunk() {
        let text = (1..=12).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk_text(&text, settings(2, 5));

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], words("w1 w2 w3 w4 w5"));
        assert_eq!(chunks[1], words("w6 w7 w8 w9 w10"));
        assert_eq!(chunks[2], words("w11 w12"));
        assert!(chunks.iter().all(|c| c.len() <= 5));
    }

    #[test]
    fn test_divider_after_min_words_splits_and_is_dropped() {
        let text = "a b c\n---\nd e";
        let chunks = chunk_text(text, settings(2, 10));

        assert_eq!(chunks, vec![words("a b c"), words("d e")]);
    }

    #[test]
    fn test_divider_before_min_words_is_kept_as_word() {
        let text = "a b --- c d";
        let chunks = chunk_text(text, settings(2, 10));

        assert_eq!(chunks, vec![words("a b --- c d")]);
    }

    #[test]
    fn test_consecutive_dividers() {
        // The second divider arrives with an empty accumulator, so it is an ordinary word
        let text = "a b c --- --- d";
        let chunks = chunk_text(text, settings(2, 10));

        assert_eq!(chunks, vec![words("a b c"), words("--- d")]);
    }

    #[test]
    fn test_custom_divider() {
        let text = "one two three *** four";
        let chunks = chunk_text(
            text,
            ChunkerSettings {
                divider: "***".to_string(),
                ..settings(1, 10)
            },
        );

        assert_eq!(chunks, vec![words("one two three"), words("four")]);
    }

    #[test]
    fn test_chunk_indices_are_sequential() {
        let text = "a b c d e f g";
        let indices: Vec<usize> = Chunker::from_reader(Cursor::new(text), settings(1, 2))
            .map(|c| c.unwrap().index)
            .collect();

        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_chunk_text_joins_with_spaces() {
        let chunk = Chunk::new(0, words("fn   main\n()"));
        assert_eq!(chunk.text(), "fn main ()");
        assert_eq!(chunk.word_count(), 3);
    }

    #[test]
    fn test_open_rejects_oversized_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("big.md");
        file.write_str("0123456789A").unwrap();

        let result = Chunker::open(
            file.path(),
            ChunkerSettings {
                size_limit: 10,
                ..ChunkerSettings::default()
            },
        );

        match result {
            Err(err) => assert!(err.is_size_limit()),
            Ok(_) => panic!("expected size limit error"),
        }
    }

    #[test]
    fn test_open_missing_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let result = Chunker::open(&temp.path().join("missing.md"), ChunkerSettings::default());

        match result {
            Err(err) => assert!(err.is_file_access()),
            Ok(_) => panic!("expected file access error"),
        }
    }

    #[test]
    fn test_open_reads_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("notes.md");
        file.write_str("# Title\n\nsome notes here\n---\nmore").unwrap();

        let chunks: Vec<Chunk> = Chunker::open(file.path(), settings(2, 50))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text(), "# Title some notes here");
        assert_eq!(chunks[1].text(), "more");
    }

    /// Serves a fixed prefix, then fails every read.
    struct FailingReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                Err(std::io::Error::other("disk on fire"))
            } else {
                Ok(n)
            }
        }
    }

    #[test]
    fn test_read_error_ends_iteration() {
        let reader = std::io::BufReader::new(FailingReader {
            data: Cursor::new(b"a b c d e\nf g".to_vec()),
        });
        let mut chunks = Chunker::from_reader(reader, settings(1, 3));

        assert_eq!(chunks.next().unwrap().unwrap().words, words("a b c"));
        assert_eq!(chunks.next().unwrap().unwrap().words, words("d e f"));

        // "g" is still open when the read fails and is never emitted
        let err = chunks.next().unwrap().unwrap_err();
        assert!(err.is_file_access());
        assert!(chunks.next().is_none());
    }

    #[test]
    fn test_latin1_note_is_chunked() {
        let bytes: &[u8] = b"Notes on caf\xe9 culture and more words here";
        let chunks: Vec<Vec<String>> = Chunker::from_reader(bytes, settings(1, 3))
            .map(|chunk| chunk.unwrap().words)
            .collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], vec!["Notes", "on", "caf\u{FFFD}"]);
        assert_eq!(chunks[1], words("culture and more"));
        assert_eq!(chunks[2], words("words here"));
    }

    #[test]
    fn test_non_ascii_whitespace_separates_words() {
        let chunks = chunk_text("a\u{00A0}b\u{2003}c d", settings(1, 10));
        assert_eq!(chunks, vec![words("a b c d")]);
    }

    /// Counts the bytes handed out by the inner reader.
    struct CountingReader {
        data: Cursor<Vec<u8>>,
        read: Rc<Cell<usize>>,
    }

    impl Read for CountingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.data.read(buf)?;
            self.read.set(self.read.get() + n);
            Ok(n)
        }
    }

    #[test]
    fn test_single_line_document_is_read_lazily() {
        let line = (0..200_000).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let total = line.len();
        let read = Rc::new(Cell::new(0));
        let reader = std::io::BufReader::with_capacity(
            64,
            CountingReader {
                data: Cursor::new(line.into_bytes()),
                read: Rc::clone(&read),
            },
        );
        let mut chunks = Chunker::from_reader(reader, settings(1, 3));

        assert_eq!(chunks.next().unwrap().unwrap().words, words("w0 w1 w2"));
        assert!(read.get() <= 128, "read {} of {} bytes", read.get(), total);

        let rest: Vec<Chunk> = chunks.collect::<Result<_>>().unwrap();
        assert_eq!(rest.len(), 66_666);
        assert_eq!(rest.last().unwrap().words, words("w199998 w199999"));
        assert_eq!(read.get(), total);
    }

    #[test]
    fn test_oversized_word_is_read_error() {
        let text = format!("short {}", "x".repeat(MAX_WORD_BYTES + 1));
        let mut chunks = Chunker::from_reader(Cursor::new(text), settings(1, 10));

        let err = chunks.next().unwrap().unwrap_err();
        assert!(err.is_file_access());
        assert!(err.to_string().contains("word longer than"));
        assert!(chunks.next().is_none());
    }

    #[test]
    fn test_default_settings_follow_config() {
        let defaults = ChunkerSettings::default();

        assert_eq!(defaults, Config::default().chunker_settings());
        assert_eq!(defaults.min_words, 500);
        assert_eq!(defaults.max_words, 800);
        assert_eq!(defaults.divider, "---");
    }
}
