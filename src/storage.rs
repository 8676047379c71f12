use crate::deck::Deck;
use crate::error::{Error, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::debug;

const PROCESSING_DIR_NAME: &str = ".anki-cards-generator";

/// Persists generated decks as pretty-printed JSON for retry and inspection.
#[derive(Debug, Clone)]
pub struct DeckStore {
    dir: PathBuf,
}

impl DeckStore {
    /// Creates a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates a store in `~/.anki-cards-generator`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn in_home() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::config("cannot determine the home directory"))?;
        Ok(Self::new(home.join(PROCESSING_DIR_NAME)))
    }

    /// Returns the store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `deck` to a new randomly named file and returns its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot
    /// be written.
    pub fn save(&self, deck: &Deck) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::file_access(&self.dir, e))?;

        let path = self.dir.join(random_file_name("deck", "json"));
        let content = serde_json::to_string_pretty(deck)?;
        write_file_atomic(&path, &content)?;

        debug!("Saved deck '{}' ({} cards) to {}", deck.title, deck.len(), path.display());
        Ok(path)
    }
}

/// Reads a deck previously written by [`DeckStore::save`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not contain a deck.
pub fn load_deck(path: &Path) -> Result<Deck> {
    let content = fs::read_to_string(path).map_err(|e| Error::file_access(path, e))?;
    Ok(serde_json::from_str(&content)?)
}

/// Generates `<prefix>-<32 hex chars>.<extension>`.
fn random_file_name(prefix: &str, extension: &str) -> String {
    format!("{prefix}-{}.{extension}", uuid::Uuid::new_v4().simple())
}

/// Writes a file atomically.
///
/// # Process
///
/// 1. Writes content to a temporary file next to the target
/// 2. Syncs the temporary file to disk
/// 3. Renames it over the target path
fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut temp_file = fs::File::create(&temp_path).map_err(|e| Error::file_access(&temp_path, e))?;

    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| Error::file_access(&temp_path, e))?;
    temp_file.write_all(b"\n").map_err(|e| Error::file_access(&temp_path, e))?;

    temp_file
        .sync_all()
        .map_err(|e| Error::file_access(&temp_path, e))?;

    drop(temp_file);

    fs::rename(&temp_path, path).map_err(|e| Error::file_access(path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::Flashcard;
    use assert_fs::prelude::*;

    fn sample_deck() -> Deck {
        let mut deck = Deck::new("Test Deck");
        deck.extend_cards([Flashcard::new("Q1", "A1"), Flashcard::new("Q2", "A2")]);
        deck
    }

    #[test]
    fn test_save_creates_directory_and_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let store = DeckStore::new(temp.path().join("processing"));

        let path = store.save(&sample_deck()).unwrap();

        assert!(path.exists());
        assert!(path.starts_with(store.dir()));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("deck-"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.len(), "deck-".len() + 32 + ".json".len());
    }

    #[test]
    fn test_saved_json_is_indented() {
        let temp = assert_fs::TempDir::new().unwrap();
        let path = DeckStore::new(temp.path()).save(&sample_deck()).unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("\n  \"Title\": \"Test Deck\""));
    }

    #[test]
    fn test_save_then_load() {
        let temp = assert_fs::TempDir::new().unwrap();
        let store = DeckStore::new(temp.path());

        let path = store.save(&sample_deck()).unwrap();
        assert_eq!(load_deck(&path).unwrap(), sample_deck());
    }

    #[test]
    fn test_each_save_gets_new_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let store = DeckStore::new(temp.path());

        let first = store.save(&sample_deck()).unwrap();
        let second = store.save(&sample_deck()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_load_rejects_non_deck_json() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("broken.json");
        file.write_str("[1, 2, 3]").unwrap();

        let err = load_deck(file.path()).unwrap_err();
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let err = load_deck(&temp.path().join("nope.json")).unwrap_err();
        assert!(err.is_file_access());
    }
}
