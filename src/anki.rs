//! AnkiConnect client.
//!
//! Talks to the AnkiConnect add-on (API version 6) over its local HTTP
//! endpoint. Every call is a JSON `POST` of `{action, version, params}`
//! answered by `{result, error}`.

use crate::config::Config;
use crate::deck::Deck;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const API_VERSION: u32 = 6;
const NOTE_MODEL: &str = "Basic";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A note ready for `addNotes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Target deck
    pub deck_name: String,

    /// Note type
    pub model_name: String,

    /// Field values
    pub fields: NoteFields,
}

/// Fields of a `Basic` note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteFields {
    /// Question side
    #[serde(rename = "Front")]
    pub front: String,

    /// Answer side
    #[serde(rename = "Back")]
    pub back: String,
}

impl Note {
    /// Creates a `Basic` note for the given deck.
    #[must_use]
    pub fn basic(front: impl Into<String>, back: impl Into<String>, deck_name: impl Into<String>) -> Self {
        Self {
            deck_name: deck_name.into(),
            model_name: NOTE_MODEL.to_string(),
            fields: NoteFields {
                front: front.into(),
                back: back.into(),
            },
        }
    }
}

/// Converts every card of a deck into a note targeting that deck.
#[must_use]
pub fn notes_for(deck: &Deck) -> Vec<Note> {
    deck.cards
        .iter()
        .map(|card| Note::basic(&card.front, &card.back, &deck.title))
        .collect()
}

/// Outcome of pushing a deck.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Number of `addNotes` requests sent
    pub batches: usize,

    /// Notes Anki accepted
    pub added: usize,

    /// Notes Anki rejected (usually duplicates)
    pub rejected: usize,
}

#[derive(Debug, Serialize)]
struct AnkiRequest<'a, P> {
    action: &'a str,
    version: u32,
    params: P,
}

#[derive(Debug, Deserialize)]
struct AnkiResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Value,
}

/// Blocking AnkiConnect client.
#[derive(Debug, Clone)]
pub struct AnkiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    batch_size: usize,
}

impl AnkiClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::anki(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.anki_endpoint.clone(),
            batch_size: config.batch_size,
        })
    }

    /// Checks that AnkiConnect is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be reached or does not answer 200.
    pub fn ping(&self) -> Result<()> {
        let response = self
            .http
            .get(&self.endpoint)
            .send()
            .map_err(|e| Error::anki(format!("failed to connect to AnkiConnect: {e}")))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::anki(format!(
                "unexpected status code: {}",
                response.status()
            )));
        }

        Ok(())
    }

    /// Returns the names of all decks.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the result is not a list of names.
    pub fn deck_names(&self) -> Result<Vec<String>> {
        let result = self.invoke("deckNames", json!({}))?;
        serde_json::from_value(result)
            .map_err(|e| Error::anki(format!("unexpected result format for deckNames: {e}")))
    }

    /// Creates a deck and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if Anki rejects the request.
    pub fn create_deck(&self, name: &str) -> Result<i64> {
        let result = self.invoke("createDeck", json!({ "deck": name }))?;
        result
            .as_i64()
            .ok_or_else(|| Error::anki(format!("createDeck returned {result}")))
    }

    /// Deletes a deck together with its cards.
    ///
    /// # Errors
    ///
    /// Returns an error if Anki rejects the request.
    pub fn delete_deck(&self, name: &str) -> Result<()> {
        self.invoke("deleteDecks", json!({ "decks": [name], "cardsToo": true }))?;
        Ok(())
    }

    /// Creates the deck unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the deck list cannot be read or creation fails.
    pub fn ensure_deck(&self, name: &str) -> Result<()> {
        if self.deck_names()?.iter().any(|existing| existing == name) {
            debug!("Deck '{}' already exists", name);
            return Ok(());
        }

        let id = self.create_deck(name)?;
        info!("Created deck '{}' ({})", name, id);
        Ok(())
    }

    /// Adds notes in one request, returning how many were accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub fn add_notes(&self, notes: &[Note]) -> Result<usize> {
        let result = self.invoke("addNotes", json!({ "notes": notes }))?;
        let ids: Vec<Option<i64>> = serde_json::from_value(result)
            .map_err(|e| Error::anki(format!("unexpected result format for addNotes: {e}")))?;

        Ok(ids.iter().filter(|id| id.is_some()).count())
    }

    /// Pushes every card of `deck`, creating the deck first if needed.
    ///
    /// Notes are sent in batches of the configured size, in card order.
    ///
    /// # Errors
    ///
    /// Returns an error if the deck has no title, or any request fails. Batches
    /// sent before the failure stay in Anki.
    #[instrument(skip(self, deck), fields(deck = %deck.title, cards = deck.len()))]
    pub fn send_deck(&self, deck: &Deck) -> Result<PushReport> {
        if deck.title.trim().is_empty() {
            return Err(Error::anki("deck title must not be empty"));
        }

        self.ensure_deck(&deck.title)?;

        let notes = notes_for(deck);
        let mut report = PushReport::default();

        for batch in notes.chunks(self.batch_size) {
            let added = self.add_notes(batch)?;
            let rejected = batch.len().saturating_sub(added);

            if rejected > 0 {
                warn!("Anki rejected {} of {} notes", rejected, batch.len());
            }
            info!("Successfully sent {} cards to Anki", added);

            report.batches += 1;
            report.added += added;
            report.rejected += rejected;
        }

        Ok(report)
    }

    /// Sends one action and returns its `result`.
    fn invoke<P: Serialize>(&self, action: &str, params: P) -> Result<Value> {
        let request = AnkiRequest {
            action,
            version: API_VERSION,
            params,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|e| Error::anki(format!("failed to make POST request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::anki(format!("unexpected status code: {status}")));
        }

        let body = response
            .text()
            .map_err(|e| Error::anki(format!("failed to read response body: {e}")))?;

        decode_response(&body)
    }
}

/// Extracts `result` from an AnkiConnect response body.
fn decode_response(body: &str) -> Result<Value> {
    let response: AnkiResponse = serde_json::from_str(body)
        .map_err(|e| Error::anki(format!("failed to parse response: {e}")))?;

    match response.error {
        Value::Null => Ok(response.result),
        Value::String(message) => Err(Error::anki(message)),
        other => Err(Error::anki(other.to_string())),
    }
}
