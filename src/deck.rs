use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A single question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    /// Question side
    pub front: String,

    /// Answer side
    pub back: String,
}

impl Flashcard {
    /// Creates a new flashcard.
    #[must_use]
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
        }
    }
}

/// A titled, ordered collection of flashcards.
///
/// Decks written to disk use the `Title` key so that files saved by earlier
/// releases stay loadable; both spellings are accepted when reading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    /// Deck title (may be empty until set)
    #[serde(rename = "Title", alias = "title", default)]
    pub title: String,

    /// Cards in document order
    #[serde(default)]
    pub cards: Vec<Flashcard>,
}

impl Deck {
    /// Creates an empty deck with the given title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            cards: Vec::new(),
        }
    }

    /// Replaces the deck title.
    pub fn update_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Appends cards, keeping their order.
    pub fn extend_cards(&mut self, cards: impl IntoIterator<Item = Flashcard>) {
        self.cards.extend(cards);
    }

    /// Returns the number of cards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Returns true if the deck holds no cards.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// JSON schema describing the deck shape the completion endpoint must return.
///
/// Strict structured outputs require every property to be listed as required
/// and additional properties to be disallowed.
#[must_use]
pub fn deck_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "Title": {
                "type": "string",
                "description": "The title of the deck"
            },
            "cards": {
                "type": "array",
                "description": "A deck consisting of flashcards",
                "items": {
                    "type": "object",
                    "properties": {
                        "front": {
                            "type": "string",
                            "description": "The front side of the flashcard"
                        },
                        "back": {
                            "type": "string",
                            "description": "The back side of the flashcard"
                        }
                    },
                    "required": ["front", "back"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["Title", "cards"],
        "additionalProperties": false
    })
}
