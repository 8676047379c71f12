use crate::cancel::CancellationToken;
use crate::chunker::Chunk;
use crate::completion::CompletionInvoker;
use crate::deck::Deck;
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Turns one chunk into one partial deck.
///
/// A chunk either becomes a complete deck or fails; no partial decks escape.
#[derive(Clone)]
pub struct DeckProducer {
    invoker: Arc<dyn CompletionInvoker>,
}

impl DeckProducer {
    /// Creates a producer backed by the given invoker.
    #[must_use]
    pub fn new(invoker: Arc<dyn CompletionInvoker>) -> Self {
        Self { invoker }
    }

    /// Requests flashcards for `text` and parses the first choice into a deck.
    ///
    /// # Errors
    ///
    /// - [`Error::Invocation`] if the invoker fails, returns no choices, or the
    ///   first choice has no content
    /// - [`Error::Parse`] if the content is not deck-shaped JSON
    pub fn produce(&self, text: &str, token: &CancellationToken) -> Result<Deck> {
        let completion = self.invoker.complete(text, token).map_err(|e| match e {
            passthrough @ (Error::Cancelled | Error::Invocation { .. }) => passthrough,
            other => Error::invocation(other.to_string()),
        })?;

        let message = completion.first_message().ok_or_else(|| {
            warn!("Completion returned no choices");
            Error::invocation("received empty response")
        })?;

        let raw = match (&message.content, &message.refusal) {
            (Some(content), _) => content,
            (None, Some(refusal)) => {
                return Err(Error::invocation(format!("model refused: {refusal}")));
            }
            (None, None) => return Err(Error::invocation("response has no content")),
        };

        parse_deck(raw)
    }

    /// Produces the deck for a chunk, logging its progress.
    ///
    /// # Errors
    ///
    /// See [`produce`](Self::produce).
    #[instrument(skip(self, chunk, token), fields(chunk = chunk.index, words = chunk.word_count()))]
    pub fn produce_chunk(&self, chunk: &Chunk, token: &CancellationToken) -> Result<Deck> {
        let deck = self.produce(&chunk.text(), token)?;
        debug!("Chunk produced {} cards", deck.len());
        Ok(deck)
    }
}

impl std::fmt::Debug for DeckProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeckProducer").finish_non_exhaustive()
    }
}

/// Parses a raw completion payload into a deck.
fn parse_deck(raw: &str) -> Result<Deck> {
    serde_json::from_str(raw.trim()).map_err(|e| {
        warn!("Failed to parse flashcards JSON: {}", e);
        Error::parse(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{Choice, ChoiceMessage, Completion};
    use crate::deck::Flashcard;

    /// Answers every request with the same canned result.
    struct Canned(Result<Completion>);

    impl CompletionInvoker for Canned {
        fn complete(&self, _text: &str, _token: &CancellationToken) -> Result<Completion> {
            self.0.clone()
        }
    }

    fn producer(result: Result<Completion>) -> DeckProducer {
        DeckProducer::new(Arc::new(Canned(result)))
    }

    #[test]
    fn test_produce_parses_deck() {
        let payload = r#"{"Title":"Cells","cards":[{"front":"What is ATP?","back":"Energy currency"}]}"#;
        let deck = producer(Ok(Completion::from_content(payload)))
            .produce("mitochondria", &CancellationToken::new())
            .unwrap();

        assert_eq!(deck.title, "Cells");
        assert_eq!(deck.cards, vec![Flashcard::new("What is ATP?", "Energy currency")]);
    }

    #[test]
    fn test_empty_choices_is_invocation_error() {
        let err = producer(Ok(Completion::default()))
            .produce("text", &CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, Error::Invocation { .. }));
    }

    #[test]
    fn test_malformed_payload_is_parse_error() {
        let err = producer(Ok(Completion::from_content("Sure! Here are your cards:")))
            .produce("text", &CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_bare_card_array_is_parse_error() {
        let err = producer(Ok(Completion::from_content(r#"[{"front":"q","back":"a"}]"#)))
            .produce("text", &CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_invoker_failure_is_invocation_error() {
        let err = producer(Err(Error::anki("unexpected")))
            .produce("text", &CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, Error::Invocation { .. }));
    }

    #[test]
    fn test_refusal_is_invocation_error() {
        let completion = Completion {
            choices: vec![Choice {
                message: ChoiceMessage {
                    content: None,
                    refusal: Some("cannot help".to_string()),
                },
            }],
        };

        let err = producer(Ok(completion))
            .produce("text", &CancellationToken::new())
            .unwrap_err();

        assert!(err.to_string().contains("cannot help"));
    }

    #[test]
    fn test_produce_chunk_uses_joined_text() {
        struct Echo;

        impl CompletionInvoker for Echo {
            fn complete(&self, text: &str, _token: &CancellationToken) -> Result<Completion> {
                let deck = serde_json::json!({"Title": text, "cards": []});
                Ok(Completion::from_content(deck.to_string()))
            }
        }

        let chunk = Chunk::new(3, vec!["alpha".into(), "beta".into()]);
        let deck = DeckProducer::new(Arc::new(Echo))
            .produce_chunk(&chunk, &CancellationToken::new())
            .unwrap();

        assert_eq!(deck.title, "alpha beta");
    }
}
