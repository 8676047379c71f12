use crate::deck::Deck;
use crate::error::{Error, Result};
use tracing::debug;

/// Where a [`DeckMerger`] is in its lifecycle.
///
/// Finishing consumes the merger, so the terminal state is represented by the
/// returned [`MergeOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    /// No deck received yet
    Idle,
    /// At least one deck folded in
    Accumulating,
}

/// Folds partial decks into one.
///
/// The first deck's title wins; cards are appended in the order decks arrive.
#[derive(Debug)]
pub struct DeckMerger {
    deck: Deck,
    state: MergeState,
    decks_merged: usize,
}

/// Result of draining a deck stream.
#[derive(Debug)]
pub struct MergeOutcome {
    /// Everything merged before the stream ended
    pub deck: Deck,

    /// Terminal error of the stream, if it ended with one
    pub error: Option<Error>,

    /// Number of partial decks folded in
    pub decks_merged: usize,
}

impl MergeOutcome {
    /// Applies the fail-fast policy: any stream error discards the partial deck.
    ///
    /// # Errors
    ///
    /// Returns the stream's terminal error if there was one.
    pub fn into_result(self) -> Result<Deck> {
        match self.error {
            Some(error) => {
                if !self.deck.is_empty() {
                    debug!(
                        "Discarding {} merged cards because the stream failed",
                        self.deck.len()
                    );
                }
                Err(error)
            }
            None => Ok(self.deck),
        }
    }
}

impl DeckMerger {
    /// Creates an idle merger holding an empty, untitled deck.
    #[must_use]
    pub fn new() -> Self {
        Self {
            deck: Deck::default(),
            state: MergeState::Idle,
            decks_merged: 0,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> MergeState {
        self.state
    }

    /// Folds one partial deck in.
    pub fn push(&mut self, partial: Deck) {
        if self.state == MergeState::Idle {
            self.deck.title = partial.title;
            self.state = MergeState::Accumulating;
        }

        self.deck.extend_cards(partial.cards);
        self.decks_merged += 1;
    }

    /// Returns the merged deck.
    #[must_use]
    pub fn finish(self) -> Deck {
        self.deck
    }

    /// Drains `stream` until it ends or yields an error.
    ///
    /// Never fails on its own; a stream error is returned next to whatever was
    /// merged before it.
    pub fn merge<I>(mut self, stream: I) -> MergeOutcome
    where
        I: IntoIterator<Item = Result<Deck>>,
    {
        let mut error = None;

        for item in stream {
            match item {
                Ok(partial) => self.push(partial),
                Err(e) => {
                    error = Some(e);
                    break;
                }
            }
        }

        debug!(
            "Merged {} decks into {} cards",
            self.decks_merged,
            self.deck.len()
        );

        MergeOutcome {
            decks_merged: self.decks_merged,
            deck: self.deck,
            error,
        }
    }
}

impl Default for DeckMerger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::Flashcard;

    fn partial(title: &str, fronts: &[&str]) -> Deck {
        let mut deck = Deck::new(title);
        deck.extend_cards(fronts.iter().map(|f| Flashcard::new(*f, format!("{f}-back"))));
        deck
    }

    #[test]
    fn test_first_title_wins_and_cards_concatenate() {
        let outcome = DeckMerger::new().merge(vec![
            Ok(partial("T1", &["c1"])),
            Ok(partial("T2", &["c2"])),
        ]);

        assert!(outcome.error.is_none());
        assert_eq!(outcome.decks_merged, 2);
        assert_eq!(outcome.deck.title, "T1");
        let fronts: Vec<&str> = outcome.deck.cards.iter().map(|c| c.front.as_str()).collect();
        assert_eq!(fronts, vec!["c1", "c2"]);
    }

    #[test]
    fn test_cards_are_exact_concatenation() {
        let partials = vec![
            partial("A", &["1", "2"]),
            partial("B", &[]),
            partial("C", &["3"]),
            partial("D", &["4", "5", "6"]),
        ];
        let expected: Vec<Flashcard> = partials.iter().flat_map(|d| d.cards.clone()).collect();

        let deck = DeckMerger::new()
            .merge(partials.into_iter().map(Ok))
            .into_result()
            .unwrap();

        assert_eq!(deck.cards, expected);
    }

    #[test]
    fn test_empty_stream_yields_empty_deck() {
        let outcome = DeckMerger::new().merge(Vec::new());

        assert_eq!(outcome.decks_merged, 0);
        assert_eq!(outcome.deck, Deck::default());
        assert!(outcome.into_result().unwrap().title.is_empty());
    }

    #[test]
    fn test_empty_first_title_is_still_adopted() {
        let outcome = DeckMerger::new().merge(vec![Ok(partial("", &["a"])), Ok(partial("Later", &["b"]))]);
        assert_eq!(outcome.deck.title, "");
    }

    #[test]
    fn test_error_keeps_partial_deck_in_outcome() {
        let outcome = DeckMerger::new().merge(vec![
            Ok(partial("T1", &["c1"])),
            Err(Error::in_chunk(1, Error::invocation("boom"))),
        ]);

        assert_eq!(outcome.deck.cards.len(), 1);
        assert!(outcome.error.is_some());
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn test_state_transitions() {
        let mut merger = DeckMerger::new();
        assert_eq!(merger.state(), MergeState::Idle);

        merger.push(partial("T1", &["a"]));
        assert_eq!(merger.state(), MergeState::Accumulating);

        merger.push(partial("T2", &["b"]));
        assert_eq!(merger.state(), MergeState::Accumulating);

        let deck = merger.finish();
        assert_eq!(deck.title, "T1");
        assert_eq!(deck.len(), 2);
    }
}
