use cardshare::{Card, Error, Host, Tag};
use tracing::debug;

/// Host printing to the terminal.
pub struct ConsoleHost;

impl Host for ConsoleHost {
    fn on_peer_detected(&self, tag: &Tag) {
        eprintln!("Tag {} detected. Choose a card to share.", tag);
    }

    fn on_card_selected(&self, card: &Card) {
        eprintln!("Shared {}.", card.full_name());
    }

    fn on_close(&self) {
        debug!("Share screen closed");
    }

    fn alert(&self, error: &Error) {
        eprintln!("Error: {}", error);
    }
}
