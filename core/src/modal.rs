//! The share modal: the card list, its visibility and the confirm action.
//!
//! Rendering is left to the host. The modal only keeps what the screen shows and turns
//! visibility changes into explicit controller lifecycle calls.

use parking_lot::Mutex;

use crate::controller::{ExchangeController, Host, ShareOutcome, State};
use crate::reader::Reader;
use crate::source::{Auth, CardSource, DocumentStore};
use crate::trace::debug;
use crate::{Card, Error, Result};

#[derive(Default)]
struct View {
    cards: Vec<Card>,
    mounted: bool,
    failure: Option<Error>,
    visible: bool,
}

/// The share screen, owning the controller of its reader session.
pub struct ShareModal<R, H>
where
    R: Reader,
    H: Host,
{
    controller: ExchangeController<R, H>,
    view: Mutex<View>,
}

impl<R, H> ShareModal<R, H>
where
    R: Reader,
    H: Host,
{
    /// Creates a hidden, unmounted modal.
    pub fn new(controller: ExchangeController<R, H>) -> Self {
        Self {
            controller,
            view: Mutex::new(View::default()),
        }
    }

    pub fn controller(&self) -> &ExchangeController<R, H> {
        &self.controller
    }

    /// Cards listed on the screen.
    pub fn cards(&self) -> Vec<Card> {
        self.view.lock().cards.clone()
    }

    pub fn is_visible(&self) -> bool {
        self.view.lock().visible
    }

    /// Loads the user's cards. Only the first call per modal reaches the source.
    /// A failed load leaves the list empty, and later calls return the same error.
    pub async fn mount<A, S>(&self, source: &CardSource<A, S>) -> Result<Vec<Card>>
    where
        A: Auth,
        S: DocumentStore,
    {
        {
            let mut view = self.view.lock();
            if std::mem::replace(&mut view.mounted, true) {
                return match &view.failure {
                    Some(e) => Err(e.clone()),
                    None => Ok(view.cards.clone()),
                };
            }
        }

        match source.fetch().await {
            Ok(cards) => {
                debug!("Loaded {} cards", cards.len());
                self.view.lock().cards = cards.clone();

                Ok(cards)
            }
            Err(e) => {
                self.controller.host().alert(&e);
                self.view.lock().failure = Some(e.clone());

                Err(e)
            }
        }
    }

    /// Shows or hides the modal, starting or cancelling the reader session.
    pub async fn set_visible(&self, visible: bool) -> Result<()> {
        let changed = {
            let mut view = self.view.lock();
            std::mem::replace(&mut view.visible, visible) != visible
        };

        match (changed, visible) {
            (true, true) => self.controller.activate().await,
            (true, false) => {
                self.controller.deactivate().await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Starts a new session after a failure, while the modal is still shown.
    pub async fn retry(&self) -> Result<()> {
        match self.is_visible() && self.controller.state() == State::Idle {
            true => self.controller.activate().await,
            _ => Ok(()),
        }
    }

    /// Selects the listed card with the id.
    pub fn choose(&self, id: &str) -> Option<Card> {
        let card = self.view.lock().cards.iter().find(|card| card.id == id).cloned()?;
        self.controller.select(card.clone());

        Some(card)
    }

    /// Shares the selected card, closing the modal once it is written.
    pub async fn confirm(&self) -> Result<ShareOutcome> {
        let outcome = self.controller.share().await?;

        if let ShareOutcome::Shared(_) = outcome {
            self.view.lock().visible = false;
        }

        Ok(outcome)
    }
}
