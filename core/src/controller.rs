//! The exchange session controller.
//!
//! The controller is the sole owner of the [`Reader`]. Its session moves through
//! `Idle → Starting → Listening → Writing → Idle`, and is released on every way out of a
//! write, successful or not. Hiding the share screen calls [`ExchangeController::deactivate`],
//! which cancels whatever is in flight through the session's cancellation token.
//!
//! All methods take `&self`, so the host may hide the screen while a write is suspended.
//! The session state sits behind a mutex that is never held across an `.await`.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::reader::{Reader, Tag};
use crate::trace::{debug, info, warn};
use crate::{ndef, Card, Config, Error, Result};

/// The screen hosting the controller.
pub trait Host: Send + Sync {
    /// A tag came in range; the host should prompt the user to choose a card.
    fn on_peer_detected(&self, _tag: &Tag) {}

    /// The card was written to the tag.
    fn on_card_selected(&self, card: &Card);

    /// The share screen should close.
    fn on_close(&self);

    /// Shows a blocking notification about the error.
    fn alert(&self, error: &Error);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Starting,
    Listening,
    Writing,
    Reading,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared(Card),

    /// The session was deactivated before the write completed.
    Cancelled,
}

struct Session {
    state: State,
    generation: u64,
    token: CancellationToken,
    peer: Option<Tag>,
    selection: Option<Card>,
}

pub struct ExchangeController<R, H>
where
    R: Reader,
    H: Host,
{
    reader: R,
    host: H,
    config: Config,
    session: Mutex<Session>,
}

impl<R, H> ExchangeController<R, H>
where
    R: Reader,
    H: Host,
{
    /// Creates an idle controller owning the reader.
    pub fn new(reader: R, host: H, config: Config) -> Self {
        Self {
            reader,
            host,
            config,
            session: Mutex::new(Session {
                state: State::Idle,
                generation: 0,
                token: CancellationToken::new(),
                peer: None,
                selection: None,
            }),
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Current state of the session.
    pub fn state(&self) -> State {
        self.session.lock().state
    }

    /// The tag detected in the current session, if any.
    pub fn peer(&self) -> Option<Tag> {
        self.session.lock().peer.clone()
    }

    /// The card chosen to be shared, if any.
    pub fn selection(&self) -> Option<Card> {
        self.session.lock().selection.clone()
    }

    /// Chooses the card to share. No other side effect.
    pub fn select(&self, card: Card) {
        debug!("Selected card {}", card.id);

        self.session.lock().selection = Some(card);
    }

    /// Starts a reader session. Rejected unless idle.
    pub async fn activate(&self) -> Result<()> {
        let (generation, token) = {
            let mut session = self.session.lock();
            match session.state {
                State::Idle => {
                    session.state = State::Starting;
                    session.generation += 1;
                    session.token = CancellationToken::new();
                    session.peer = None;

                    Some((session.generation, session.token.clone()))
                }
                _ => None,
            }
        }
        .ok_or_else(|| self.report(Error::SessionStartFailed("already active".to_owned())))?;

        info!("Starting NFC session #{}", generation);

        let started = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(()),
            started = self.reader.start() => started,
        };

        if let Err(e) = started {
            self.release(generation).await;

            return Err(self.report(Error::SessionStartFailed(e.to_string())));
        }

        {
            let mut session = self.session.lock();
            if session.generation == generation && session.state == State::Starting {
                session.state = State::Listening;
            }
        }

        debug!("NFC session #{} is listening", generation);

        Ok(())
    }

    /// Waits until a tag comes in range, polling the reader.
    /// Returns `None` when the session was deactivated meanwhile.
    pub async fn wait_for_peer(&self) -> Result<Option<Tag>> {
        let (generation, token, peer) = {
            let session = self.session.lock();
            match session.state {
                State::Listening => Ok((
                    session.generation,
                    session.token.clone(),
                    session.peer.clone(),
                )),
                _ => Err(Error::SessionInactive),
            }
        }
        .map_err(|e| self.report(e))?;

        if peer.is_some() {
            return Ok(peer);
        }

        let poll = async {
            loop {
                match self.reader.detect_peer().await {
                    Ok(Some(tag)) => return Ok(tag),
                    Ok(None) => tokio::time::sleep(self.config.poll_interval).await,
                    Err(e) => return Err(e),
                }
            }
        };

        let detected = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(None),
            detected = tokio::time::timeout(self.config.peer_timeout, poll) => detected,
        };

        let error = match detected {
            Ok(Ok(tag)) => {
                {
                    let mut session = self.session.lock();
                    if session.generation != generation || session.state != State::Listening {
                        return Ok(None);
                    }

                    session.peer = Some(tag.clone());
                }

                info!("Detected tag {}", tag);
                self.host.on_peer_detected(&tag);

                return Ok(Some(tag));
            }
            Ok(Err(e)) => Error::PeerDetectionFailed(e.to_string()),
            Err(_) => Error::SessionTimeout,
        };

        self.release(generation).await;

        Err(self.report(error))
    }

    /// Writes the selected card to the detected tag, then releases the session.
    /// On success the host is notified and asked to close.
    pub async fn share(&self) -> Result<ShareOutcome> {
        let card = self
            .selection()
            .ok_or(Error::SelectionRequired)
            .map_err(|e| self.report(e))?;

        let (generation, token) = self.begin(State::Writing).map_err(|e| self.report(e))?;

        let written = tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("Sharing card {} was cancelled", card.id);

                return Ok(ShareOutcome::Cancelled);
            }
            written = self.write_card(&card) => written,
        };

        self.release(generation).await;

        match written {
            Ok(()) => {
                info!("Shared card {}", card.id);

                self.session.lock().selection = None;
                self.host.on_card_selected(&card);
                self.host.on_close();

                Ok(ShareOutcome::Shared(card))
            }
            Err(e) => Err(self.report(e)),
        }
    }

    /// Reads a card from the detected tag, then releases the session.
    /// Returns `None` when the session was deactivated meanwhile.
    pub async fn receive(&self) -> Result<Option<Card>> {
        let (generation, token) = self.begin(State::Reading).map_err(|e| self.report(e))?;

        let read = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(None),
            read = self.read_card() => read,
        };

        self.release(generation).await;

        match read {
            Ok(card) => {
                info!("Received card {}", card.id);

                Ok(Some(card))
            }
            Err(e) => Err(self.report(e)),
        }
    }

    /// Cancels the session from any state. Safe to call when idle.
    pub async fn deactivate(&self) {
        let held = {
            let mut session = self.session.lock();
            let held = session.state != State::Idle;

            session.state = State::Idle;
            session.peer = None;
            session.selection = None;
            session.token.cancel();

            held
        };

        if held {
            info!("Cancelling NFC session");
            self.cancel_reader().await;
        }
    }

    fn begin(&self, next: State) -> Result<(u64, CancellationToken)> {
        let mut session = self.session.lock();

        if session.state != State::Listening {
            return Err(Error::SessionInactive);
        }
        if session.peer.is_none() {
            return Err(Error::PeerNotDetected);
        }

        session.state = next;

        Ok((session.generation, session.token.clone()))
    }

    async fn write_card(&self, card: &Card) -> Result<()> {
        let payload = card
            .to_payload()
            .map_err(|e| Error::EncodeFailed(e.to_string()))?;
        let message = ndef::encode_text_record(&self.config.language, &payload)
            .map_err(|e| Error::EncodeFailed(e.to_string()))?;

        debug!("Writing {} octets: {}", message.len(), hex::encode(&message));

        self.reader
            .transmit(&message)
            .await
            .map_err(|e| Error::WriteFailed(e.to_string()))
    }

    async fn read_card(&self) -> Result<Card> {
        let message = self
            .reader
            .read()
            .await
            .map_err(|e| Error::ReadFailed(e.to_string()))?;

        debug!("Read {} octets: {}", message.len(), hex::encode(&message));

        let text = ndef::decode_text_record(&message)
            .map_err(|e| Error::DecodeFailed(e.to_string()))?;

        Card::from_payload(&text.text).map_err(|e| Error::DecodeFailed(e.to_string()))
    }

    /// Releases the session if it is still the one of `generation`.
    async fn release(&self, generation: u64) {
        let held = {
            let mut session = self.session.lock();
            match session.generation == generation && session.state != State::Idle {
                true => {
                    session.state = State::Idle;
                    session.peer = None;
                    session.token.cancel();
                    true
                }
                _ => false,
            }
        };

        if held {
            debug!("Releasing NFC session #{}", generation);
            self.cancel_reader().await;
        }
    }

    async fn cancel_reader(&self) {
        if let Err(e) = self.reader.cancel_active_request().await {
            warn!("Failed to release the reader: {}", e);
        }
    }

    fn report(&self, error: Error) -> Error {
        warn!("{}", error);
        self.host.alert(&error);

        error
    }
}
