//! Fakes shared by the unit tests.

use std::cell::RefCell;
use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::reader::{self, Reader, Tag};
use crate::source::{Auth, BoxError, Document, DocumentStore};
use crate::type4::{Command, HandlerInCtx, Response};
use crate::{Card, CardType, Error, Host};

pub fn ann() -> Card {
    Card {
        id: "1".to_owned(),
        first_name: "Ann".to_owned(),
        last_name: "Lee".to_owned(),
        card_type: CardType::Work,
        phone: "555-1".to_owned(),
        work_phone: None,
    }
}

#[derive(Default)]
struct MockState {
    active: bool,
    overlapped: bool,
    starts: usize,
    cancels: usize,
    polls: usize,
    tag_after: Option<usize>,
    fail_start: bool,
    fail_detect: bool,
    fail_transmit: bool,
    fail_read: bool,
    hang_start: bool,
    hang_transmit: bool,
    hang_read: bool,
    transmitted: Vec<Vec<u8>>,
    stored: Option<Vec<u8>>,
}

/// A reader whose tag shows up after a number of polls.
#[derive(Default)]
pub struct MockReader {
    state: Mutex<MockState>,
}

impl MockReader {
    pub fn tag() -> Tag {
        Tag::new(vec![0x04, 0xA2, 0x2C, 0x7B])
    }

    /// The tag is detected on the poll after `polls` empty ones.
    pub fn with_tag_after(self, polls: usize) -> Self {
        self.state.lock().tag_after = Some(polls);
        self
    }

    pub fn with_stored(self, message: Vec<u8>) -> Self {
        self.state.lock().stored = Some(message);
        self
    }

    pub fn failing_start(self) -> Self {
        self.state.lock().fail_start = true;
        self
    }

    pub fn failing_detect(self) -> Self {
        self.state.lock().fail_detect = true;
        self
    }

    pub fn failing_read(self) -> Self {
        self.state.lock().fail_read = true;
        self
    }

    /// The next `start` never completes; later ones do.
    pub fn hanging_start(self) -> Self {
        self.state.lock().hang_start = true;
        self
    }

    pub fn hanging_read(self) -> Self {
        self.state.lock().hang_read = true;
        self
    }

    pub fn failing_transmit(self) -> Self {
        self.state.lock().fail_transmit = true;
        self
    }

    pub fn hanging_transmit(self) -> Self {
        self.state.lock().hang_transmit = true;
        self
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Whether a session was ever started while another was active.
    pub fn overlapped(&self) -> bool {
        self.state.lock().overlapped
    }

    pub fn starts(&self) -> usize {
        self.state.lock().starts
    }

    pub fn cancels(&self) -> usize {
        self.state.lock().cancels
    }

    pub fn polls(&self) -> usize {
        self.state.lock().polls
    }

    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        self.state.lock().transmitted.clone()
    }
}

#[async_trait]
impl Reader for MockReader {
    async fn start(&self) -> reader::Result<()> {
        let hang = {
            let mut state = self.state.lock();
            if state.fail_start {
                return Err(reader::Error::PermissionDenied);
            }

            state.starts += 1;
            std::mem::take(&mut state.hang_start)
        };

        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock();
        let active = state.active;
        state.overlapped |= active;
        state.active = true;

        Ok(())
    }

    async fn cancel_active_request(&self) -> reader::Result<()> {
        let mut state = self.state.lock();
        state.active = false;
        state.cancels += 1;

        Ok(())
    }

    async fn detect_peer(&self) -> reader::Result<Option<Tag>> {
        let mut state = self.state.lock();
        if !state.active {
            return Err(reader::Error::NotStarted);
        }
        if state.fail_detect {
            return Err(reader::Error::Other("reader was unplugged".into()));
        }

        state.polls += 1;

        Ok(match state.tag_after {
            Some(after) if state.polls > after => Some(Self::tag()),
            _ => None,
        })
    }

    async fn transmit(&self, message: &[u8]) -> reader::Result<()> {
        let hang = self.state.lock().hang_transmit;
        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock();
        if state.fail_transmit {
            return Err(reader::Error::Other("tag was lost".into()));
        }

        state.transmitted.push(message.to_vec());
        state.stored = Some(message.to_vec());

        Ok(())
    }

    async fn read(&self) -> reader::Result<Vec<u8>> {
        let hang = self.state.lock().hang_read;
        if hang {
            std::future::pending::<()>().await;
        }

        let state = self.state.lock();
        if state.fail_read {
            return Err(reader::Error::Other("tag was lost".into()));
        }

        state.stored.clone().ok_or(reader::Error::NoTag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    PeerDetected(Tag),
    CardSelected(Card),
    Closed,
    Alert(Error),
}

#[derive(Default)]
pub struct RecordingHost {
    events: Mutex<Vec<Event>>,
}

impl RecordingHost {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn alerts(&self) -> Vec<Error> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Alert(error) => Some(error),
                _ => None,
            })
            .collect()
    }
}

impl Host for RecordingHost {
    fn on_peer_detected(&self, tag: &Tag) {
        self.events.lock().push(Event::PeerDetected(tag.clone()));
    }

    fn on_card_selected(&self, card: &Card) {
        self.events.lock().push(Event::CardSelected(card.clone()));
    }

    fn on_close(&self) {
        self.events.lock().push(Event::Closed);
    }

    fn alert(&self, error: &Error) {
        self.events.lock().push(Event::Alert(error.clone()));
    }
}

pub struct StaticAuth(Option<String>);

impl StaticAuth {
    pub fn signed_in(uid: &str) -> Self {
        Self(Some(uid.to_owned()))
    }

    pub fn signed_out() -> Self {
        Self(None)
    }
}

impl Auth for StaticAuth {
    fn current_user(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<Document>>,
    offline: bool,
    lists: Mutex<usize>,
}

impl MemoryStore {
    pub fn unavailable() -> Self {
        Self {
            offline: true,
            ..Default::default()
        }
    }

    pub fn with(mut self, path: &str, documents: Vec<Document>) -> Self {
        self.collections.insert(path.to_owned(), documents);
        self
    }

    /// Number of times a collection was listed.
    pub fn lists(&self) -> usize {
        *self.lists.lock()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_documents(&self, path: &str) -> Result<Vec<Document>, BoxError> {
        *self.lists.lock() += 1;

        if self.offline {
            return Err("store is offline".into());
        }

        Ok(self.collections.get(path).cloned().unwrap_or_default())
    }
}

const SW_OK: [u8; 2] = [0x90, 0x00];
const SW_NOT_FOUND: [u8; 2] = [0x6A, 0x82];
const SW_WRONG_OFFSET: [u8; 2] = [0x6B, 0x00];
const SW_NOT_SUPPORTED: [u8; 2] = [0x6D, 0x00];
const SW_NO_FILE: [u8; 2] = [0x69, 0x86];

const NDEF_AID: [u8; 7] = [0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01];
const NDEF_FILE: [u8; 2] = [0xE1, 0x04];

/// An in-memory Type 4 tag answering APDUs.
pub struct MemoryTag {
    application: bool,
    files: RefCell<HashMap<[u8; 2], Vec<u8>>>,
    selected: RefCell<Option<[u8; 2]>>,
    commands: RefCell<Vec<Vec<u8>>>,
}

impl MemoryTag {
    pub fn capability_container(max_le: u16, max_lc: u16, max_size: u16, write: u8) -> Vec<u8> {
        let mut cc = vec![0x00, 0x0F, 0x20];
        cc.extend_from_slice(&max_le.to_be_bytes());
        cc.extend_from_slice(&max_lc.to_be_bytes());
        cc.extend_from_slice(&[0x04, 0x06]);
        cc.extend_from_slice(&NDEF_FILE);
        cc.extend_from_slice(&max_size.to_be_bytes());
        cc.extend_from_slice(&[0x00, write]);
        cc
    }

    pub fn new(max_le: u16, max_lc: u16, max_size: u16, write: u8) -> Self {
        let mut files = HashMap::new();
        files.insert(
            [0xE1, 0x03],
            Self::capability_container(max_le, max_lc, max_size, write),
        );
        files.insert(NDEF_FILE, vec![0x00; max_size as usize]);

        Self {
            application: true,
            files: RefCell::new(files),
            selected: RefCell::new(None),
            commands: RefCell::new(Vec::new()),
        }
    }

    pub fn without_application() -> Self {
        Self {
            application: false,
            ..Self::new(0x10, 0x08, 0x0100, 0x00)
        }
    }

    pub fn ndef_file(&self) -> Vec<u8> {
        self.files.borrow()[&NDEF_FILE].clone()
    }

    pub fn commands(&self) -> Vec<Vec<u8>> {
        self.commands.borrow().clone()
    }

    fn process(&self, apdu: &[u8]) -> Vec<u8> {
        match apdu {
            [_, 0xA4, 0x04, _, lc, rest @ ..] if rest.len() >= *lc as usize => {
                let aid = &rest[..*lc as usize];
                match self.application && aid == NDEF_AID {
                    true => SW_OK.to_vec(),
                    _ => SW_NOT_FOUND.to_vec(),
                }
            }
            [_, 0xA4, 0x00, _, 0x02, hi, lo, ..] => {
                let id = [*hi, *lo];
                match self.application && self.files.borrow().contains_key(&id) {
                    true => {
                        *self.selected.borrow_mut() = Some(id);
                        SW_OK.to_vec()
                    }
                    _ => SW_NOT_FOUND.to_vec(),
                }
            }
            [_, 0xB0, p1, p2, le, ..] => {
                let Some(id) = *self.selected.borrow() else {
                    return SW_NO_FILE.to_vec();
                };
                let files = self.files.borrow();
                let file = &files[&id];
                let offset = u16::from_be_bytes([*p1, *p2]) as usize;
                if offset > file.len() {
                    return SW_WRONG_OFFSET.to_vec();
                }

                let end = (offset + *le as usize).min(file.len());
                let mut response = file[offset..end].to_vec();
                response.extend_from_slice(&SW_OK);
                response
            }
            [_, 0xD6, p1, p2, lc, data @ ..] if data.len() >= *lc as usize => {
                let Some(id) = *self.selected.borrow() else {
                    return SW_NO_FILE.to_vec();
                };
                let mut files = self.files.borrow_mut();
                let file = files.entry(id).or_default();
                let offset = u16::from_be_bytes([*p1, *p2]) as usize;
                let end = offset + *lc as usize;
                if end > file.len() {
                    return SW_WRONG_OFFSET.to_vec();
                }

                file[offset..end].copy_from_slice(&data[..*lc as usize]);
                SW_OK.to_vec()
            }
            _ => SW_NOT_SUPPORTED.to_vec(),
        }
    }
}

impl HandlerInCtx<()> for MemoryTag {
    fn handle_in_ctx(&self, _: (), command: Command) -> Response {
        let apdu = Vec::from(command);
        self.commands.borrow_mut().push(apdu.clone());

        self.process(&apdu).into()
    }
}
