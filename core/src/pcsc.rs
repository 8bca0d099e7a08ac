//! PC/SC support for cardshare.
//! Can be enabled by turning `pcsc` feature on.
//!
//! ## What is PC/SC?
//! PC/SC (Personal Computer/Smart Card) is an abstraction layer for communicating with Smart Cards
//! and contactless tags. Windows and macOS supports PC/SC by themselves, Linux also supports by
//! installing pcsc-lite shared library. Most USB NFC readers (ACR122U and friends) are exposed
//! through it, and report ISO 14443-4 tags as cards.
//!
//! Refer the documentation of pcsc-rust for details:
//! <https://github.com/bluetech/pcsc-rust>
//!
//! ## Usage
//! ```rust,no_run
//! # async fn run() -> cardshare::reader::Result<()> {
//! use cardshare::pcsc::PcscReader;
//! use cardshare::Reader;
//!
//! let reader = PcscReader::default();
//! reader.start().await?;
//!
//! if let Some(tag) = reader.detect_peer().await? {
//!     let message = reader.read().await?;
//!     println!("{}: {} octets", tag, message.len());
//! }
//!
//! reader.cancel_active_request().await?;
//! # Ok(())
//! # }
//! ```

use std::ffi::{CStr, CString};

use async_trait::async_trait;
use parking_lot::Mutex;
use pcsc::{Card, Disposition, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};

use crate::reader::{self, Reader, Tag};
use crate::trace::{debug, info, warn};
use crate::type4::{Command, HandlerInCtx, Response, Type4Tag};

/// GET DATA for the UID of a contactless card (PC/SC part 3 pseudo-APDU).
const GET_UID: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];
const SW_OK: [u8; 2] = [0x90, 0x00];
const SW_NO_DIAGNOSIS: [u8; 2] = [0x6F, 0x00];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error occurred while communicating with PC/SC: {0}")]
    PcscError(#[from] pcsc::Error),

    #[error("Reader not found on PC/SC service")]
    ReaderNotFound,
}

impl From<Error> for reader::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::ReaderNotFound
            | Error::PcscError(pcsc::Error::NoReadersAvailable)
            | Error::PcscError(pcsc::Error::NoService) => reader::Error::NotSupported(e.to_string()),
            _ => reader::Error::Other(Box::new(e)),
        }
    }
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// PC/SC context.
pub struct Context {
    ctx: pcsc::Context,
}

impl Context {
    /// Creates a PC/SC context in user scope.
    pub fn try_new() -> Result<Self> {
        Ok(Self {
            ctx: pcsc::Context::establish(Scope::User)?,
        })
    }

    /// Finds the first PC/SC device.
    pub fn open(&self) -> Result<Device> {
        let mut buf = [0u8; 2048];

        Ok(Device::new(
            self.ctx
                .list_readers(&mut buf)?
                .next()
                .ok_or(Error::ReaderNotFound)?,
        ))
    }
}

/// PC/SC device handle.
pub struct Device {
    reader: CString,
}

impl Device {
    fn new(reader: &CStr) -> Self {
        debug!("Using device: {}", reader.to_str().unwrap_or_default());

        Self {
            reader: reader.to_owned(),
        }
    }

    pub fn name(&self) -> &CStr {
        &self.reader
    }

    /// Connects to the card on the device, if any is in range.
    pub fn try_connect(&self, ctx: &Context) -> Result<Option<PcscCard>> {
        match ctx
            .ctx
            .connect(&self.reader, ShareMode::Shared, Protocols::ANY)
        {
            Ok(card) => {
                debug!("Connected to the tag");

                Ok(Some(PcscCard::new(card)))
            }
            Err(pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard) => Ok(None),
            Err(e) => Err(Error::PcscError(e)),
        }
    }
}

/// A card to be communicated through PC/SC.
pub struct PcscCard {
    card: Card,
}

impl PcscCard {
    fn new(card: Card) -> Self {
        Self { card }
    }

    /// Transmits an APDU command to the card, then receives a response from them.
    pub fn transmit(&self, tx: &[u8]) -> Result<Vec<u8>> {
        debug!("TX: {}", hex::encode(tx));

        let mut rx = [0u8; MAX_BUFFER_SIZE];
        let rx = self.card.transmit(tx, &mut rx)?;

        debug!("RX: {}", hex::encode(rx));

        Ok(Vec::from(rx))
    }

    /// Reads the UID of the card. Readers that do not support it yield an empty UID.
    pub fn uid(&self) -> Result<Vec<u8>> {
        let rx = self.transmit(&GET_UID)?;

        Ok(match rx.split_at(rx.len().saturating_sub(2)) {
            (uid, sw) if sw == SW_OK => uid.to_vec(),
            _ => Vec::new(),
        })
    }

    fn disconnect(self) {
        if let Err((_, e)) = self.card.disconnect(Disposition::LeaveCard) {
            warn!("Failed to disconnect from the tag: {}", e);
        }
    }
}

type Ctx = ();

impl HandlerInCtx<Ctx> for PcscCard {
    fn handle_in_ctx(&self, _: Ctx, command: Command) -> Response {
        let tx = Vec::from(command);
        let rx = match self.transmit(&tx) {
            Ok(rx) => rx,
            Err(e) => {
                warn!("{}", e);
                SW_NO_DIAGNOSIS.to_vec()
            }
        };

        rx.into()
    }
}

struct Session {
    ctx: Context,
    device: Device,
    card: Option<PcscCard>,
}

/// A [`Reader`] over the first PC/SC device, writing to Type 4 tags.
///
/// The PC/SC calls are short and synchronous; they run on the calling task.
#[derive(Default)]
pub struct PcscReader {
    session: Mutex<Option<Session>>,
}

#[async_trait]
impl Reader for PcscReader {
    async fn start(&self) -> reader::Result<()> {
        let mut session = self.session.lock();
        if session.is_some() {
            return Err(reader::Error::Other("a PC/SC session is already open".into()));
        }

        let ctx = Context::try_new()?;
        let device = ctx.open()?;
        info!("Waiting for a tag on {}", device.name().to_string_lossy());

        *session = Some(Session {
            ctx,
            device,
            card: None,
        });

        Ok(())
    }

    async fn cancel_active_request(&self) -> reader::Result<()> {
        let session = self.session.lock().take();

        if let Some(Session { card: Some(card), .. }) = session {
            card.disconnect();
        }

        Ok(())
    }

    async fn detect_peer(&self) -> reader::Result<Option<Tag>> {
        let mut session = self.session.lock();
        let session = session.as_mut().ok_or(reader::Error::NotStarted)?;

        if session.card.is_none() {
            session.card = session.device.try_connect(&session.ctx)?;
        }

        match &session.card {
            Some(card) => Ok(Some(Tag::new(card.uid()?))),
            None => Ok(None),
        }
    }

    async fn transmit(&self, message: &[u8]) -> reader::Result<()> {
        let session = self.session.lock();
        let card = session
            .as_ref()
            .and_then(|session| session.card.as_ref())
            .ok_or(reader::Error::NoTag)?;

        let tag = Type4Tag::open(card)?;
        debug!(
            "Writing {} octets to a tag holding {} octets at most",
            message.len(),
            tag.capability_container().capacity(),
        );

        tag.write_ndef(message)?;

        Ok(())
    }

    async fn read(&self) -> reader::Result<Vec<u8>> {
        let session = self.session.lock();
        let card = session
            .as_ref()
            .and_then(|session| session.card.as_ref())
            .ok_or(reader::Error::NoTag)?;

        Ok(Type4Tag::open(card)?.read_ndef()?)
    }
}
