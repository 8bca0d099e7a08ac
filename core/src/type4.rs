//! NFC Forum Type 4 Tag access through an APDU delegate.
//!
//! A Type 4 tag exposes the NDEF Tag Application, holding a capability container (CC)
//! file and an NDEF file. The NDEF file starts with a 2-octet length (NLEN) followed by
//! the NDEF message itself.

pub use apdu::core::HandlerInCtx;
pub use apdu::{Command, Response};

use apdu::command;

const NDEF_AID: [u8; 7] = [0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01];
const EF_CC: [u8; 2] = [0xE1, 0x03];

const SELECT_P1_NAME: u8 = 0x04;
const SELECT_P2_NAME: u8 = 0x00;
const SELECT_P1_ID: u8 = 0x00;
const SELECT_P2_ID: u8 = 0x0C;

const UPDATE_CLA: u8 = 0x00;
const UPDATE_INS: u8 = 0xD6;

const CC_LEN: u16 = 15;
const NDEF_FILE_CONTROL_TLV: u8 = 0x04;
const ACCESS_GRANTED: u8 = 0x00;

const NLEN_SIZE: u16 = 2;
const MAX_OFFSET: u16 = 0x7FFF;
const MAX_SHORT_LENGTH: u16 = 0xFF;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("The tag returned an error: {0}")]
    Apdu(#[from] apdu::Error),

    #[error("The capability container of the tag is malformed")]
    InvalidCapabilityContainer,

    #[error("The NDEF file is not readable")]
    NotReadable,

    #[error("The NDEF file is read-only")]
    ReadOnly,

    #[error("The message needs {required} octets but the tag holds {available} octets at most")]
    Capacity { required: usize, available: usize },

    #[error("The tag returned no data at offset {0}")]
    ShortRead(u16),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Parsed capability container of the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityContainer {
    /// Maximum octets a READ BINARY may return.
    pub max_le: u16,

    /// Maximum octets an UPDATE BINARY may carry.
    pub max_lc: u16,

    pub file_id: [u8; 2],
    pub max_size: u16,
    pub read_access: u8,
    pub write_access: u8,
}

impl CapabilityContainer {
    /// Parses the CC file, rejecting zero chunk sizes and files too small for NLEN.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        match buf {
            [_, _, _, le_hi, le_lo, lc_hi, lc_lo, NDEF_FILE_CONTROL_TLV, tlv_len, id_hi, id_lo, size_hi, size_lo, read_access, write_access, ..]
                if *tlv_len >= 6 =>
            {
                let cc = Self {
                    max_le: u16::from_be_bytes([*le_hi, *le_lo]),
                    max_lc: u16::from_be_bytes([*lc_hi, *lc_lo]),
                    file_id: [*id_hi, *id_lo],
                    max_size: u16::from_be_bytes([*size_hi, *size_lo]),
                    read_access: *read_access,
                    write_access: *write_access,
                };

                match cc.max_le == 0 || cc.max_lc == 0 || cc.max_size < NLEN_SIZE {
                    true => Err(Error::InvalidCapabilityContainer),
                    _ => Ok(cc),
                }
            }
            _ => Err(Error::InvalidCapabilityContainer),
        }
    }

    /// Largest NDEF message the tag can hold.
    pub fn capacity(&self) -> usize {
        (self.max_size.min(MAX_OFFSET) - NLEN_SIZE) as usize
    }
}

/// A Type 4 tag whose NDEF file is selected.
pub struct Type4Tag<'a, T>
where
    T: HandlerInCtx<()>,
{
    delegate: &'a T,
    cc: CapabilityContainer,
}

impl<'a, T> Type4Tag<'a, T>
where
    T: HandlerInCtx<()>,
{
    /// Selects the NDEF application, reads the CC, then selects the NDEF file.
    pub fn open(delegate: &'a T) -> Result<Self> {
        handle(delegate, command::select_file(SELECT_P1_NAME, SELECT_P2_NAME, NDEF_AID.into()))?;
        handle(delegate, command::select_file(SELECT_P1_ID, SELECT_P2_ID, EF_CC.into()))?;

        let cc = CapabilityContainer::parse(&read(delegate, 0, CC_LEN, MAX_SHORT_LENGTH)?)?;
        handle(delegate, command::select_file(SELECT_P1_ID, SELECT_P2_ID, cc.file_id.into()))?;

        Ok(Self { delegate, cc })
    }

    /// The capability container read while opening the tag.
    pub fn capability_container(&self) -> &CapabilityContainer {
        &self.cc
    }

    /// Reads the NDEF message stored in the tag.
    pub fn read_ndef(&self) -> Result<Vec<u8>> {
        if self.cc.read_access != ACCESS_GRANTED {
            return Err(Error::NotReadable);
        }

        let nlen = read(self.delegate, 0, NLEN_SIZE, self.cc.max_le)?;
        let nlen = u16::from_be_bytes([nlen[0], nlen[1]]);
        if nlen as usize > self.cc.capacity() {
            return Err(Error::Capacity {
                required: nlen as usize,
                available: self.cc.capacity(),
            });
        }

        read(self.delegate, NLEN_SIZE, nlen, self.cc.max_le)
    }

    /// Overwrites the NDEF file with the message.
    /// NLEN is zeroed while writing so a torn write leaves an empty tag, not a broken one.
    pub fn write_ndef(&self, message: &[u8]) -> Result<()> {
        if self.cc.write_access != ACCESS_GRANTED {
            return Err(Error::ReadOnly);
        }
        if message.len() > self.cc.capacity() {
            return Err(Error::Capacity {
                required: message.len(),
                available: self.cc.capacity(),
            });
        }

        let nlen = (message.len() as u16).to_be_bytes();

        self.update(0, &[0x00, 0x00])?;
        self.update(NLEN_SIZE, message)?;
        self.update(0, &nlen)
    }

    fn update(&self, offset: u16, data: &[u8]) -> Result<()> {
        let chunk = self.cc.max_lc.min(MAX_SHORT_LENGTH) as usize;
        let mut pos = offset;

        for fragment in data.chunks(chunk) {
            let [p1, p2] = pos.to_be_bytes();

            handle(
                self.delegate,
                Command::new_with_payload(UPDATE_CLA, UPDATE_INS, p1, p2, fragment.to_vec()),
            )?;

            pos += fragment.len() as u16;
        }

        Ok(())
    }
}

/// Reads `len` octets from `offset` of the selected file, `max_le` octets at a time.
fn read<T>(delegate: &T, offset: u16, len: u16, max_le: u16) -> Result<Vec<u8>>
where
    T: HandlerInCtx<()>,
{
    let mut pos = offset;
    let end = offset + len;
    let mut buf: Vec<u8> = Vec::with_capacity(len as usize);

    while pos < end {
        let [p1, p2] = pos.to_be_bytes();
        let le = (end - pos).min(max_le).min(MAX_SHORT_LENGTH) as u8;

        let mut fragment = handle(delegate, command::read_binary(p1, p2, le))?;
        if fragment.is_empty() {
            return Err(Error::ShortRead(pos));
        }

        fragment.truncate((end - pos) as usize);
        pos += fragment.len() as u16;
        buf.append(&mut fragment);
    }

    Ok(buf)
}

fn handle<T>(delegate: &T, command: impl Into<Command>) -> Result<Vec<u8>>
where
    T: HandlerInCtx<()>,
{
    let response = delegate.handle_in_ctx((), command.into());

    std::result::Result::<Vec<u8>, apdu::core::Error>::from(response).map_err(|e| Error::Apdu(e.into()))
}
