//! NDEF (NFC Data Exchange Format) messages and text records.
//!
//! Only what sharing a card needs is supported: messages of unchunked records, and the
//! well-known Text record type (RTD-Text). Records are always written in UTF-8, and may be
//! read in either UTF-8 or UTF-16.

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

const TEXT_TYPE: &[u8] = b"T";
const TEXT_STATUS_UTF16: u8 = 0x80;
const TEXT_LANGUAGE_MASK: u8 = 0x3F;

const BOM_BE: [u8; 2] = [0xFE, 0xFF];
const BOM_LE: [u8; 2] = [0xFF, 0xFE];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Unexpected end of the message at offset {0}")]
    Truncated(usize),

    #[error("Trailing octets after the last record at offset {0}")]
    TrailingData(usize),

    #[error("A message must contain at least one record")]
    Empty,

    #[error("Chunked records are not supported")]
    Chunked,

    #[error("Language code must be 1 to 63 octets long, got {0}")]
    InvalidLanguage(usize),

    #[error("Field is too large to encode: {0} octets")]
    TooLarge(usize),

    #[error("The record is not a text record")]
    NotText,

    #[error("The text is not valid {0}")]
    InvalidText(&'static str),

    #[error("No text record found in the message")]
    NoTextRecord,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Type Name Format: how the type field of the record is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tnf {
    Empty,
    WellKnown,
    Media,
    AbsoluteUri,
    External,
    Unknown,
    Unchanged,
    Reserved,
}

impl From<u8> for Tnf {
    fn from(value: u8) -> Self {
        use Tnf::*;

        match value & TNF_MASK {
            0x00 => Empty,
            0x01 => WellKnown,
            0x02 => Media,
            0x03 => AbsoluteUri,
            0x04 => External,
            0x05 => Unknown,
            0x06 => Unchanged,
            _ => Reserved,
        }
    }
}

impl From<Tnf> for u8 {
    fn from(tnf: Tnf) -> Self {
        tnf as u8
    }
}

/// Decoded content of a text record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub language: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub tnf: Tnf,
    pub record_type: Vec<u8>,
    pub id: Vec<u8>,
    pub payload: Vec<u8>,
}

impl Record {
    /// Builds a well-known text record, encoded in UTF-8.
    pub fn text(language: &str, text: &str) -> Result<Self> {
        let language = language.as_bytes();
        if language.is_empty() || language.len() > TEXT_LANGUAGE_MASK as usize {
            return Err(Error::InvalidLanguage(language.len()));
        }

        let mut payload = Vec::with_capacity(1 + language.len() + text.len());
        payload.push(language.len() as u8);
        payload.extend_from_slice(language);
        payload.extend_from_slice(text.as_bytes());

        Ok(Self {
            tnf: Tnf::WellKnown,
            record_type: TEXT_TYPE.to_vec(),
            id: Vec::new(),
            payload,
        })
    }

    /// Whether the record is a well-known text record.
    pub fn is_text(&self) -> bool {
        self.tnf == Tnf::WellKnown && self.record_type == TEXT_TYPE
    }

    /// Decodes the payload of a text record.
    pub fn to_text(&self) -> Result<Text> {
        if !self.is_text() {
            return Err(Error::NotText);
        }

        let mut reader = Reader::new(&self.payload);
        let status = reader.next()?;
        let language = reader.read((status & TEXT_LANGUAGE_MASK) as usize)?;
        let body = reader.rest();

        let language = std::str::from_utf8(language)
            .map_err(|_| Error::InvalidText("UTF-8"))?
            .to_owned();

        let text = match status & TEXT_STATUS_UTF16 {
            0 => String::from_utf8(body.to_vec()).map_err(|_| Error::InvalidText("UTF-8"))?,
            _ => decode_utf16(body)?,
        };

        Ok(Text { language, text })
    }

    fn write(&self, buf: &mut Vec<u8>, first: bool, last: bool) -> Result<()> {
        if self.record_type.len() > u8::MAX as usize {
            return Err(Error::TooLarge(self.record_type.len()));
        }
        if self.id.len() > u8::MAX as usize {
            return Err(Error::TooLarge(self.id.len()));
        }

        let short = self.payload.len() <= u8::MAX as usize;
        let payload_len =
            u32::try_from(self.payload.len()).map_err(|_| Error::TooLarge(self.payload.len()))?;

        let mut header = u8::from(self.tnf);
        if first {
            header |= FLAG_MB;
        }
        if last {
            header |= FLAG_ME;
        }
        if short {
            header |= FLAG_SR;
        }
        if !self.id.is_empty() {
            header |= FLAG_IL;
        }

        buf.push(header);
        buf.push(self.record_type.len() as u8);

        match short {
            true => buf.push(payload_len as u8),
            _ => buf.extend_from_slice(&payload_len.to_be_bytes()),
        }

        if !self.id.is_empty() {
            buf.push(self.id.len() as u8);
        }

        buf.extend_from_slice(&self.record_type);
        buf.extend_from_slice(&self.id);
        buf.extend_from_slice(&self.payload);

        Ok(())
    }
}

/// An NDEF message, a sequence of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub records: Vec<Record>,
}

impl Message {
    /// Creates a message of the records, in order.
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Serializes the message, flagging the first and the last record.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.records.is_empty() {
            return Err(Error::Empty);
        }

        let mut buf = Vec::new();
        let last = self.records.len() - 1;

        for (i, record) in self.records.iter().enumerate() {
            record.write(&mut buf, i == 0, i == last)?;
        }

        Ok(buf)
    }

    /// Parses a message up to the record flagged as the last one.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let mut records = Vec::new();

        loop {
            let header = reader.next()?;
            if header & FLAG_CF != 0 {
                return Err(Error::Chunked);
            }

            let type_len = reader.next()? as usize;
            let payload_len = match header & FLAG_SR {
                0 => {
                    let octets = reader.read(4)?;
                    u32::from_be_bytes([octets[0], octets[1], octets[2], octets[3]]) as usize
                }
                _ => reader.next()? as usize,
            };
            let id_len = match header & FLAG_IL {
                0 => 0,
                _ => reader.next()? as usize,
            };

            records.push(Record {
                tnf: Tnf::from(header),
                record_type: reader.read(type_len)?.to_vec(),
                id: reader.read(id_len)?.to_vec(),
                payload: reader.read(payload_len)?.to_vec(),
            });

            if header & FLAG_ME != 0 {
                break;
            }
        }

        if !reader.is_empty() {
            return Err(Error::TrailingData(reader.cursor));
        }

        Ok(Self { records })
    }

    /// Decodes the first text record in the message.
    pub fn first_text(&self) -> Result<Text> {
        self.records
            .iter()
            .find(|record| record.is_text())
            .ok_or(Error::NoTextRecord)
            .and_then(Record::to_text)
    }
}

/// Encodes the text as a message of exactly one text record.
pub fn encode_text_record(language: &str, text: &str) -> Result<Vec<u8>> {
    Message::new(vec![Record::text(language, text)?]).to_bytes()
}

/// Decodes the first text record of the message.
pub fn decode_text_record(bytes: &[u8]) -> Result<Text> {
    Message::parse(bytes)?.first_text()
}

fn decode_utf16(bytes: &[u8]) -> Result<String> {
    let (body, little_endian) = match bytes {
        [a, b, rest @ ..] if [*a, *b] == BOM_BE => (rest, false),
        [a, b, rest @ ..] if [*a, *b] == BOM_LE => (rest, true),
        _ => (bytes, false),
    };

    if body.len() % 2 != 0 {
        return Err(Error::InvalidText("UTF-16"));
    }

    let units = body
        .chunks_exact(2)
        .map(|pair| match little_endian {
            true => u16::from_le_bytes([pair[0], pair[1]]),
            _ => u16::from_be_bytes([pair[0], pair[1]]),
        })
        .collect::<Vec<_>>();

    String::from_utf16(&units).map_err(|_| Error::InvalidText("UTF-16"))
}

/// Bounds-checked cursor over a buffer.
struct Reader<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    fn is_empty(&self) -> bool {
        self.cursor >= self.buffer.len()
    }

    fn next(&mut self) -> Result<u8> {
        self.read(1).map(|bytes| bytes[0])
    }

    fn read(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self
            .cursor
            .checked_add(length)
            .filter(|end| *end <= self.buffer.len())
            .ok_or(Error::Truncated(self.cursor))?;

        let bytes = &self.buffer[self.cursor..end];
        self.cursor = end;

        Ok(bytes)
    }

    fn rest(&mut self) -> &'a [u8] {
        let bytes = &self.buffer[self.cursor.min(self.buffer.len())..];
        self.cursor = self.buffer.len();
        bytes
    }
}
