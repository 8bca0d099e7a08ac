//! Wallet cards and their text payload.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum CardType {
    Student,
    Work,
    Personal,
}

impl CardType {
    /// The name of the type, as carried in the payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::Work => "Work",
            Self::Personal => "Personal",
        }
    }
}

impl Display for CardType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown card type: {0}")]
pub struct UnknownCardType(String);

impl FromStr for CardType {
    type Err = UnknownCardType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use CardType::*;

        match s {
            "Student" => Ok(Student),
            "Work" => Ok(Work),
            "Personal" => Ok(Personal),
            _ => Err(UnknownCardType(s.to_owned())),
        }
    }
}

/// A card stored in the user's wallet.
/// Cards are created elsewhere; this crate only reads and transmits them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_phone: Option<String>,
}

impl Card {
    /// Serializes the whole card as the text carried by the NDEF record.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parses a card back from the text carried by the NDEF record.
    pub fn from_payload(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }

    /// First and last name, separated by a space.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Display for Card {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({}) {}",
            self.first_name, self.last_name, self.card_type, self.phone
        )?;

        if let Some(work_phone) = &self.work_phone {
            write!(f, " / {}", work_phone)?;
        }

        Ok(())
    }
}
