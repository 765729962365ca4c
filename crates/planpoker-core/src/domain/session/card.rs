//! Voting card deck
//!
//! The deck is fixed. Cards travel through the store as their literal face
//! value ("5", "?", "☕") so records written by other clients stay readable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A card a participant can play
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VotingCard {
    Zero,
    One,
    Two,
    Three,
    Five,
    Eight,
    Thirteen,
    TwentyOne,
    /// "?" - the voter is unsure
    Unsure,
    /// "☕" - the voter needs a break
    Coffee,
}

impl VotingCard {
    /// All cards in display order
    pub const ALL: [VotingCard; 10] = [
        Self::Zero,
        Self::One,
        Self::Two,
        Self::Three,
        Self::Five,
        Self::Eight,
        Self::Thirteen,
        Self::TwentyOne,
        Self::Unsure,
        Self::Coffee,
    ];

    /// Face value as written to the store
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
            Self::Two => "2",
            Self::Three => "3",
            Self::Five => "5",
            Self::Eight => "8",
            Self::Thirteen => "13",
            Self::TwentyOne => "21",
            Self::Unsure => "?",
            Self::Coffee => "☕",
        }
    }

    /// Story points for numeric cards, `None` for "?" and "☕"
    pub fn points(&self) -> Option<u32> {
        match self {
            Self::Zero => Some(0),
            Self::One => Some(1),
            Self::Two => Some(2),
            Self::Three => Some(3),
            Self::Five => Some(5),
            Self::Eight => Some(8),
            Self::Thirteen => Some(13),
            Self::TwentyOne => Some(21),
            Self::Unsure | Self::Coffee => None,
        }
    }
}

impl FromStr for VotingCard {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|card| card.as_str() == s.trim())
            .ok_or_else(|| Error::Parse(format!("Unknown voting card: {}", s)))
    }
}

impl TryFrom<String> for VotingCard {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VotingCard> for String {
    fn from(card: VotingCard) -> Self {
        card.as_str().to_string()
    }
}

impl fmt::Display for VotingCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
