use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, ValueObject};

/// Recommendation weight. Higher rankings are shown first.
///
/// Stored as a positive small integer column, so the range is `0..=32767`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Ranking(u16);

impl ValueObject for Ranking {}

impl Ranking {
    pub const MAX: u16 = 32_767;
    pub const ZERO: Ranking = Ranking(0);

    pub fn new(value: u16) -> DomainResult<Self> {
        if value > Self::MAX {
            return Err(DomainError::validation(format!(
                "ranking must be between 0 and {}, got {value}",
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for Ranking {
    type Error = DomainError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ranking::new(value)
    }
}

impl From<Ranking> for u16 {
    fn from(value: Ranking) -> Self {
        value.0
    }
}

impl core::fmt::Display for Ranking {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
