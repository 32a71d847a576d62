//! Conversation state enum.
//!
//! Every chat session is in exactly one of these states at any time. The
//! engine dispatches on the state with an exhaustive `match`, so adding a
//! state forces every transition site to be revisited by the compiler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing a stored state name.
///
/// A stored value outside the known enumeration is a corruption condition;
/// the engine resets the session rather than guessing.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown conversation state: {0:?}")]
pub struct StateParseError(pub String);

/// The state of a single conversation.
///
/// `Initial` is the entry state and is re-entered after a reset; none of the
/// states are terminal - the machine cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatState {
    /// No menu shown yet; the next message produces the catalog listing.
    #[default]
    Initial,
    /// Catalog menu is on screen; product taps are expected.
    Browsing,
    /// A single product is on screen; back / add-to-cart / cart are expected.
    ProductDetail,
    /// Cart summary was just shown; any event returns to browsing.
    CartView,
}

impl ChatState {
    /// Stable string name, used as the persisted representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::Browsing => "BROWSING",
            Self::ProductDetail => "PRODUCT_DETAIL",
            Self::CartView => "CART_VIEW",
        }
    }
}

impl std::fmt::Display for ChatState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChatState {
    type Err = StateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIAL" => Ok(Self::Initial),
            "BROWSING" => Ok(Self::Browsing),
            "PRODUCT_DETAIL" => Ok(Self::ProductDetail),
            "CART_VIEW" => Ok(Self::CartView),
            other => Err(StateParseError(other.to_string())),
        }
    }
}
