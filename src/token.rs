//! Member and type identity inside a code host.
//!
//! Every type and member a [`crate::host::CodeHost`] defines receives a [`Token`]. The high byte
//! names the kind of entity (the "table"), the low 24 bits are a per-host running row number.
//! Descriptors bind to their compiled handles by token after a type has been sealed, so a token
//! is the only thing a descriptor needs to remember between Define and Bind.

use std::fmt;
use std::hash::{Hash, Hasher};

/// A token identifying a type or member created by a code host.
///
/// Tokens consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table type
/// - The low 24 bits (bits 0-23) indicate the row index within that table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Token(pub u32);

impl Token {
    /// Table id of synthesized types
    pub const TYPE: u8 = 0x02;
    /// Table id of fields
    pub const FIELD: u8 = 0x04;
    /// Table id of methods, constructors and finalizers
    pub const METHOD: u8 = 0x06;
    /// Table id of properties
    pub const PROPERTY: u8 = 0x17;

    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a table id and a row number
    ///
    /// ## Arguments
    /// * `table` - The table id, one of the associated constants
    /// * `row`   - The row number, truncated to 24 bits
    #[must_use]
    pub fn from_parts(table: u8, row: u32) -> Self {
        Token((u32::from(table) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
