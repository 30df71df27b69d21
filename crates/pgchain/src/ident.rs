//! Identifier validation.
//!
//! Table and column names are the only caller-controlled text that ends up
//! in SQL outside of bound parameters, so they are held to a strict shape:
//! `[A-Za-z_][A-Za-z0-9_]*`. Dots, quotes and schema qualification are all
//! rejected.
//!
//! # Example
//! ```ignore
//! use pgchain::Ident;
//!
//! let t = Ident::parse("products")?;
//! assert_eq!(t.to_sql(), r#""products""#);
//! # Ok::<(), pgchain::OrmError>(())
//! ```

use crate::error::{OrmError, OrmResult};

/// Check that `name` is a simple identifier and hand it back unchanged.
pub fn validate_ident(name: &str) -> OrmResult<&str> {
    if is_simple_ident(name) {
        Ok(name)
    } else {
        Err(OrmError::InvalidIdentifier(name.to_string()))
    }
}

/// `true` if `name` matches `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_simple_ident(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || first.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// A validated SQL identifier (table or column name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(String);

impl Ident {
    /// Validate and wrap an identifier.
    pub fn parse(name: &str) -> OrmResult<Self> {
        validate_ident(name).map(|n| Self(n.to_string()))
    }

    /// Render the identifier double-quoted.
    pub fn to_sql(&self) -> String {
        // Validation already excludes `"`, so no escaping is needed.
        format!("\"{}\"", self.0)
    }
}
