//! Table entry model: match specifications and direct actions.

use std::collections::BTreeMap;
use std::fmt;

/// A single match specification for one key field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchValue {
    /// The field must equal the value exactly.
    Exact(Vec<u8>),
    /// Longest-prefix match on the top `prefix_len` bits of the value.
    ///
    /// A zero-width prefix matches any value of the field.
    Lpm { value: Vec<u8>, prefix_len: u8 },
}

impl MatchValue {
    /// Exact match on a fixed value.
    pub fn exact(value: Vec<u8>) -> Self {
        MatchValue::Exact(value)
    }

    /// Prefix match with the given width in bits.
    pub fn lpm(value: Vec<u8>, prefix_len: u8) -> Self {
        MatchValue::Lpm { value, prefix_len }
    }

    /// Returns the LPM width, or `None` for exact matches.
    pub fn prefix_len(&self) -> Option<u8> {
        match self {
            MatchValue::Exact(_) => None,
            MatchValue::Lpm { prefix_len, .. } => Some(*prefix_len),
        }
    }
}

/// A direct action: the action name plus its ordered byte-encoded
/// parameters, stored in the table entry itself.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionSpec {
    /// Fully-qualified action name in the dataplane program.
    pub action: String,
    /// Ordered action parameters, each a fixed-width big-endian value.
    pub params: Vec<Vec<u8>>,
}

impl ActionSpec {
    /// Creates a new action specification.
    pub fn new(action: impl Into<String>, params: Vec<Vec<u8>>) -> Self {
        ActionSpec {
            action: action.into(),
            params,
        }
    }
}

/// One match-action table entry.
///
/// Entries are built with the fluent methods and handed to a
/// [`TableClient`](crate::TableClient). Delete mutations identify the entry
/// by table and match key alone; the action is ignored if present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    /// Fully-qualified table name in the dataplane program.
    pub table: String,
    /// Match specifications keyed by field name. Ordered so that entries
    /// compare and display deterministically.
    pub matches: BTreeMap<String, MatchValue>,
    /// Direct action for insert/modify; `None` for delete.
    pub action: Option<ActionSpec>,
}

impl TableEntry {
    /// Creates an entry for the given table with no matches or action.
    pub fn new(table: impl Into<String>) -> Self {
        TableEntry {
            table: table.into(),
            matches: BTreeMap::new(),
            action: None,
        }
    }

    /// Adds an exact match on a field.
    pub fn exact_match(mut self, field: impl Into<String>, value: Vec<u8>) -> Self {
        self.matches.insert(field.into(), MatchValue::exact(value));
        self
    }

    /// Adds a longest-prefix match on a field.
    pub fn lpm_match(mut self, field: impl Into<String>, value: Vec<u8>, prefix_len: u8) -> Self {
        self.matches
            .insert(field.into(), MatchValue::lpm(value, prefix_len));
        self
    }

    /// Sets the direct action.
    pub fn action(mut self, action: impl Into<String>, params: Vec<Vec<u8>>) -> Self {
        self.action = Some(ActionSpec::new(action, params));
        self
    }

    /// Returns the match specification for a field, if present.
    pub fn match_on(&self, field: &str) -> Option<&MatchValue> {
        self.matches.get(field)
    }
}

impl fmt::Display for TableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.table)?;
        for (i, (field, m)) in self.matches.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match m {
                MatchValue::Exact(v) => write!(f, "{}={:02x?}", field, v)?,
                MatchValue::Lpm { value, prefix_len } => {
                    write!(f, "{}={:02x?}/{}", field, value, prefix_len)?
                }
            }
        }
        write!(f, "}}")?;
        if let Some(action) = &self.action {
            write!(f, " -> {}", action.action)?;
        }
        Ok(())
    }
}
