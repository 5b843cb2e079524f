use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

use crate::errors::{Error, Result};

/// Field names mapped to their data, in insertion order.
///
/// Names are stored lower-cased and looked up case-insensitively.
/// Inserting a name again replaces the data but keeps the original position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fields {
    pairs: IndexMap<String, String>,
}

/// Lower-cases `name`, allocating only if it has upper-case characters.
fn normalize(name: &str) -> Cow<'_, str> {
    if name.chars().any(char::is_uppercase) {
        Cow::Owned(name.to_lowercase())
    } else {
        Cow::Borrowed(name)
    }
}

impl Fields {
    pub fn new() -> Fields {
        Fields::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs.get(normalize(name).as_ref()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.contains_key(normalize(name).as_ref())
    }

    /// Returns the data previously stored under `name`, if any.
    pub fn insert(&mut self, name: &str, data: impl Into<String>) -> Option<String> {
        self.pairs.insert(normalize(name).into_owned(), data.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.pairs.shift_remove(normalize(name).as_ref())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, d)| (n.as_str(), d.as_str()))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Fields {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (name, data) in self.iter() {
            map.serialize_entry(name, data)?;
        }
        map.end()
    }
}

/// One entry in a `.bib` file
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Entry {
    pub(crate) type_name: String,
    pub(crate) key: String,
    pub(crate) fields: Fields,
}

impl Entry {
    /// A new entry without fields. Type name and key must not be empty.
    pub fn new(type_name: impl Into<String>, key: impl Into<String>) -> Result<Entry> {
        let (type_name, key) = (type_name.into(), key.into());
        if type_name.is_empty() {
            return Err(Error::EmptyEntryPart("type name"));
        }
        if key.is_empty() {
            return Err(Error::EmptyEntryPart("key"));
        }
        Ok(Entry {
            type_name,
            key,
            fields: Fields::new(),
        })
    }

    /// entry type as written, e.g. “Article”
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// entry key, e.g. “DBLP:books/lib/Knuth97”
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn set_type_name(&mut self, type_name: impl Into<String>) -> Result<()> {
        let type_name = type_name.into();
        if type_name.is_empty() {
            return Err(Error::EmptyEntryPart("type name"));
        }
        self.type_name = type_name;
        Ok(())
    }

    pub fn set_key(&mut self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::EmptyEntryPart("key"));
        }
        self.key = key;
        Ok(())
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: &str, data: impl Into<String>) -> Option<String> {
        self.fields.insert(name, data)
    }

    pub fn remove_field(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }
}

impl fmt::Display for Entry {
    /// Canonical form: one field per line, data always in braces.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}{{{}", self.type_name, self.key)?;
        for (name, data) in self.fields.iter() {
            write!(f, ",\n  {} = {{{}}}", name, data)?;
        }
        writeln!(f, "\n}}")
    }
}

/// `@STRING` macros by name. Names are case-sensitive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SymbolTable {
    symbols: HashMap<String, String>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.symbols.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Redefining a symbol replaces its expansion.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        expansion: impl Into<String>,
    ) -> Option<String> {
        self.symbols.insert(name.into(), expansion.into())
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.symbols.iter().map(|(n, e)| (n.as_str(), e.as_str()))
    }
}
