use std::fs;
use std::io;
use std::io::Write;
use std::path;
use std::slice;
use std::str;

use tracing::{debug, warn};

use crate::errors::{Error, ParseError, Result};
use crate::lexer::{Token, Tokenizer};
use crate::parser;
use crate::types::{Entry, SymbolTable};
use crate::window::WindowGrouper;

/// What `Document::load` does with a malformed declaration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Policy {
    /// Reject the whole input; the document keeps its previous entries and symbols.
    #[default]
    StopOnFirstError,
    /// Record the error, skip the declaration and continue.
    IgnoreParseErrors,
}

/// A `.bib` document: its entries, its `@STRING` symbols and the
/// diagnostics of the last load.
#[derive(Clone, Debug, Default)]
pub struct Document {
    entries: Vec<Entry>,
    symbols: SymbolTable,
    diagnostics: Vec<ParseError>,
    policy: Policy,
}

impl Document {
    pub fn new(policy: Policy) -> Document {
        Document {
            policy,
            ..Document::default()
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: Policy) {
        self.policy = policy;
    }

    /// Replaces entries, symbols and diagnostics with the content of `reader`.
    ///
    /// Returns `Ok(true)` if every declaration was accepted and `Ok(false)`
    /// if at least one was rejected; see [`Document::diagnostics`]. With
    /// [`Policy::StopOnFirstError`] a rejected input leaves entries and
    /// symbols as they were before the call.
    ///
    /// I/O errors are returned as `Err` under either policy, and leave the
    /// document untouched.
    pub fn load<R: io::Read>(&mut self, reader: R) -> Result<bool> {
        debug!(policy = ?self.policy, "loading document");

        let mut entries = Vec::new();
        let mut symbols = SymbolTable::new();
        let mut diagnostics = Vec::new();

        for window in WindowGrouper::new(Tokenizer::new(reader)) {
            let outcome = match window {
                Ok(window) => accept(&window, &mut entries, &mut symbols),
                Err(Error::Parse(err)) => Err(err),
                Err(err) => return Err(err),
            };
            if let Err(err) = outcome {
                warn!(line = err.line, column = err.column, "rejected declaration: {}", err);
                diagnostics.push(err);
                if self.policy == Policy::StopOnFirstError {
                    self.diagnostics = diagnostics;
                    return Ok(false);
                }
            }
        }

        debug!(
            entries = entries.len(),
            symbols = symbols.len(),
            diagnostics = diagnostics.len(),
            "document loaded"
        );
        self.entries = entries;
        self.symbols = symbols;
        self.diagnostics = diagnostics;
        Ok(self.diagnostics.is_empty())
    }

    /// Use a file at some filepath as source, see [`Document::load`].
    pub fn load_file<P: AsRef<path::Path>>(&mut self, path: P) -> Result<bool> {
        let file = fs::File::open(path)?;
        self.load(file)
    }

    pub fn load_str(&mut self, src: &str) -> Result<bool> {
        self.load(src.as_bytes())
    }

    /// Writes every entry in canonical form, separated by blank lines.
    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        for entry in &self.entries {
            writeln!(writer, "{}", entry)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn save_file<P: AsRef<path::Path>>(&self, path: P) -> Result<()> {
        let file = fs::File::create(path)?;
        self.save(io::BufWriter::new(file))
    }

    /// The canonical text `save` would write.
    pub fn to_bibtex(&self) -> String {
        self.entries.iter().map(|entry| format!("{}\n", entry)).collect()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// errors of the last `load`, in input order
    pub fn diagnostics(&self) -> &[ParseError] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Entry> {
        self.entries.get_mut(index)
    }

    /// first entry with the given key
    pub fn find(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.key() == key)
    }

    pub fn iter(&self) -> slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, Entry> {
        self.entries.iter_mut()
    }

    pub fn add(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn insert(&mut self, index: usize, entry: Entry) -> Result<()> {
        if index > self.entries.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        self.entries.insert(index, entry);
        Ok(())
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Entry> {
        if index >= self.entries.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    /// Removes all entries. Symbols and diagnostics are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Classifies a window by its second token and merges it into `entries` or `symbols`.
fn accept(
    window: &[Token],
    entries: &mut Vec<Entry>,
    symbols: &mut SymbolTable,
) -> std::result::Result<(), ParseError> {
    let kind = window.get(1).map(|token| token.value.to_ascii_uppercase());
    match kind.as_deref() {
        Some("STRING") => {
            let (name, expansion) = parser::parse_symbol(window)?;
            debug!(%name, "symbol declared");
            symbols.insert(name, expansion);
        }
        Some("COMMENT") => debug!("comment skipped"),
        _ => {
            let entry = parser::parse_entry(window, symbols)?;
            debug!(key = entry.key(), "entry parsed");
            entries.push(entry);
        }
    }
    Ok(())
}

impl str::FromStr for Document {
    type Err = Error;

    /// Loads `src` with [`Policy::StopOnFirstError`]; the first rejected
    /// declaration becomes the error.
    fn from_str(src: &str) -> Result<Self> {
        let mut document = Document::default();
        document.load_str(src)?;
        match document.diagnostics.first() {
            Some(err) => Err(Error::Parse(err.clone())),
            None => Ok(document),
        }
    }
}

impl<'d> IntoIterator for &'d Document {
    type Item = &'d Entry;
    type IntoIter = slice::Iter<'d, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
