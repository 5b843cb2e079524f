//! This crate reads and writes `.bib` files in pure, safe rust.
//!
//! `.bib` files are popular in reference management since many resources
//! allow to export metadata in a BibTeχ or BibLaTeχ file. One entry
//! in such a file can look like this:
//!
//! ```tex
//! @string{aw = "Addison-Wesley"}
//!
//! @book{DBLP:books/aw/Knuth73a,
//!     author    = {Donald E. Knuth},
//!     title     = {The Art of Computer Programming, Volume {I:} Fundamental Algorithms,
//!                  2nd Edition},
//!     publisher = aw,
//!     year      = 1973,
//!     url       = "https://www.worldcat.org/oclc/" # "310903895",
//! }
//! ```
//!
//! We call `book` the type name and `DBLP:books/aw/Knuth73a` the key.
//! Then we have a sequence of fields with a name (like `year`) and data
//! (like `1973`). Data is written in braces, in quotes, as a bare
//! alphanumeric literal or as a concatenation of quoted fragments and
//! `@string` symbols joined by `#`. Everything outside of `@` declarations
//! is a comment, and so is the content of `@comment{…}`.
//!
//! Reading happens in four steps: the [`Tokenizer`] turns bytes into
//! [`Token`]s, the [`WindowGrouper`] cuts the token stream into one window
//! per `@` declaration, [`parse_entry`] and [`parse_symbol`] turn a window
//! into an [`Entry`] or a symbol, and the [`Document`] ties them together:
//!
//! ```rust
//! use bibdoc::{Document, Policy};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let src = r#"@string{tolk = "J. R. R. Tolkien"}
//!                  @book{tolkien1937, author = tolk, year = 1937}
//!                  @book{broken, title = {The Hobbit}"#;
//!     let mut doc = Document::new(Policy::IgnoreParseErrors);
//!     let clean = doc.load_str(src)?;
//!     assert!(!clean);
//!     for entry in doc.iter() {
//!         println!("type = {}", entry.type_name());
//!         println!("key = {}", entry.key());
//!         for (name, data) in entry.fields().iter() {
//!             println!("\t{}\t= {}", name, data);
//!         }
//!     }
//!     for err in doc.diagnostics() {
//!         eprintln!("{}", err);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! With [`Policy::StopOnFirstError`], the default, a single malformed
//! declaration rejects the whole input and the document keeps its previous
//! content. [`Document::save`] writes entries back in a canonical form;
//! formatting and comments of the source are not preserved.

mod document;
mod errors;
mod lexer;
mod parser;
mod types;
mod window;

pub use crate::document::{Document, Policy};
pub use crate::errors::{Error, ErrorClass, ParseError, ParseErrorKind, Result};
pub use crate::lexer::{Token, TokenKind, Tokenizer};
pub use crate::parser::{parse_entry, parse_symbol};
pub use crate::types::{Entry, Fields, SymbolTable};
pub use crate::window::{TokenQueue, WindowGrouper};
