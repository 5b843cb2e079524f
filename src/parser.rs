use std::mem;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{ParseError, ParseErrorKind};
use crate::lexer::{Token, TokenKind};
use crate::types::{Entry, Fields, SymbolTable};

/// Entry types, keys, field names and symbol names must not contain separators.
static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r##"^[^\s@{}(),"#=]+$"##).expect("valid regex"));

/// Field data written without any delimiter, e.g. `year = 1997`.
static BARE_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("valid regex"));

fn is_name(token: &Token) -> bool {
    token.kind == TokenKind::Text && NAME.is_match(&token.value)
}

/// Progress through a field value built from quoted fragments and symbols
/// joined by `#`.
#[derive(Debug)]
enum ComplexState {
    /// expecting `"` or a symbol
    Started,
    /// expecting the text between quotes
    Value,
    /// expecting the closing `"`
    ClosingQuotation,
    /// expecting `#`, `,` or the closing delimiter
    ConcatenationOrComma,
}

#[derive(Debug)]
enum EntryState {
    ExpectAt,
    ExpectTypeName,
    ExpectOpenDelimiter,
    ExpectKey,
    /// `,` or the closing delimiter
    ExpectComma,
    /// field name, or the closing delimiter after a trailing comma
    ExpectFieldName,
    ExpectEqual { name: String },
    ExpectValueOpen { name: String },
    ExpectSimpleValue { name: String },
    ExpectSimpleClose { name: String, data: String },
    ExpectComplexValue { name: String, data: String, state: ComplexState },
    Closed,
}

/// Parser for the token window of exactly one entry
struct EntryParser<'p> {
    symbols: &'p SymbolTable,
    close: char,
    type_name: String,
    key: String,
    fields: Fields,
}

impl<'p> EntryParser<'p> {
    fn step(&mut self, state: EntryState, token: &Token) -> Result<EntryState, ParseError> {
        use EntryState as S;

        let unexpected =
            |expected: String| ParseError::at_token(ParseErrorKind::expected(expected), token);

        Ok(match state {
            S::ExpectAt => {
                if !token.is('@') {
                    return Err(unexpected("'@'".to_string()));
                }
                S::ExpectTypeName
            }
            S::ExpectTypeName => {
                if !is_name(token) {
                    return Err(ParseError::at_token(ParseErrorKind::InvalidTypeName, token));
                }
                self.type_name = token.value.clone();
                S::ExpectOpenDelimiter
            }
            S::ExpectOpenDelimiter => {
                self.close = if token.is('{') {
                    '}'
                } else if token.is('(') {
                    ')'
                } else {
                    return Err(unexpected("'{' or '('".to_string()));
                };
                S::ExpectKey
            }
            S::ExpectKey => {
                if !is_name(token) {
                    return Err(ParseError::at_token(ParseErrorKind::InvalidKey, token));
                }
                self.key = token.value.clone();
                S::ExpectComma
            }
            S::ExpectComma => {
                if token.is(',') {
                    S::ExpectFieldName
                } else if token.is(self.close) {
                    S::Closed
                } else {
                    return Err(unexpected(format!("',' or '{}'", self.close)));
                }
            }
            S::ExpectFieldName => {
                if token.is(self.close) {
                    S::Closed
                } else if is_name(token) {
                    S::ExpectEqual {
                        name: token.value.to_lowercase(),
                    }
                } else {
                    return Err(ParseError::at_token(ParseErrorKind::InvalidFieldName, token));
                }
            }
            S::ExpectEqual { name } => {
                if !token.is('=') {
                    return Err(unexpected("'='".to_string()));
                }
                S::ExpectValueOpen { name }
            }
            S::ExpectValueOpen { name } => {
                if token.is('{') {
                    S::ExpectSimpleValue { name }
                } else if token.is('"') {
                    S::ExpectComplexValue {
                        name,
                        data: String::new(),
                        state: ComplexState::Value,
                    }
                } else if let Some(expansion) = self.symbol(token) {
                    S::ExpectComplexValue {
                        name,
                        data: expansion.to_string(),
                        state: ComplexState::ConcatenationOrComma,
                    }
                } else if token.kind == TokenKind::Text && BARE_VALUE.is_match(&token.value) {
                    self.fields.insert(&name, token.value.clone());
                    S::ExpectComma
                } else {
                    return Err(unexpected(
                        "'{', '\"', a defined symbol or an alphanumeric value".to_string(),
                    ));
                }
            }
            S::ExpectSimpleValue { name } => {
                if token.kind != TokenKind::Value {
                    return Err(unexpected("field data".to_string()));
                }
                S::ExpectSimpleClose {
                    name,
                    data: token.value.clone(),
                }
            }
            S::ExpectSimpleClose { name, data } => {
                if !token.is('}') {
                    return Err(unexpected("'}'".to_string()));
                }
                self.fields.insert(&name, data);
                S::ExpectComma
            }
            S::ExpectComplexValue { name, data, state } => self.complex(name, data, state, token)?,
            S::Closed => return Err(unexpected("end of entry".to_string())),
        })
    }

    fn complex(
        &mut self,
        name: String,
        mut data: String,
        state: ComplexState,
        token: &Token,
    ) -> Result<EntryState, ParseError> {
        use ComplexState as C;

        let unexpected =
            |expected: String| ParseError::at_token(ParseErrorKind::expected(expected), token);
        let next = match state {
            C::Started => {
                if token.is('"') {
                    C::Value
                } else if let Some(expansion) = self.symbol(token) {
                    data.push_str(expansion);
                    C::ConcatenationOrComma
                } else {
                    return Err(unexpected("'\"' or a defined symbol".to_string()));
                }
            }
            C::Value => {
                if token.kind != TokenKind::Value {
                    return Err(unexpected("quoted text".to_string()));
                }
                data.push_str(&token.value);
                C::ClosingQuotation
            }
            C::ClosingQuotation => {
                if !token.is('"') {
                    return Err(unexpected("'\"'".to_string()));
                }
                C::ConcatenationOrComma
            }
            C::ConcatenationOrComma => {
                if token.is('#') {
                    C::Started
                } else if token.is(',') {
                    self.fields.insert(&name, data.trim());
                    return Ok(EntryState::ExpectFieldName);
                } else if token.is(self.close) {
                    self.fields.insert(&name, data.trim());
                    return Ok(EntryState::Closed);
                } else {
                    return Err(unexpected(format!("'#', ',' or '{}'", self.close)));
                }
            }
        };
        Ok(EntryState::ExpectComplexValue {
            name,
            data,
            state: next,
        })
    }

    fn symbol(&self, token: &Token) -> Option<&'p str> {
        match token.kind {
            TokenKind::Text => self.symbols.get(&token.value),
            _ => None,
        }
    }
}

/// Parses one entry window, from its `@` up to and including its closing
/// delimiter. Symbols referenced by field values are looked up in `symbols`.
pub fn parse_entry(window: &[Token], symbols: &SymbolTable) -> Result<Entry, ParseError> {
    let mut parser = EntryParser {
        symbols,
        close: '}',
        type_name: String::new(),
        key: String::new(),
        fields: Fields::new(),
    };

    let mut state = EntryState::ExpectAt;
    for token in window {
        state = parser.step(state, token)?;
    }

    match state {
        EntryState::Closed => Ok(Entry {
            type_name: mem::take(&mut parser.type_name),
            key: mem::take(&mut parser.key),
            fields: mem::take(&mut parser.fields),
        }),
        _ => Err(match window.last() {
            Some(last) => ParseError::at_token(ParseErrorKind::NotWellFormed, last),
            None => ParseError::new(ParseErrorKind::NotWellFormed, 0, 0),
        }),
    }
}

fn nth<'w>(window: &'w [Token], i: usize, expected: &str) -> Result<&'w Token, ParseError> {
    window.get(i).ok_or_else(|| {
        let kind = ParseErrorKind::expected(expected);
        match window.last() {
            Some(last) => ParseError::new(kind, last.line, last.column),
            None => ParseError::new(kind, 0, 0),
        }
    })
}

fn expect_delimiter(window: &[Token], i: usize, delimiter: char) -> Result<(), ParseError> {
    let expected = format!("'{}'", delimiter);
    let token = nth(window, i, &expected)?;
    if token.is(delimiter) {
        Ok(())
    } else {
        Err(ParseError::at_token(ParseErrorKind::expected(expected), token))
    }
}

/// Parses a symbol declaration `@STRING{name = "value"}` into name and
/// expansion. The value may also be braced, the declaration may also use
/// parentheses.
pub fn parse_symbol(window: &[Token]) -> Result<(String, String), ParseError> {
    expect_delimiter(window, 0, '@')?;

    let kind = nth(window, 1, "STRING")?;
    if kind.kind != TokenKind::Text || !kind.value.eq_ignore_ascii_case("string") {
        return Err(ParseError::at_token(ParseErrorKind::expected("STRING"), kind));
    }

    let open = nth(window, 2, "'{' or '('")?;
    let close = if open.is('{') {
        '}'
    } else if open.is('(') {
        ')'
    } else {
        return Err(ParseError::at_token(ParseErrorKind::expected("'{' or '('"), open));
    };

    let name = nth(window, 3, "symbol name")?;
    if !is_name(name) {
        return Err(ParseError::at_token(ParseErrorKind::expected("symbol name"), name));
    }

    expect_delimiter(window, 4, '=')?;

    let quote = nth(window, 5, "'\"' or '{'")?;
    let unquote = if quote.is('"') {
        '"'
    } else if quote.is('{') {
        '}'
    } else {
        return Err(ParseError::at_token(ParseErrorKind::expected("'\"' or '{'"), quote));
    };

    let value = nth(window, 6, "symbol value")?;
    if value.kind != TokenKind::Value {
        return Err(ParseError::at_token(ParseErrorKind::expected("symbol value"), value));
    }

    expect_delimiter(window, 7, unquote)?;
    expect_delimiter(window, 8, close)?;
    if let Some(extra) = window.get(9) {
        return Err(ParseError::at_token(
            ParseErrorKind::expected("end of @STRING declaration"),
            extra,
        ));
    }

    Ok((name.value.clone(), value.value.clone()))
}
