use std::fmt;
use std::io;
use std::io::Read;

use crate::errors::{ParseError, ParseErrorKind, Result};

/// Characters which always form a token of their own outside of field values.
const DELIMITERS: &[u8] = b"@{}(),\"=#";

fn is_delimiter(byte: u8) -> bool {
    DELIMITERS.contains(&byte)
}

/// What produced a [`Token`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// exactly one of `@ { } ( ) , " = #`
    Delimiter,
    /// a run of other characters, e.g. an entry type, a key or a field name
    Text,
    /// the content of a braced value or a quoted fragment
    Value,
}

/// A token is one semantic unit read from the bib file.
/// For a source like
///
/// ```tex
/// @Book{works:4,
///   title = {Sonnets, {I}},
/// }
/// ```
///
/// the tokenizer emits `@`, `Book`, `{`, `works:4`, `,`, `title`, `=`, `{`,
/// `Sonnets, {I}`, `}`, `,` and `}`. Only `Sonnets, {I}` is a
/// [`TokenKind::Value`]; it keeps its inner braces and is never split on
/// commas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    /// 1-based line of the first non-blank character
    pub line: usize,
    /// 1-based column of the first non-blank character
    pub column: usize,
    pub kind: TokenKind,
}

impl Token {
    /// Is this the structural delimiter `delimiter`?
    pub fn is(&self, delimiter: char) -> bool {
        self.kind == TokenKind::Delimiter
            && self.value.len() == 1
            && self.value.starts_with(delimiter)
    }

    fn delimiter_byte(&self) -> Option<u8> {
        match self.kind {
            TokenKind::Delimiter => self.value.bytes().next(),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Byte source with a single byte of lookahead and position tracking.
/// Reaching the end of the stream is reported as `None`, never as an error.
struct Source<R> {
    bytes: io::Bytes<io::BufReader<R>>,
    peeked: Option<u8>,
    line: usize,
    column: usize,
}

impl<R: Read> Source<R> {
    fn new(reader: R) -> Self {
        Source {
            bytes: io::BufReader::new(reader).bytes(),
            peeked: None,
            line: 1,
            column: 1,
        }
    }

    fn peek(&mut self) -> io::Result<Option<u8>> {
        if self.peeked.is_none() {
            self.peeked = self.bytes.next().transpose()?;
        }
        Ok(self.peeked)
    }

    fn bump(&mut self) -> io::Result<Option<u8>> {
        let byte = match self.peeked.take() {
            Some(byte) => Some(byte),
            None => self.bytes.next().transpose()?,
        };
        match byte {
            Some(b'\n') => {
                self.line += 1;
                self.column = 1;
            }
            // UTF-8 continuation bytes belong to the previous character
            Some(byte) if byte & 0xC0 != 0x80 => self.column += 1,
            _ => {}
        }
        Ok(byte)
    }

    /// line and column of the next byte
    fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }
}

/// Pull-based tokenizer over a byte stream.
///
/// One forward pass, not restartable. Most input is split on the
/// delimiter characters, but once the last two tokens were `= {`, `= "`
/// or `# "`, the next token is the complete field value up to the
/// matching `}` or `"`.
pub struct Tokenizer<R> {
    source: Source<R>,
    recent: [Option<u8>; 2], // delimiters of the last two tokens, oldest first
}

impl<R: Read> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Tokenizer {
            source: Source::new(reader),
            recent: [None, None],
        }
    }

    /// Returns the next token or `None` at the end of the stream.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        let result = match self.recent {
            [Some(b'='), Some(b'{')] => self.braced_value().map(Some),
            [Some(b'='), Some(b'"')] | [Some(b'#'), Some(b'"')] => self.quoted_value().map(Some),
            _ => self.plain_token(),
        };
        match &result {
            Ok(Some(token)) => self.recent = [self.recent[1], token.delimiter_byte()],
            Ok(None) => {}
            Err(_) => self.recent = [None, None],
        }
        result
    }

    fn skip_whitespace(&mut self) -> io::Result<()> {
        while let Some(byte) = self.source.peek()? {
            if !byte.is_ascii_whitespace() {
                break;
            }
            self.source.bump()?;
        }
        Ok(())
    }

    fn plain_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace()?;
        let (line, column) = self.source.position();
        let first = match self.source.peek()? {
            Some(byte) => byte,
            None => return Ok(None),
        };

        if is_delimiter(first) {
            self.source.bump()?;
            return Ok(Some(Token {
                value: char::from(first).to_string(),
                line,
                column,
                kind: TokenKind::Delimiter,
            }));
        }

        let mut raw = Vec::new();
        while let Some(byte) = self.source.peek()? {
            if is_delimiter(byte) {
                break;
            }
            raw.push(byte);
            self.source.bump()?;
        }
        Ok(Some(Token {
            value: fold_whitespace(&raw, true),
            line,
            column,
            kind: TokenKind::Text,
        }))
    }

    /// Content of `{...}` after the opening brace. The closing brace stays
    /// in the stream and becomes the next token.
    fn braced_value(&mut self) -> Result<Token> {
        self.skip_whitespace()?;
        let start = self.source.position();
        let mut raw = Vec::new();
        self.read_group(&mut raw, false, start)?;
        Ok(Token {
            value: fold_whitespace(&raw, true),
            line: start.0,
            column: start.1,
            kind: TokenKind::Value,
        })
    }

    /// Reads up to the `}` which closes an already opened group.
    /// That brace is consumed and collected only with `keep_close`.
    fn read_group(
        &mut self,
        raw: &mut Vec<u8>,
        keep_close: bool,
        start: (usize, usize),
    ) -> Result<()> {
        let mut depth = 1usize;
        loop {
            match self.source.peek()? {
                None => return Err(unterminated(raw, start).into()),
                Some(b'{') => depth += 1,
                Some(b'}') => {
                    depth -= 1;
                    if depth == 0 {
                        if keep_close {
                            self.source.bump()?;
                            raw.push(b'}');
                        }
                        return Ok(());
                    }
                }
                Some(_) => {}
            }
            if let Some(byte) = self.source.bump()? {
                raw.push(byte);
            }
        }
    }

    /// Content of `"..."` after the opening quote. The closing quote stays
    /// in the stream and becomes the next token.
    fn quoted_value(&mut self) -> Result<Token> {
        let start = self.source.position();
        let mut raw = Vec::new();
        loop {
            match self.source.peek()? {
                None => return Err(unterminated(&raw, start).into()),
                Some(b'"') => break,
                Some(b'}') => {
                    let (line, column) = self.source.position();
                    self.source.bump()?;
                    return Err(ParseError {
                        kind: ParseErrorKind::StrayClosingBrace,
                        line,
                        column,
                        token: Some("}".to_string()),
                    }
                    .into());
                }
                Some(b'{') => {
                    self.source.bump()?;
                    raw.push(b'{');
                    self.read_group(&mut raw, true, start)?;
                }
                Some(b'\\') => {
                    self.source.bump()?;
                    raw.push(b'\\');
                    // only `\"` and `\\` are escapes; braces keep their meaning
                    if let Some(byte @ (b'"' | b'\\')) = self.source.peek()? {
                        self.source.bump()?;
                        raw.push(byte);
                    }
                }
                Some(byte) => {
                    self.source.bump()?;
                    raw.push(byte);
                }
            }
        }
        Ok(Token {
            value: fold_whitespace(&raw, false),
            line: start.0,
            column: start.1,
            kind: TokenKind::Value,
        })
    }
}

impl<R: Read> Iterator for Tokenizer<R> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

fn unterminated(raw: &[u8], (line, column): (usize, usize)) -> ParseError {
    let partial = String::from_utf8_lossy(raw).into_owned();
    ParseError {
        kind: ParseErrorKind::UnterminatedValue {
            partial: partial.clone(),
        },
        line,
        column,
        token: Some(partial),
    }
}

/// Whitespace runs spanning a line break become a single space.
/// Other runs are kept as they are.
fn fold_whitespace(raw: &[u8], trim: bool) -> String {
    let text = String::from_utf8_lossy(raw);
    let mut folded = String::with_capacity(text.len());
    let mut run = String::new();
    for chr in text.chars() {
        if chr.is_whitespace() {
            run.push(chr);
            continue;
        }
        flush_run(&mut folded, &mut run);
        folded.push(chr);
    }
    flush_run(&mut folded, &mut run);

    if trim {
        folded.trim().to_string()
    } else {
        folded
    }
}

fn flush_run(folded: &mut String, run: &mut String) {
    if run.contains('\n') {
        folded.push(' ');
    } else {
        folded.push_str(run);
    }
    run.clear();
}
