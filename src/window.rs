use std::collections::VecDeque;

use tracing::trace;

use crate::errors::{ParseError, ParseErrorKind, Result};
use crate::lexer::Token;

/// Token source with room to put tokens back in front.
pub struct TokenQueue<I> {
    source: I,
    pending: VecDeque<Token>,
}

impl<I: Iterator<Item = Result<Token>>> TokenQueue<I> {
    pub fn new(source: I) -> Self {
        TokenQueue {
            source,
            pending: VecDeque::new(),
        }
    }

    /// The next call to `next` returns `token` again.
    pub fn push_front(&mut self, token: Token) {
        self.pending.push_front(token);
    }
}

impl<I: Iterator<Item = Result<Token>>> Iterator for TokenQueue<I> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.pending.pop_front() {
            Some(token) => Some(Ok(token)),
            None => self.source.next(),
        }
    }
}

/// Splits a token stream into windows, one per `@` declaration.
///
/// A window starts at `@` and ends with the token which balances all braces
/// and parentheses opened inside it. Tokens outside of any window are
/// comments and dropped. An `@` outside of braces and parentheses always
/// starts a new window, even if the current one was never closed.
///
/// After an error the grouper can be polled again; it resumes at the next `@`.
pub struct WindowGrouper<I> {
    queue: TokenQueue<I>,
}

impl<I: Iterator<Item = Result<Token>>> WindowGrouper<I> {
    pub fn new(tokens: I) -> Self {
        WindowGrouper {
            queue: TokenQueue::new(tokens),
        }
    }

    pub fn next_window(&mut self) -> Result<Option<Vec<Token>>> {
        let at = loop {
            match self.queue.next() {
                None => return Ok(None),
                Some(token) => {
                    let token = token?;
                    if token.is('@') {
                        break token;
                    }
                }
            }
        };

        let (line, column) = (at.line, at.column);
        let mut window = vec![at];
        let mut braces = 0i64;
        let mut parens = 0i64;

        while let Some(token) = self.queue.next() {
            let token = token?;
            if token.is('@') && braces == 0 && parens == 0 {
                self.queue.push_front(token);
                trace!(tokens = window.len(), "window ended by next '@'");
                return Ok(Some(window));
            }

            let closing = if token.is('{') {
                braces += 1;
                false
            } else if token.is('(') {
                parens += 1;
                false
            } else if token.is('}') {
                braces -= 1;
                true
            } else if token.is(')') {
                parens -= 1;
                true
            } else {
                false
            };
            window.push(token);

            // a negative depth can never balance again
            if closing && ((braces <= 0 && parens <= 0) || braces < 0 || parens < 0) {
                trace!(tokens = window.len(), "window closed");
                return Ok(Some(window));
            }
        }

        if braces != 0 || parens != 0 {
            return Err(ParseError {
                kind: ParseErrorKind::UnbalancedDelimiters,
                line,
                column,
                token: Some("@".to_string()),
            }
            .into());
        }
        trace!(tokens = window.len(), "window ended by end of input");
        Ok(Some(window))
    }
}

impl<I: Iterator<Item = Result<Token>>> Iterator for WindowGrouper<I> {
    type Item = Result<Vec<Token>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_window().transpose()
    }
}
