//! Lexical analysis of one input line.
//!
//! The lexer is a small finite state machine that walks the line once, left to
//! right. Quoting only suppresses word splitting and operator recognition; it
//! never introduces a token boundary by itself, so `a'b c'd` is the single
//! word `ab cd`.
//!
//! Operators are classified here and nowhere else: downstream stages match on
//! [`Token`] variants instead of comparing strings, so a quoted `">"` or `"|"`
//! can never be mistaken for an operator.

use std::fmt;

/// Standard stream targeted by a redirection operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// How a redirection target is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// `>`: truncate the target.
    #[default]
    Overwrite,
    /// `>>`: append to the target, creating it first if needed.
    Append,
}

/// A redirection operator such as `>`, `1>>`, `2>` or `2>>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectOp {
    pub stream: Stream,
    pub mode: Mode,
}

impl fmt::Display for RedirectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stream == Stream::Stderr {
            f.write_str("2")?;
        }
        match self.mode {
            Mode::Overwrite => f.write_str(">"),
            Mode::Append => f.write_str(">>"),
        }
    }
}

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word with all quoting and escaping already removed. May be empty (`''`).
    Word(String),
    /// The pipe operator, `|`, written as a standalone token.
    Pipe,
    /// An output redirection operator.
    Redirect(RedirectOp),
}

impl Token {
    /// Surface form of the token, used in diagnostics.
    pub fn text(&self) -> String {
        match self {
            Token::Word(w) => w.clone(),
            Token::Pipe => "|".to_string(),
            Token::Redirect(op) => op.to_string(),
        }
    }
}

/// Result of lexing a whole line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    /// The quote character that was still open when the line ended, if any.
    pub open_quote: Option<char>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    out: Vec<Token>,
    buffer: String,
    /// Set once the current word has any content, including an empty quoted span.
    word_started: bool,
    /// Set when any part of the current word was quoted or escaped.
    word_quoted: bool,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            out: Vec::new(),
            buffer: String::new(),
            word_started: false,
            word_quoted: false,
        }
    }

    fn make_tokens(mut self) -> Lexed {
        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start | LexingState::ReadingWord => self.handle_unquoted(ch),
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch),
            }
        }

        let open_quote = match self.state {
            LexingState::ReadingSingleQuote => Some('\''),
            LexingState::ReadingDoubleQuote => Some('"'),
            _ => None,
        };

        self.finish_word();
        Lexed {
            tokens: self.out,
            open_quote,
        }
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_unquoted(&mut self, ch: char) {
        match ch {
            ' ' | '\t' => {
                self.finish_word();
                self.state = LexingState::Start;
            }
            '\'' => self.open_quote(LexingState::ReadingSingleQuote),
            '"' => self.open_quote(LexingState::ReadingDoubleQuote),
            '\\' => {
                // A trailing backslash has nothing to escape and stays literal.
                match self.read_char() {
                    Some(escaped) => {
                        self.buffer.push(escaped);
                        self.word_quoted = true;
                    }
                    None => self.buffer.push('\\'),
                }
                self.word_started = true;
                self.state = LexingState::ReadingWord;
            }
            '|' if self.state == LexingState::Start && self.at_separator() => {
                self.out.push(Token::Pipe);
            }
            '>' => self.handle_redirect(),
            c => {
                self.buffer.push(c);
                self.word_started = true;
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' => match self.peek_char() {
                Some(next @ ('"' | '\\' | '$' | '`')) => {
                    self.read_char();
                    self.buffer.push(next);
                }
                _ => self.buffer.push('\\'),
            },
            c => self.buffer.push(c),
        }
    }

    fn open_quote(&mut self, state: LexingState) {
        self.word_started = true;
        self.word_quoted = true;
        self.state = state;
    }

    /// `>` was read outside quotes. A bare `1` or `2` directly before it is the
    /// stream selector; any other pending text is a word of its own.
    fn handle_redirect(&mut self) {
        let stream = match self.buffer.as_str() {
            "2" if !self.word_quoted => Some(Stream::Stderr),
            "1" if !self.word_quoted => Some(Stream::Stdout),
            _ => None,
        };
        let stream = match stream {
            Some(stream) => {
                self.reset_word();
                stream
            }
            None => {
                self.finish_word();
                Stream::Stdout
            }
        };

        let mode = if self.peek_char() == Some('>') {
            self.read_char();
            Mode::Append
        } else {
            Mode::Overwrite
        };

        self.out.push(Token::Redirect(RedirectOp { stream, mode }));
        self.state = LexingState::Start;
    }

    /// True when the character just read is followed by whitespace or the end of line.
    fn at_separator(&self) -> bool {
        matches!(self.peek_char(), None | Some(' ') | Some('\t'))
    }

    fn finish_word(&mut self) {
        if self.word_started {
            self.out.push(Token::Word(std::mem::take(&mut self.buffer)));
        }
        self.reset_word();
    }

    fn reset_word(&mut self) {
        self.buffer.clear();
        self.word_started = false;
        self.word_quoted = false;
    }
}

/// Lex a line, reporting an unterminated quote instead of failing on it.
pub fn lex(line: &str) -> Lexed {
    LexingFSM::new(line).make_tokens()
}

/// Split a line into tokens.
///
/// Never fails: a quote left open at the end of the line is closed implicitly.
/// Use [`lex`] when the caller needs to know about it.
pub fn tokenize(line: &str) -> Vec<Token> {
    lex(line).tokens
}
