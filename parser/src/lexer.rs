use crate::token::{Keyword, Punct, Token};
use std::str::Chars;

#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("unexpected character '{0}' at byte offset {1}")]
    UnexpectedChar(char, usize),
    #[error("unterminated string literal starting at byte offset {0}")]
    UnterminatedString(usize),
    #[error("invalid number literal at byte offset {0}")]
    InvalidNumber(usize),
}

/// The quasis and embedded-expression source slices of a template literal,
/// as produced by [`Lexer::lex_template_literal`].
#[derive(Debug, Clone, Default)]
pub struct TemplateRaw {
    pub quasis: Vec<String>,
    pub expr_sources: Vec<String>,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Chars<'a>,
    peeked: Option<char>,
    pub index: usize,
    /// True when a newline was consumed since the last emitted token;
    /// used by the parser for automatic semicolon insertion.
    pub newline_before: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut chars = source.chars();
        let peeked = chars.next();
        Lexer {
            source,
            chars,
            peeked,
            index: 0,
            newline_before: false,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peeked?;
        self.index += c.len_utf8();
        self.peeked = self.chars.next();
        Some(c)
    }

    fn peek(&self) -> Option<char> {
        self.peeked
    }

    pub fn peek_char(&self) -> Option<char> {
        self.peeked
    }

    fn peek2(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn skip_trivia(&mut self) {
        self.newline_before = false;
        loop {
            match self.peek() {
                Some(c) if c == '\n' => {
                    self.newline_before = true;
                    self.bump();
                }
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    self.bump();
                    self.bump();
                    while let Some(c) = self.peek() {
                        if c == '*' && self.peek2() == Some('/') {
                            self.bump();
                            self.bump();
                            break;
                        }
                        if c == '\n' {
                            self.newline_before = true;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia();
        let start = self.index;
        let Some(c) = self.peek() else {
            return Ok(Token::Eof);
        };

        if c.is_ascii_digit() || (c == '.' && self.peek2().is_some_and(|d| d.is_ascii_digit())) {
            return self.lex_number(start);
        }
        if c == '"' || c == '\'' {
            return self.lex_string(c, start);
        }
        if c == '`' {
            return self.lex_template_chunk(start);
        }
        if is_ident_start(c) {
            return Ok(self.lex_identifier());
        }

        self.lex_punct(start)
    }

    fn lex_number(&mut self, start: usize) -> Result<Token, LexError> {
        let mut saw_dot = false;
        let mut saw_exp = false;
        if self.peek() == Some('0') && matches!(self.peek2(), Some('x') | Some('X')) {
            self.bump();
            self.bump();
            let hex_start = self.index;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let text = &self.source[hex_start..self.index];
            if self.peek() == Some('n') {
                self.bump();
                return Ok(Token::BigIntLiteral(format!("0x{text}")));
            }
            let value = i64::from_str_radix(text, 16).map_err(|_| LexError::InvalidNumber(start))?;
            return Ok(Token::Number(value as f64));
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else if c == '.' && !saw_dot {
                saw_dot = true;
                self.bump();
            } else if (c == 'e' || c == 'E')
                && matches!(self.peek2(), Some(d) if d.is_ascii_digit() || d == '+' || d == '-')
            {
                saw_exp = true;
                self.bump();
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.source[start..self.index];
        // A trailing `n` on an integer literal with no seen `.`/exponent is a
        // BigInt literal (`123n`); it is not representable as `Token::Number`.
        if !saw_dot && !saw_exp && self.peek() == Some('n') {
            self.bump();
            return Ok(Token::BigIntLiteral(text.to_string()));
        }
        let value: f64 = text.parse().map_err(|_| LexError::InvalidNumber(start))?;
        Ok(Token::Number(value))
    }

    fn lex_string(&mut self, quote: char, start: usize) -> Result<Token, LexError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(LexError::UnterminatedString(start)),
                Some(c) if c == quote => break,
                Some('\\') => {
                    if let Some(escaped) = self.bump() {
                        out.push(unescape(escaped));
                    }
                }
                Some(c) => out.push(c),
            }
        }
        Ok(Token::String(out))
    }

    /// Flattens a template literal into a single string token. Embedded
    /// `${...}` substitutions are dropped; callers that need them should
    /// use [`Lexer::lex_template_literal`] directly instead of going
    /// through the token stream.
    fn lex_template_chunk(&mut self, start: usize) -> Result<Token, LexError> {
        let raw = self.lex_template_literal(start)?;
        Ok(Token::TemplateChunk(raw.quasis.join("")))
    }

    /// Scans a whole template literal, splitting it into quasis and the raw
    /// source text of each `${...}` substitution. Substitution source is
    /// handed back to the parser, which re-enters it with a fresh `Lexer`.
    /// Brace nesting is tracked so a substitution may itself contain object
    /// literals; a template literal nested inside a substitution is not
    /// specially handled and contributes to the same brace count as any
    /// other pair of braces, which is sufficient for the common case of
    /// tagged templates and interpolation without deeply nested templates.
    pub fn lex_template_literal(&mut self, start: usize) -> Result<TemplateRaw, LexError> {
        self.bump(); // opening `
        let mut quasis = Vec::new();
        let mut expr_sources = Vec::new();
        let mut current = String::new();
        loop {
            match self.peek() {
                None => return Err(LexError::UnterminatedString(start)),
                Some('`') => {
                    self.bump();
                    quasis.push(current);
                    break;
                }
                Some('\\') => {
                    self.bump();
                    if let Some(escaped) = self.bump() {
                        current.push(unescape(escaped));
                    }
                }
                Some('$') if self.peek2() == Some('{') => {
                    self.bump();
                    self.bump();
                    quasis.push(std::mem::take(&mut current));
                    let expr_start = self.index;
                    let mut depth = 1usize;
                    loop {
                        match self.peek() {
                            None => return Err(LexError::UnterminatedString(start)),
                            Some('{') => {
                                depth += 1;
                                self.bump();
                            }
                            Some('}') => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                                self.bump();
                            }
                            Some(_) => {
                                self.bump();
                            }
                        }
                    }
                    expr_sources.push(self.source[expr_start..self.index].to_string());
                    self.bump(); // closing }
                }
                Some(c) => {
                    self.bump();
                    current.push(c);
                }
            }
        }
        Ok(TemplateRaw {
            quasis,
            expr_sources,
        })
    }

    fn lex_identifier(&mut self) -> Token {
        let start = self.index;
        while self.peek().is_some_and(is_ident_continue) {
            self.bump();
        }
        let text = &self.source[start..self.index];
        match Keyword::lookup(text) {
            Some(kw) => Token::Keyword(kw),
            None => Token::Identifier(text.to_string()),
        }
    }

    fn lex_punct(&mut self, start: usize) -> Result<Token, LexError> {
        use Punct::*;
        macro_rules! two {
            ($second:expr, $if_match:expr, $otherwise:expr) => {{
                self.bump();
                if self.peek() == Some($second) {
                    self.bump();
                    $if_match
                } else {
                    $otherwise
                }
            }};
        }
        let c = self.peek().unwrap();
        let p = match c {
            '(' => {
                self.bump();
                LParen
            }
            ')' => {
                self.bump();
                RParen
            }
            '{' => {
                self.bump();
                LBrace
            }
            '}' => {
                self.bump();
                RBrace
            }
            '[' => {
                self.bump();
                LBracket
            }
            ']' => {
                self.bump();
                RBracket
            }
            ';' => {
                self.bump();
                Semi
            }
            ',' => {
                self.bump();
                Comma
            }
            ':' => {
                self.bump();
                Colon
            }
            '~' => {
                self.bump();
                Tilde
            }
            '.' => {
                self.bump();
                if self.peek() == Some('.') && self.peek2() == Some('.') {
                    self.bump();
                    self.bump();
                    DotDotDot
                } else {
                    Dot
                }
            }
            '?' => {
                self.bump();
                match self.peek() {
                    Some('.') => {
                        self.bump();
                        QuestionDot
                    }
                    Some('?') => {
                        self.bump();
                        if self.peek() == Some('=') {
                            self.bump();
                            QuestionQuestionEq
                        } else {
                            QuestionQuestion
                        }
                    }
                    _ => QuestionMark,
                }
            }
            '+' => {
                self.bump();
                match self.peek() {
                    Some('+') => {
                        self.bump();
                        PlusPlus
                    }
                    Some('=') => {
                        self.bump();
                        PlusEq
                    }
                    _ => Plus,
                }
            }
            '-' => {
                self.bump();
                match self.peek() {
                    Some('-') => {
                        self.bump();
                        MinusMinus
                    }
                    Some('=') => {
                        self.bump();
                        MinusEq
                    }
                    _ => Minus,
                }
            }
            '*' => {
                self.bump();
                match self.peek() {
                    Some('*') => {
                        self.bump();
                        if self.peek() == Some('=') {
                            self.bump();
                            StarStarEq
                        } else {
                            StarStar
                        }
                    }
                    Some('=') => {
                        self.bump();
                        StarEq
                    }
                    _ => Star,
                }
            }
            '/' => two!('=', SlashEq, Slash),
            '%' => two!('=', PercentEq, Percent),
            '^' => two!('=', CaretEq, Caret),
            '!' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        BangEqEq
                    } else {
                        BangEq
                    }
                } else {
                    Bang
                }
            }
            '=' => {
                self.bump();
                match self.peek() {
                    Some('=') => {
                        self.bump();
                        if self.peek() == Some('=') {
                            self.bump();
                            EqEqEq
                        } else {
                            EqEq
                        }
                    }
                    Some('>') => {
                        self.bump();
                        Arrow
                    }
                    _ => Eq,
                }
            }
            '&' => {
                self.bump();
                match self.peek() {
                    Some('&') => {
                        self.bump();
                        if self.peek() == Some('=') {
                            self.bump();
                            AmpAmpEq
                        } else {
                            AmpAmp
                        }
                    }
                    Some('=') => {
                        self.bump();
                        AmpEq
                    }
                    _ => Amp,
                }
            }
            '|' => {
                self.bump();
                match self.peek() {
                    Some('|') => {
                        self.bump();
                        if self.peek() == Some('=') {
                            self.bump();
                            PipePipeEq
                        } else {
                            PipePipe
                        }
                    }
                    Some('=') => {
                        self.bump();
                        PipeEq
                    }
                    _ => Pipe,
                }
            }
            '<' => {
                self.bump();
                match self.peek() {
                    Some('=') => {
                        self.bump();
                        LtEq
                    }
                    Some('<') => {
                        self.bump();
                        if self.peek() == Some('=') {
                            self.bump();
                            ShlEq
                        } else {
                            Shl
                        }
                    }
                    _ => Lt,
                }
            }
            '>' => {
                self.bump();
                match self.peek() {
                    Some('=') => {
                        self.bump();
                        GtEq
                    }
                    Some('>') => {
                        self.bump();
                        match self.peek() {
                            Some('>') => {
                                self.bump();
                                if self.peek() == Some('=') {
                                    self.bump();
                                    UShrEq
                                } else {
                                    UShr
                                }
                            }
                            Some('=') => {
                                self.bump();
                                ShrEq
                            }
                            _ => Shr,
                        }
                    }
                    _ => Gt,
                }
            }
            other => return Err(LexError::UnexpectedChar(other, start)),
        };
        Ok(Token::Punct(p))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        'b' => '\u{8}',
        'f' => '\u{c}',
        'v' => '\u{b}',
        other => other,
    }
}
