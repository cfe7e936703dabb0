//! Lisp reader.
//!
//! Supports: integers, floats, strings (with escapes), symbols, keywords,
//! character literals (?a), lists, dotted pairs, quote ('), function (#'),
//! backquote (`), unquote (,), splice (,@), line comments (;) and block
//! comments (#|..|#).

use super::expr::{Expr, ParseError};
use super::intern::intern;

pub fn parse_forms(input: &str) -> Result<Vec<Expr>, ParseError> {
    let mut parser = Parser::new(input);
    let mut forms = Vec::new();
    while parser.skip_ws_and_comments() {
        forms.push(parser.parse_expr()?);
    }
    Ok(forms)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    // -- Whitespace & comments -----------------------------------------------

    fn skip_ws_and_comments(&mut self) -> bool {
        loop {
            let Some(ch) = self.current() else {
                return false;
            };
            if ch.is_whitespace() {
                self.bump();
                continue;
            }
            if ch == ';' {
                while let Some(c) = self.current() {
                    self.bump();
                    if c == '\n' {
                        break;
                    }
                }
                continue;
            }
            if ch == '#' && self.peek_at(1) == Some('|') {
                self.bump();
                self.bump();
                let mut depth = 1;
                while depth > 0 {
                    match self.current() {
                        None => return false,
                        Some('#') if self.peek_at(1) == Some('|') => {
                            self.bump();
                            self.bump();
                            depth += 1;
                        }
                        Some('|') if self.peek_at(1) == Some('#') => {
                            self.bump();
                            self.bump();
                            depth -= 1;
                        }
                        _ => self.bump(),
                    }
                }
                continue;
            }
            return true;
        }
    }

    // -- Main parse dispatch -------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.skip_ws_and_comments();
        let Some(ch) = self.current() else {
            return Err(self.error("unexpected end of input"));
        };

        match ch {
            '(' => self.parse_list_or_dotted(),
            ')' => Err(self.error("unexpected ')'")),
            '\'' => self.parse_prefixed("quote", 1),
            '`' => self.parse_prefixed("`", 1),
            ',' => {
                if self.peek_at(1) == Some('@') {
                    self.parse_prefixed(",@", 2)
                } else {
                    self.parse_prefixed(",", 1)
                }
            }
            '"' => self.parse_string(),
            '?' => self.parse_char_literal(),
            '#' if self.peek_at(1) == Some('\'') => self.parse_prefixed("function", 2),
            _ => self.parse_atom(),
        }
    }

    fn parse_prefixed(&mut self, head: &str, width: usize) -> Result<Expr, ParseError> {
        for _ in 0..width {
            self.bump();
        }
        let quoted = self.parse_expr()?;
        Ok(Expr::List(vec![Expr::Symbol(intern(head)), quoted]))
    }

    // -- Lists and dotted pairs ----------------------------------------------

    fn parse_list_or_dotted(&mut self) -> Result<Expr, ParseError> {
        self.expect('(')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws_and_comments();
            match self.current() {
                Some(')') => {
                    self.bump();
                    return Ok(Expr::List(items));
                }
                Some('.') if self.is_dot_separator() && !items.is_empty() => {
                    self.bump();
                    let cdr = self.parse_expr()?;
                    self.skip_ws_and_comments();
                    match self.current() {
                        Some(')') => {
                            self.bump();
                            return Ok(match cdr {
                                Expr::List(tail) => {
                                    items.extend(tail);
                                    Expr::List(items)
                                }
                                Expr::Symbol(id) if id == intern("nil") => Expr::List(items),
                                other => Expr::DottedList(items, Box::new(other)),
                            });
                        }
                        _ => return Err(self.error("expected ')' after dotted pair")),
                    }
                }
                Some(_) => items.push(self.parse_expr()?),
                None => return Err(self.error("unterminated list")),
            }
        }
    }

    /// A '.' is a separator if followed by whitespace, a paren, or EOF.
    fn is_dot_separator(&self) -> bool {
        match self.peek_at(1) {
            None => true,
            Some(c) => c.is_whitespace() || c == ')' || c == '(' || c == ';',
        }
    }

    // -- Strings "..." -------------------------------------------------------

    fn parse_string(&mut self) -> Result<Expr, ParseError> {
        self.expect('"')?;
        let mut s = String::new();
        loop {
            let Some(ch) = self.current() else {
                return Err(self.error("unterminated string"));
            };
            self.bump();
            match ch {
                '"' => return Ok(Expr::Str(s)),
                '\\' => {
                    let Some(esc) = self.current() else {
                        return Err(self.error("unterminated escape in string"));
                    };
                    self.bump();
                    match esc {
                        'n' => s.push('\n'),
                        'r' => s.push('\r'),
                        't' => s.push('\t'),
                        'e' => s.push('\x1B'),
                        'a' => s.push('\x07'),
                        's' => s.push(' '),
                        // Escaped newline is a line continuation.
                        '\n' => {}
                        'x' => {
                            let code = self.read_hex_digits()?;
                            match char::from_u32(code) {
                                Some(c) => s.push(c),
                                None => return Err(self.error("invalid \\x escape")),
                            }
                        }
                        other => s.push(other),
                    }
                }
                other => s.push(other),
            }
        }
    }

    fn read_hex_digits(&mut self) -> Result<u32, ParseError> {
        let start = self.pos;
        while matches!(self.current(), Some(c) if c.is_ascii_hexdigit()) {
            self.bump();
        }
        let code = u32::from_str_radix(&self.input[start..self.pos], 16)
            .map_err(|_| self.error("invalid hex escape"))?;
        // `\ ` terminates a hex escape early.
        if self.current() == Some('\\') && self.peek_at(1) == Some(' ') {
            self.bump();
            self.bump();
        }
        Ok(code)
    }

    // -- Characters ?a -------------------------------------------------------

    fn parse_char_literal(&mut self) -> Result<Expr, ParseError> {
        self.expect('?')?;
        let Some(ch) = self.current() else {
            return Err(self.error("unterminated character literal"));
        };
        self.bump();
        let code = if ch == '\\' {
            let Some(esc) = self.current() else {
                return Err(self.error("unterminated character escape"));
            };
            self.bump();
            match esc {
                'n' => '\n' as u32,
                't' => '\t' as u32,
                'r' => '\r' as u32,
                'e' => 0x1B,
                's' => ' ' as u32,
                'a' => 0x07,
                'x' => self.read_hex_digits()?,
                other => other as u32,
            }
        } else {
            ch as u32
        };
        Ok(Expr::Int(i64::from(code)))
    }

    // -- Atoms ---------------------------------------------------------------

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let mut token = String::new();
        let mut had_escape = false;
        while let Some(ch) = self.current() {
            if ch.is_whitespace() || matches!(ch, '(' | ')' | '\'' | '`' | ',' | '"' | ';') {
                break;
            }
            if ch == '\\' {
                had_escape = true;
                self.bump();
                match self.current() {
                    Some(escaped) => {
                        token.push(escaped);
                        self.bump();
                    }
                    None => token.push('\\'),
                }
                continue;
            }
            token.push(ch);
            self.bump();
        }

        if token.is_empty() {
            return Err(self.error("expected atom"));
        }
        if had_escape {
            return Ok(Expr::Symbol(intern(&token)));
        }

        if token.starts_with(':') && token.len() > 1 {
            return Ok(Expr::Keyword(intern(&token)));
        }
        if let Ok(n) = token.parse::<i64>() {
            return Ok(Expr::Int(n));
        }
        if looks_like_float(&token) {
            if let Ok(f) = token.parse::<f64>() {
                return Ok(Expr::Float(f));
            }
        }
        Ok(Expr::Symbol(intern(&token)))
    }

    // -- Helpers -------------------------------------------------------------

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        match self.current() {
            Some(ch) if ch == expected => {
                self.bump();
                Ok(())
            }
            _ => Err(self.error(&format!("expected '{}'", expected))),
        }
    }

    fn current(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn bump(&mut self) {
        if let Some(ch) = self.current() {
            self.pos += ch.len_utf8();
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError {
            position: self.pos,
            message: message.to_string(),
        }
    }
}

fn looks_like_float(s: &str) -> bool {
    let s = s.strip_prefix(|c| c == '+' || c == '-').unwrap_or(s);
    let Some(first) = s.bytes().next() else {
        return false;
    };
    if !first.is_ascii_digit() && first != b'.' {
        return false;
    }
    s.contains('.') || s.contains('e') || s.contains('E')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Expr {
        Expr::Symbol(intern(name))
    }

    #[test]
    fn parse_integers_and_floats() {
        let forms = parse_forms("42 -7 3.5 .5 1e3").unwrap();
        assert_eq!(
            forms,
            vec![
                Expr::Int(42),
                Expr::Int(-7),
                Expr::Float(3.5),
                Expr::Float(0.5),
                Expr::Float(1000.0),
            ]
        );
    }

    #[test]
    fn parse_strings_with_escapes() {
        let forms = parse_forms(r#""a\nb" "q\"x" "\x41\ B""#).unwrap();
        assert_eq!(
            forms,
            vec![
                Expr::Str("a\nb".into()),
                Expr::Str("q\"x".into()),
                Expr::Str("AB".into()),
            ]
        );
    }

    #[test]
    fn parse_quote_shorthands() {
        let forms = parse_forms("'x #'car").unwrap();
        assert_eq!(forms[0], Expr::List(vec![sym("quote"), sym("x")]));
        assert_eq!(forms[1], Expr::List(vec![sym("function"), sym("car")]));
    }

    #[test]
    fn parse_dotted_pairs() {
        let forms = parse_forms("(a . b) (a . (b c)) (a . nil)").unwrap();
        assert_eq!(
            forms[0],
            Expr::DottedList(vec![sym("a")], Box::new(sym("b")))
        );
        assert_eq!(forms[1], Expr::List(vec![sym("a"), sym("b"), sym("c")]));
        assert_eq!(forms[2], Expr::List(vec![sym("a")]));
    }

    #[test]
    fn parse_chars_keywords_and_comments() {
        let forms = parse_forms("?a ?\\n :key ; trailing\n#| block |# foo").unwrap();
        assert_eq!(
            forms,
            vec![
                Expr::Int(97),
                Expr::Int(10),
                Expr::Keyword(intern(":key")),
                sym("foo"),
            ]
        );
    }

    #[test]
    fn parse_errors_report_position() {
        let err = parse_forms("(a b").unwrap_err();
        assert_eq!(err.message, "unterminated list");
        assert!(parse_forms(")").is_err());
        assert!(parse_forms("\"open").is_err());
    }
}
