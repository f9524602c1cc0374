/*
 * lexer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tokenizer for artifact text.
//!
//! Outside code blocks everything is a [`Token::Text`]. Inside `<?tpl ... ?>`
//! the usual expression tokens are produced; the closing tag becomes
//! [`Token::CloseTag`], which also terminates a statement.

use super::SyntaxError;

pub const OPEN_TAG: &str = "<?tpl";
pub const CLOSE_TAG: &str = "?>";

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    CloseTag,

    Var(String),
    Ident(String),
    Int(i64),
    Float(f64),
    /// Single-quoted string, escapes already processed.
    Str(String),
    /// Double-quoted string, split into literal and variable parts.
    Template(Vec<StrPart>),

    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Colon,
    Question,
    Coalesce,
    Arrow,
    DoubleArrow,
    Assign,
    Eq,
    NotEq,
    Identical,
    NotIdentical,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Dot,
    Not,
    AndAnd,
    OrOr,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    Lit(String),
    Var(String),
}

/// A token with the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, SyntaxError> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Spanned>,
}

impl Lexer {
    fn run(&mut self) -> Result<(), SyntaxError> {
        while self.pos < self.chars.len() {
            if self.text() {
                self.code()?;
            }
        }
        self.push(Token::Eof, self.line);
        Ok(())
    }

    fn push(&mut self, token: Token, line: usize) {
        self.tokens.push(Spanned { token, line });
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            line: self.line,
            message: message.into(),
        }
    }

    /// Literal text up to the next open tag. Returns whether an open tag
    /// was found (and consumed).
    fn text(&mut self) -> bool {
        let line = self.line;
        let mut text = String::new();
        let mut opened = false;
        while self.pos < self.chars.len() {
            if self.starts_with(OPEN_TAG) {
                self.pos += OPEN_TAG.len();
                opened = true;
                break;
            }
            if let Some(c) = self.bump() {
                text.push(c);
            }
        }
        if !text.is_empty() {
            self.push(Token::Text(text), line);
        }
        opened
    }

    /// Code tokens up to and including the close tag.
    fn code(&mut self) -> Result<(), SyntaxError> {
        loop {
            self.skip_trivia()?;
            let line = self.line;
            let Some(c) = self.peek() else {
                return Err(self.error("unterminated code block"));
            };

            if self.starts_with(CLOSE_TAG) {
                self.pos += CLOSE_TAG.len();
                self.push(Token::CloseTag, line);
                return Ok(());
            }

            let token = match c {
                '$' => {
                    self.bump();
                    let name = self.ident();
                    if name.is_empty() {
                        return Err(self.error("expected variable name after '$'"));
                    }
                    Token::Var(name)
                }
                c if c.is_ascii_alphabetic() || c == '_' => Token::Ident(self.ident()),
                c if c.is_ascii_digit() => self.number()?,
                '\'' => self.single_quoted()?,
                '"' => self.double_quoted()?,
                _ => self.punct()?,
            };
            self.push(token, line);
        }
    }

    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.pos += 2;
                    loop {
                        if self.starts_with("*/") {
                            self.pos += 2;
                            break;
                        }
                        if self.bump().is_none() {
                            return Err(self.error("unterminated comment"));
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn ident(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        name
    }

    fn number(&mut self) -> Result<Token, SyntaxError> {
        let mut digits = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
            } else if c == '.' && !is_float && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())
            {
                is_float = true;
                digits.push(c);
            } else if matches!(c, 'e' | 'E')
                && (self.peek_at(1).is_some_and(|d| d.is_ascii_digit())
                    || (matches!(self.peek_at(1), Some('+' | '-'))
                        && self.peek_at(2).is_some_and(|d| d.is_ascii_digit())))
            {
                is_float = true;
                digits.push(c);
                self.pos += 1;
                if let Some(sign) = self.peek().filter(|s| matches!(s, '+' | '-')) {
                    digits.push(sign);
                    self.pos += 1;
                }
                continue;
            } else {
                break;
            }
            self.pos += 1;
        }

        if !is_float {
            if let Ok(i) = digits.parse::<i64>() {
                return Ok(Token::Int(i));
            }
        }
        digits
            .parse::<f64>()
            .map(Token::Float)
            .map_err(|_| self.error(format!("invalid number '{digits}'")))
    }

    fn single_quoted(&mut self) -> Result<Token, SyntaxError> {
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('\'') => return Ok(Token::Str(s)),
                Some('\\') => match self.peek() {
                    Some(c @ ('\'' | '\\')) => {
                        s.push(c);
                        self.bump();
                    }
                    _ => s.push('\\'),
                },
                Some(c) => s.push(c),
            }
        }
    }

    fn double_quoted(&mut self) -> Result<Token, SyntaxError> {
        self.bump();
        let mut parts = Vec::new();
        let mut lit = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => break,
                Some('\\') => {
                    let escaped = match self.peek() {
                        Some('n') => Some('\n'),
                        Some('t') => Some('\t'),
                        Some('r') => Some('\r'),
                        Some('0') => Some('\0'),
                        Some(c @ ('"' | '\\' | '$')) => Some(c),
                        _ => None,
                    };
                    match escaped {
                        Some(c) => {
                            lit.push(c);
                            self.bump();
                        }
                        None => lit.push('\\'),
                    }
                }
                Some('$') if self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') => {
                    if !lit.is_empty() {
                        parts.push(StrPart::Lit(std::mem::take(&mut lit)));
                    }
                    parts.push(StrPart::Var(self.ident()));
                }
                Some(c) => lit.push(c),
            }
        }
        if !lit.is_empty() {
            parts.push(StrPart::Lit(lit));
        }
        Ok(match parts.as_slice() {
            [] => Token::Str(String::new()),
            [StrPart::Lit(s)] => Token::Str(s.clone()),
            _ => Token::Template(parts),
        })
    }

    fn punct(&mut self) -> Result<Token, SyntaxError> {
        const TABLE: &[(&str, Token)] = &[
            ("===", Token::Identical),
            ("!==", Token::NotIdentical),
            ("==", Token::Eq),
            ("!=", Token::NotEq),
            ("<>", Token::NotEq),
            ("<=", Token::Le),
            (">=", Token::Ge),
            ("=>", Token::DoubleArrow),
            ("->", Token::Arrow),
            ("??", Token::Coalesce),
            ("&&", Token::AndAnd),
            ("||", Token::OrOr),
            ("(", Token::LParen),
            (")", Token::RParen),
            ("[", Token::LBracket),
            ("]", Token::RBracket),
            (",", Token::Comma),
            (";", Token::Semi),
            (":", Token::Colon),
            ("?", Token::Question),
            ("=", Token::Assign),
            ("<", Token::Lt),
            (">", Token::Gt),
            ("+", Token::Plus),
            ("-", Token::Minus),
            ("*", Token::Star),
            ("/", Token::Slash),
            ("%", Token::Percent),
            (".", Token::Dot),
            ("!", Token::Not),
        ];
        for (text, token) in TABLE {
            if self.starts_with(text) {
                self.pos += text.len();
                return Ok(token.clone());
            }
        }
        let c = self.peek().unwrap_or_default();
        Err(self.error(format!("unexpected character '{c}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_text_and_code() {
        assert_eq!(
            tokens("a<?tpl echo $x; ?>b"),
            vec![
                Token::Text("a".to_string()),
                Token::Ident("echo".to_string()),
                Token::Var("x".to_string()),
                Token::Semi,
                Token::CloseTag,
                Token::Text("b".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            tokens(r#"<?tpl 'it\'s' "a\"b" "hi $name!" ?>"#),
            vec![
                Token::Str("it's".to_string()),
                Token::Str("a\"b".to_string()),
                Token::Template(vec![
                    StrPart::Lit("hi ".to_string()),
                    StrPart::Var("name".to_string()),
                    StrPart::Lit("!".to_string()),
                ]),
                Token::CloseTag,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers_and_operators() {
        assert_eq!(
            tokens("<?tpl 1.5 + 2 !== $a ?? 3e2 ?>"),
            vec![
                Token::Float(1.5),
                Token::Plus,
                Token::Int(2),
                Token::NotIdentical,
                Token::Var("a".to_string()),
                Token::Coalesce,
                Token::Float(300.0),
                Token::CloseTag,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comment_skipped() {
        assert_eq!(
            tokens("<?tpl /* note ?> here */ break; ?>"),
            vec![
                Token::Ident("break".to_string()),
                Token::Semi,
                Token::CloseTag,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_block() {
        let err = tokenize("x\n<?tpl echo 1;").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
