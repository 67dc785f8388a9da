use crate::error::LexError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Not,
    True,
    False,
    If,
    Else,
    Div,
    Mod,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Dot,
    Colon,
    /// `<-`
    Arrow,
    /// `:-`
    RuleArrow,
    Plus,
    Minus,
    /// `-+`
    MinusPlus,
    Bang,
    DoubleBang,
    Question,
    At,
    Tilde,
    Pipe,
    Amp,
    Hash,
    Eq,
    EqEq,
    /// `\==`
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    Star,
    Slash,

    String(String),
    Number(f64),
    /// Lower-case identifier
    Atom(String),
    /// Upper-case or `_`-prefixed identifier
    Var(String),
    /// `.name`, an internal action
    Internal(String),
    Eof,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::String(s) => format!("string \"{}\"", s),
            Token::Number(n) => format!("number {}", n),
            Token::Atom(a) => format!("atom '{}'", a),
            Token::Var(v) => format!("variable '{}'", v),
            Token::Internal(i) => format!("internal action '.{}'", i),
            Token::Eof => "end of input".to_string(),
            other => format!("{:?}", other),
        }
    }
}

/// Token with the position of its first character (1-based).
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub col: usize,
}

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.input.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if let Some(c) = ch {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        ch
    }

    fn skip_whitespace(&mut self) -> Result<(), LexError> {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '/' && self.peek_next() == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch == '/' && self.peek_next() == Some('*') {
                let (line, col) = (self.line, self.col);
                self.advance();
                self.advance();
                loop {
                    match self.peek() {
                        Some('*') if self.peek_next() == Some('/') => {
                            self.advance();
                            self.advance();
                            break;
                        }
                        Some(_) => {
                            self.advance();
                        }
                        None => return Err(LexError::UnterminatedComment { line, col }),
                    }
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    fn read_string(&mut self) -> Result<String, LexError> {
        let (line, col) = (self.line, self.col);
        self.advance(); // consume opening quote
        let mut s = String::new();

        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    return Ok(s);
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some('r') => s.push('\r'),
                        Some('\\') => s.push('\\'),
                        Some('"') => s.push('"'),
                        _ => {}
                    }
                    self.advance();
                }
                Some(ch) => {
                    s.push(ch);
                    self.advance();
                }
                None => return Err(LexError::UnterminatedString { line, col }),
            }
        }
    }

    fn read_number(&mut self) -> Result<f64, LexError> {
        let (line, col) = (self.line, self.col);
        let mut s = String::new();

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                s.push(ch);
                self.advance();
            } else if ch == '.' && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
                // `1.` ends a clause, `1.5` is a number
                s.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        s.parse().map_err(|_| LexError::InvalidNumber { line, col })
    }

    fn read_ident(&mut self) -> String {
        let mut s = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                s.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        s
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    /// Consumes the current character and, when the next one is `next`, that
    /// one too.
    fn pair(&mut self, next: char, double: Token, single: Token) -> Token {
        self.advance();
        if self.peek() == Some(next) {
            self.advance();
            double
        } else {
            single
        }
    }

    pub fn next_token(&mut self) -> Result<Spanned, LexError> {
        self.skip_whitespace()?;
        let (line, col) = (self.line, self.col);

        let Some(ch) = self.peek() else {
            return Ok(Spanned {
                token: Token::Eof,
                line,
                col,
            });
        };

        let token = match ch {
            '(' => self.single(Token::LParen),
            ')' => self.single(Token::RParen),
            '[' => self.single(Token::LBracket),
            ']' => self.single(Token::RBracket),
            '{' => self.single(Token::LBrace),
            '}' => self.single(Token::RBrace),
            ',' => self.single(Token::Comma),
            ';' => self.single(Token::Semicolon),
            '?' => self.single(Token::Question),
            '@' => self.single(Token::At),
            '~' => self.single(Token::Tilde),
            '|' => self.single(Token::Pipe),
            '&' => self.single(Token::Amp),
            '#' => self.single(Token::Hash),
            '+' => self.single(Token::Plus),
            '*' => self.single(Token::Star),
            '/' => self.single(Token::Slash),
            '.' => {
                self.advance();
                if self.peek().is_some_and(|c| c.is_ascii_lowercase()) {
                    Token::Internal(self.read_ident())
                } else {
                    Token::Dot
                }
            }
            ':' => self.pair('-', Token::RuleArrow, Token::Colon),
            '-' => self.pair('+', Token::MinusPlus, Token::Minus),
            '!' => self.pair('!', Token::DoubleBang, Token::Bang),
            '=' => self.pair('=', Token::EqEq, Token::Eq),
            '>' => self.pair('=', Token::Ge, Token::Gt),
            '<' => {
                self.advance();
                match self.peek() {
                    Some('-') => {
                        self.advance();
                        Token::Arrow
                    }
                    Some('=') => {
                        self.advance();
                        Token::Le
                    }
                    _ => Token::Lt,
                }
            }
            '\\' => {
                self.advance();
                if self.peek() == Some('=') && self.peek_next() == Some('=') {
                    self.advance();
                    self.advance();
                    Token::NotEq
                } else {
                    return Err(LexError::UnexpectedChar { ch: '\\', line, col });
                }
            }
            '"' => Token::String(self.read_string()?),
            c if c.is_ascii_digit() => Token::Number(self.read_number()?),
            c if c.is_uppercase() || c == '_' => Token::Var(self.read_ident()),
            c if c.is_alphabetic() => {
                let ident = self.read_ident();
                match ident.as_str() {
                    "not" => Token::Not,
                    "true" => Token::True,
                    "false" => Token::False,
                    "if" => Token::If,
                    "else" => Token::Else,
                    "div" => Token::Div,
                    "mod" => Token::Mod,
                    _ => Token::Atom(ident),
                }
            }
            _ => return Err(LexError::UnexpectedChar { ch, line, col }),
        };

        Ok(Spanned { token, line, col })
    }

    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_token()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                break;
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_lexer_plan() {
        let toks = tokens("+!goal <- .send(b, tell, done).");
        assert_eq!(
            toks,
            vec![
                Token::Plus,
                Token::Bang,
                Token::Atom("goal".into()),
                Token::Arrow,
                Token::Internal("send".into()),
                Token::LParen,
                Token::Atom("b".into()),
                Token::Comma,
                Token::Atom("tell".into()),
                Token::Comma,
                Token::Atom("done".into()),
                Token::RParen,
                Token::Dot,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers_and_clause_dots() {
        assert_eq!(
            tokens("battery(1.5). x(2)."),
            vec![
                Token::Atom("battery".into()),
                Token::LParen,
                Token::Number(1.5),
                Token::RParen,
                Token::Dot,
                Token::Atom("x".into()),
                Token::LParen,
                Token::Number(2.0),
                Token::RParen,
                Token::Dot,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("-+ :- <= >= \\== == !! < -"),
            vec![
                Token::MinusPlus,
                Token::RuleArrow,
                Token::Le,
                Token::Ge,
                Token::NotEq,
                Token::EqEq,
                Token::DoubleBang,
                Token::Lt,
                Token::Minus,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_variables_and_keywords() {
        assert_eq!(
            tokens("X _ _Tmp not div"),
            vec![
                Token::Var("X".into()),
                Token::Var("_".into()),
                Token::Var("_Tmp".into()),
                Token::Not,
                Token::Div,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            tokens("// line\n/* block\n comment */ ok"),
            vec![Token::Atom("ok".into()), Token::Eof]
        );
    }

    #[test]
    fn test_positions() {
        let toks = Lexer::new("a.\n  b.").tokenize().unwrap();
        assert_eq!((toks[2].line, toks[2].col), (2, 3));
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("x(\"abc").tokenize().unwrap_err();
        assert_eq!(err, LexError::UnterminatedString { line: 1, col: 3 });
    }
}
