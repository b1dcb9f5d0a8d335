use logos::Logos;

/// Helper function to unescape string and char literals
fn unescape_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('0') => result.push('\0'),
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some(c) => {
                    result.push('\\');
                    result.push(c);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }

    result
}

fn parse_int(s: &str) -> Option<i64> {
    // Trailing underscore means the literal was cut short: "1_" is not a number.
    if s.ends_with('_') {
        return None;
    }
    let digits: String = s.chars().filter(|&c| c != '_').collect();
    digits.parse().ok()
}

fn parse_float(s: &str) -> Option<f64> {
    if s.ends_with('_') || s.contains("_.") || s.contains("._") {
        return None;
    }
    let digits: String = s.chars().filter(|&c| c != '_').collect();
    digits.parse().ok()
}

/// Token types for the Fox programming language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // Keywords
    #[token("fn")]
    Fn,
    #[token("let")]
    Let,
    #[token("const")]
    Const,
    #[token("mut")]
    Mut,
    #[token("struct")]
    Struct,
    #[token("enum")]
    Enum,
    #[token("impl")]
    Impl,
    #[token("trait")]
    Trait,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("match")]
    Match,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("return")]
    Return,
    #[token("defer")]
    Defer,
    #[token("import")]
    Import,
    #[token("as")]
    As,
    #[token("noinit")]
    Noinit,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("print")]
    Print,
    #[token("puts")]
    Puts,

    // Compound assignment operators (must come before single operators)
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,

    // Operators
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("=>")]
    FatArrow,
    #[token("=")]
    Eq,
    #[token("!")]
    Not,
    #[token("&")]
    Ampersand,
    #[token("->")]
    Arrow,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token("::")]
    ColonColon,
    #[token(":")]
    Colon,
    #[token("...")]
    DotDotDot,
    #[token("..")]
    DotDot,
    #[token(".")]
    Dot,

    // Literals
    // Decimal integer, underscores allowed: 42, 1_000_000
    #[regex(r"[0-9][0-9_]*", |lex| parse_int(lex.slice()))]
    IntLiteral(i64),

    // Decimal float: 3.14, 1_000.5
    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*", |lex| parse_float(lex.slice()))]
    FloatLiteral(f64),

    // Char literal with escapes: 'a', '\n', '\''
    #[regex(r"'([^'\\\n]|\\[0nt\\'\x22])'", |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len()-1]).chars().next()
    })]
    CharLiteral(char),

    // String literal with escapes
    #[regex(r#""([^"\\\n]|\\[0nt\\'\x22])*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len()-1])
    })]
    StringLiteral(String),

    // Underscore wildcard - higher priority than Ident
    #[token("_", priority = 10)]
    Underscore,

    // Identifiers - UTF-8, defined after keywords
    #[regex(r"[\p{XID_Start}_][\p{XID_Continue}]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Comments (skip)
    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[regex(r"/\*([^*]|\*[^/])*\*/", logos::skip)]
    BlockComment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenSpan {
    pub token: Token,
    pub span: std::ops::Range<usize>,
}

pub struct Lexer<'source> {
    source: &'source str,
    inner: logos::Lexer<'source, Token>,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            source,
            inner: Token::lexer(source),
        }
    }

    fn classify_error(&self, span: std::ops::Range<usize>) -> LexError {
        match self.source[span.clone()].chars().next() {
            Some('"') => LexError::UnterminatedString { span },
            Some('\'') => LexError::UnterminatedChar { span },
            Some(c) if c.is_ascii_digit() => LexError::InvalidNumber { span },
            _ => LexError::InvalidToken { span },
        }
    }
}

impl<'source> Iterator for Lexer<'source> {
    type Item = Result<TokenSpan, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.inner.next()?;
        let span = self.inner.span();

        match token {
            Ok(tok) => Some(Ok(TokenSpan { token: tok, span })),
            Err(_) => Some(Err(self.classify_error(span))),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LexError {
    #[error("Unterminated string literal at {span:?}")]
    UnterminatedString { span: std::ops::Range<usize> },
    #[error("Unterminated or invalid char literal at {span:?}")]
    UnterminatedChar { span: std::ops::Range<usize> },
    #[error("Invalid numeric literal at {span:?}")]
    InvalidNumber { span: std::ops::Range<usize> },
    #[error("Invalid token at {span:?}")]
    InvalidToken { span: std::ops::Range<usize> },
}

impl LexError {
    pub fn span(&self) -> std::ops::Range<usize> {
        match self {
            LexError::UnterminatedString { span }
            | LexError::UnterminatedChar { span }
            | LexError::InvalidNumber { span }
            | LexError::InvalidToken { span } => span.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .map(|r| r.map(|ts| ts.token))
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_keywords() {
        let toks = tokens("fn let const mut struct enum match noinit");
        assert_eq!(
            toks,
            vec![
                Token::Fn,
                Token::Let,
                Token::Const,
                Token::Mut,
                Token::Struct,
                Token::Enum,
                Token::Match,
                Token::Noinit,
            ]
        );
    }

    #[test]
    fn test_literals() {
        let toks = tokens(r#"42 1_000 3.14 'x' '\n' "hello\n" true false"#);
        assert_eq!(
            toks,
            vec![
                Token::IntLiteral(42),
                Token::IntLiteral(1000),
                Token::FloatLiteral(3.14),
                Token::CharLiteral('x'),
                Token::CharLiteral('\n'),
                Token::StringLiteral("hello\n".to_string()),
                Token::True,
                Token::False,
            ]
        );
    }

    #[test]
    fn test_ranges_do_not_eat_floats() {
        let toks = tokens("0..3 1...5");
        assert_eq!(
            toks,
            vec![
                Token::IntLiteral(0),
                Token::DotDot,
                Token::IntLiteral(3),
                Token::IntLiteral(1),
                Token::DotDotDot,
                Token::IntLiteral(5),
            ]
        );
    }

    #[test]
    fn test_operators() {
        let toks = tokens("a += 1; b == c and !d");
        assert_eq!(
            toks,
            vec![
                Token::Ident("a".to_string()),
                Token::PlusEq,
                Token::IntLiteral(1),
                Token::Semicolon,
                Token::Ident("b".to_string()),
                Token::EqEq,
                Token::Ident("c".to_string()),
                Token::And,
                Token::Not,
                Token::Ident("d".to_string()),
            ]
        );
    }

    #[test]
    fn test_paths_and_fields() {
        let toks = tokens("E::B(7) p.y t.0");
        assert_eq!(
            toks,
            vec![
                Token::Ident("E".to_string()),
                Token::ColonColon,
                Token::Ident("B".to_string()),
                Token::LParen,
                Token::IntLiteral(7),
                Token::RParen,
                Token::Ident("p".to_string()),
                Token::Dot,
                Token::Ident("y".to_string()),
                Token::Ident("t".to_string()),
                Token::Dot,
                Token::IntLiteral(0),
            ]
        );
    }

    #[test]
    fn test_underscore_and_idents() {
        let toks = tokens("_ _private count_123");
        assert_eq!(
            toks,
            vec![
                Token::Underscore,
                Token::Ident("_private".to_string()),
                Token::Ident("count_123".to_string()),
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        let toks = tokens("1 // line\n/* block */ 2");
        assert_eq!(toks, vec![Token::IntLiteral(1), Token::IntLiteral(2)]);
    }

    #[test]
    fn test_unterminated_string_error() {
        let mut lexer = Lexer::new("\"oops");
        match lexer.next() {
            Some(Err(LexError::UnterminatedString { .. })) => {}
            other => panic!("expected unterminated string error, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_underscore_is_invalid() {
        let mut lexer = Lexer::new("1_ ");
        match lexer.next() {
            Some(Err(LexError::InvalidNumber { .. })) => {}
            other => panic!("expected invalid number error, got {:?}", other),
        }
    }
}
