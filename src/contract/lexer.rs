//! Tokenizer for requirement blocks.

/// Location of a token in the source block. Lines and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    DoubleColon,
    Subtype,
    OrOr,
    AndAnd,
    EqEq,
    Bang,
    /// A newline or `;`.
    Separator,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

// `!` covers mutating operation names such as `push!`; `.` covers qualified names.
fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '!' || c == '.'
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    let mut line = 1u32;
    // `column` is the column of byte offset `counted`.
    let mut column = 1u32;
    let mut counted = 0usize;

    while let Some(&(start, c)) = chars.peek() {
        column += source[counted..start].chars().count() as u32;
        counted = start;
        let span = |end: usize| Span { start, end, line, column };

        if c == '\n' || c == ';' {
            chars.next();
            tokens.push(Token { kind: TokenKind::Separator, span: span(start + 1) });
            if c == '\n' {
                line += 1;
                column = 1;
                counted = start + 1;
            }
            continue;
        }
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '#' {
            while let Some(&(_, c)) = chars.peek() {
                if c == '\n' {
                    break;
                }
                chars.next();
            }
            continue;
        }

        if is_ident_start(c) {
            let mut end = start;
            while let Some(&(i, c)) = chars.peek() {
                if !is_ident_continue(c) {
                    break;
                }
                end = i + c.len_utf8();
                chars.next();
            }
            tokens.push(Token {
                kind: TokenKind::Ident(source[start..end].to_string()),
                span: span(end),
            });
            continue;
        }

        chars.next();
        let next = chars.peek().map(|&(_, c)| c);
        let (kind, len) = match (c, next) {
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('{', _) => (TokenKind::LBrace, 1),
            ('}', _) => (TokenKind::RBrace, 1),
            (',', _) => (TokenKind::Comma, 1),
            (':', Some(':')) => (TokenKind::DoubleColon, 2),
            ('<', Some(':')) => (TokenKind::Subtype, 2),
            ('|', Some('|')) => (TokenKind::OrOr, 2),
            ('&', Some('&')) => (TokenKind::AndAnd, 2),
            ('=', Some('=')) => (TokenKind::EqEq, 2),
            ('!', _) => (TokenKind::Bang, 1),
            _ => {
                return Err(LexError {
                    line,
                    column,
                    message: format!("unexpected character '{}'", c),
                })
            }
        };
        if len == 2 {
            chars.next();
        }
        tokens.push(Token { kind, span: span(start + len) });
    }

    let end = source.len();
    let column = column + source[counted..].chars().count() as u32;
    tokens.push(Token { kind: TokenKind::Eof, span: Span { start: end, end, line, column } });
    Ok(tokens)
}
