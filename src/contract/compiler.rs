//! Compiles a declarative requirement block into a frozen `Contract`.
//!
//! The grammar, one requirement per line (or `;`):
//!
//! ```text
//! op(x::T, y)                 call form
//! op(::T) :: Int              annotated call form
//! <: self                     subtype assertion
//! if T <: Number ... elseif implements(T, Iterable) ... else ... end
//! a(x::T) || b(x::T)          alternatives (a trailing `||` continues the line)
//! begin ... end               sequence
//! ```
use super::ast::{
    AlternativeReq, Branch, ConditionalReq, Contract, MethodReq, ParamConstraint, Predicate,
    RequirementNode, ReturnObligation, SequenceReq, SubtypeReq,
};
use super::lexer::{tokenize, Span, Token, TokenKind};
use crate::store::{InterfaceId, Scope, TypeExpr, TypeParseError};
use crate::validation::ConformanceError;
use smallvec::SmallVec;

/// Deepest nesting of blocks, parenthesised predicates, `!` and type parameters.
const MAX_NESTING: usize = 64;

const RESERVED: &[&str] = &[
    "if", "elseif", "else", "end", "begin", "true", "false", "self", "Any", "implements",
];

/// Whether `name` can be used as an interface identity or placeholder.
pub fn is_valid_binding(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars.next().map_or(false, |c| c.is_alphabetic() || c == '_');
    starts_ok && chars.all(|c| c.is_alphanumeric() || c == '_') && !RESERVED.contains(&name)
}

fn no_interfaces(_: &str) -> bool {
    false
}

fn malformed(
    identity: &str,
    line: u32,
    column: u32,
    reason: impl Into<String>,
) -> ConformanceError {
    ConformanceError::MalformedContract {
        interface: InterfaceId::new(identity),
        line,
        column,
        reason: reason.into(),
    }
}

/// Translates requirement text written against a placeholder into a `Contract`.
pub struct ContractCompiler<'a> {
    identity: &'a str,
    placeholder: &'a str,
    home_scope: Scope,
    known_interfaces: &'a dyn Fn(&str) -> bool,
}

impl<'a> ContractCompiler<'a> {
    pub fn new(identity: &'a str, placeholder: &'a str, home_scope: Scope) -> Self {
        Self { identity, placeholder, home_scope, known_interfaces: &no_interfaces }
    }

    /// Lets annotated calls whose return names an already-declared interface compile
    /// to `ReturnObligation::Interface`.
    pub fn with_known_interfaces(mut self, known: &'a dyn Fn(&str) -> bool) -> Self {
        self.known_interfaces = known;
        self
    }

    pub fn compile(&self, source: &str) -> Result<Contract, ConformanceError> {
        if !is_valid_binding(self.identity) {
            return Err(malformed(
                self.identity,
                0,
                0,
                format!("`{}` is not a valid interface name", self.identity),
            ));
        }
        if !is_valid_binding(self.placeholder) || self.placeholder == self.identity {
            return Err(malformed(
                self.identity,
                0,
                0,
                format!("`{}` is not a valid placeholder binding", self.placeholder),
            ));
        }

        let tokens = tokenize(source)
            .map_err(|e| malformed(self.identity, e.line, e.column, e.message))?;
        let mut parser = Parser {
            identity: self.identity,
            placeholder: self.placeholder,
            known_interfaces: self.known_interfaces,
            tokens,
            pos: 0,
            depth: 0,
            source,
        };
        let requirements = parser.parse_block(&[])?;

        Ok(Contract {
            identity: InterfaceId::new(self.identity),
            placeholder: self.placeholder.to_string(),
            home_scope: self.home_scope.clone(),
            requirements,
            source_text: source.to_string(),
        })
    }
}

/// Parses a standalone type such as `Vector{Int}`. No placeholder is in effect.
pub fn parse_type(input: &str) -> Result<TypeExpr, TypeParseError> {
    let err = |reason: String| TypeParseError { input: input.to_string(), reason };
    let tokens = tokenize(input).map_err(|e| err(e.message))?;
    let mut parser = Parser {
        identity: "",
        placeholder: "",
        known_interfaces: &no_interfaces,
        tokens,
        pos: 0,
        depth: 0,
        source: input,
    };
    let ty = parser.parse_type().map_err(|e| match e {
        ConformanceError::MalformedContract { reason, .. } => err(reason),
        other => err(other.to_string()),
    })?;
    if *parser.peek() != TokenKind::Eof {
        return Err(err(format!("unexpected {}", describe(parser.peek()))));
    }
    Ok(ty)
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(s) => format!("`{}`", s),
        TokenKind::LParen => "`(`".into(),
        TokenKind::RParen => "`)`".into(),
        TokenKind::LBrace => "`{`".into(),
        TokenKind::RBrace => "`}`".into(),
        TokenKind::Comma => "`,`".into(),
        TokenKind::DoubleColon => "`::`".into(),
        TokenKind::Subtype => "`<:`".into(),
        TokenKind::OrOr => "`||`".into(),
        TokenKind::AndAnd => "`&&`".into(),
        TokenKind::EqEq => "`==`".into(),
        TokenKind::Bang => "`!`".into(),
        TokenKind::Separator => "end of line".into(),
        TokenKind::Eof => "end of block".into(),
    }
}

struct Parser<'a> {
    identity: &'a str,
    placeholder: &'a str,
    known_interfaces: &'a dyn Fn(&str) -> bool,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    source: &'a str,
}

type ParseResult<T> = Result<T, ConformanceError>;

impl<'a> Parser<'a> {
    // --- Token cursor ---

    // `tokens` always ends with `Eof`, and the cursor never moves past it.
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    /// End offset of the last consumed token.
    fn prev_end(&self) -> usize {
        self.tokens[self.pos.saturating_sub(1)].span.end
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), TokenKind::Ident(s) if s == keyword)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, wanted: &str) -> ParseResult<()> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected {}, found {}", wanted, describe(self.peek()))))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> ParseResult<()> {
        if self.at_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(format!("expected `{}`, found {}", keyword, describe(self.peek()))))
        }
    }

    fn expect_ident(&mut self, wanted: &str) -> ParseResult<String> {
        match self.peek().clone() {
            TokenKind::Ident(name) if !RESERVED.contains(&name.as_str()) => {
                self.advance();
                Ok(name)
            }
            other => {
                Err(self.error_here(format!("expected {}, found {}", wanted, describe(&other))))
            }
        }
    }

    fn skip_separators(&mut self) {
        while *self.peek() == TokenKind::Separator {
            self.advance();
        }
    }

    /// Runs `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error_here("requirement nesting is too deep"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn error_here(&self, reason: impl Into<String>) -> ConformanceError {
        let span = self.span();
        malformed(self.identity, span.line, span.column, reason)
    }

    fn error_at(&self, span: Span, reason: impl Into<String>) -> ConformanceError {
        malformed(self.identity, span.line, span.column, reason)
    }

    // --- Requirements ---

    /// Parses requirements until end of input or one of `terminators` (not consumed).
    fn parse_block(&mut self, terminators: &[&str]) -> ParseResult<Vec<RequirementNode>> {
        let mut nodes = Vec::new();
        loop {
            self.skip_separators();
            match self.peek() {
                TokenKind::Eof if terminators.is_empty() => return Ok(nodes),
                TokenKind::Eof => return Err(self.error_here("expected `end` before end of block")),
                TokenKind::Ident(word) if terminators.contains(&word.as_str()) => return Ok(nodes),
                _ => {}
            }

            nodes.push(self.parse_statement()?);

            match self.peek() {
                TokenKind::Separator | TokenKind::Eof => {}
                TokenKind::Ident(word) if terminators.contains(&word.as_str()) => {}
                other => {
                    return Err(self.error_here(format!(
                        "unexpected {} after requirement",
                        describe(other)
                    )))
                }
            }
        }
    }

    fn parse_statement(&mut self) -> ParseResult<RequirementNode> {
        let start = self.span().start;
        let first = self.parse_primary()?;
        if *self.peek() != TokenKind::OrOr {
            return Ok(first);
        }

        let mut children = vec![first];
        while self.eat(&TokenKind::OrOr) {
            self.skip_separators();
            children.push(self.parse_primary()?);
        }
        let source = self.source[start..self.prev_end()].to_string();
        Ok(RequirementNode::Alternative(AlternativeReq { children, source }))
    }

    fn parse_primary(&mut self) -> ParseResult<RequirementNode> {
        match self.peek().clone() {
            TokenKind::Subtype => self.parse_subtype(),
            TokenKind::Ident(word) => match word.as_str() {
                "if" => self.nested(Self::parse_conditional),
                "begin" => self.nested(|p| {
                    p.advance();
                    let body = p.parse_body(&["end"])?;
                    p.expect_keyword("end")?;
                    Ok(RequirementNode::Sequence(body))
                }),
                w if RESERVED.contains(&w) => Err(self.error_here(format!("unexpected `{}`", w))),
                _ => self.parse_call(),
            },
            other => Err(self.error_here(format!(
                "unrecognized requirement starting with {}",
                describe(&other)
            ))),
        }
    }

    fn parse_body(&mut self, terminators: &[&str]) -> ParseResult<SequenceReq> {
        Ok(SequenceReq { children: self.parse_block(terminators)? })
    }

    fn parse_subtype(&mut self) -> ParseResult<RequirementNode> {
        let start = self.span().start;
        self.advance();
        match self.peek().clone() {
            TokenKind::Ident(target) if target == "self" || target == self.identity => {
                self.advance();
                let source = self.source[start..self.prev_end()].to_string();
                Ok(RequirementNode::Subtype(SubtypeReq { source }))
            }
            other => Err(self.error_here(format!(
                "`<:` requirements must name `self`, found {}",
                describe(&other)
            ))),
        }
    }

    fn parse_call(&mut self) -> ParseResult<RequirementNode> {
        let name_span = self.span();
        let name = self.expect_ident("an operation name")?;
        if *self.peek() != TokenKind::LParen {
            return Err(self.error_at(
                name_span,
                format!("unrecognized requirement: `{}` is not an operation call", name),
            ));
        }
        self.advance();

        if *self.peek() == TokenKind::RParen {
            return Err(self.error_at(
                name_span,
                format!(
                    "`{}()` names no parameters; a required operation needs at least one",
                    name
                ),
            ));
        }

        let mut params = SmallVec::new();
        loop {
            params.push(self.parse_param()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen, "`,` or `)`")?;
            break;
        }

        let returns = if self.eat(&TokenKind::DoubleColon) {
            Some(self.parse_return()?)
        } else {
            None
        };

        let source = self.source[name_span.start..self.prev_end()].to_string();
        Ok(RequirementNode::Method(MethodReq { name, params, returns, source }))
    }

    fn parse_param(&mut self) -> ParseResult<ParamConstraint> {
        if self.eat(&TokenKind::DoubleColon) {
            let constraint = self.parse_type()?;
            return Ok(ParamConstraint { name: None, constraint });
        }
        let name = self.expect_ident("a parameter")?;
        let constraint = if self.eat(&TokenKind::DoubleColon) {
            self.parse_type()?
        } else {
            TypeExpr::Any
        };
        Ok(ParamConstraint { name: Some(name), constraint })
    }

    fn parse_return(&mut self) -> ParseResult<ReturnObligation> {
        Ok(match self.parse_type()? {
            TypeExpr::Named(name)
                if name == self.identity || (self.known_interfaces)(name.as_str()) =>
            {
                ReturnObligation::Interface(InterfaceId(name))
            }
            other => ReturnObligation::Type(other),
        })
    }

    fn parse_type(&mut self) -> ParseResult<TypeExpr> {
        let name = match self.peek().clone() {
            TokenKind::Ident(name) => name,
            other => {
                return Err(self.error_here(format!("expected a type, found {}", describe(&other))))
            }
        };
        let name_span = self.span();
        self.advance();

        let base = match name.as_str() {
            n if !self.placeholder.is_empty() && n == self.placeholder => TypeExpr::Candidate,
            "Any" => TypeExpr::Any,
            "self" if !self.identity.is_empty() => TypeExpr::Named(self.identity.to_string()),
            n if RESERVED.contains(&n) => {
                return Err(self.error_at(name_span, format!("`{}` cannot be used as a type", n)))
            }
            _ => TypeExpr::Named(name.clone()),
        };

        if !self.eat(&TokenKind::LBrace) {
            return Ok(base);
        }
        let head = match base {
            TypeExpr::Named(head) => head,
            _ => {
                return Err(
                    self.error_at(name_span, format!("`{}` cannot take type parameters", name))
                )
            }
        };
        let mut args = Vec::new();
        loop {
            args.push(self.nested(Self::parse_type)?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RBrace, "`,` or `}`")?;
            break;
        }
        Ok(TypeExpr::Applied { head, args })
    }

    fn parse_conditional(&mut self) -> ParseResult<RequirementNode> {
        const BRANCH_END: &[&str] = &["elseif", "else", "end"];
        self.advance();

        let mut branches = Vec::new();
        let predicate = self.parse_condition()?;
        let body = self.parse_body(BRANCH_END)?;
        branches.push(Branch { predicate, body });

        let mut else_body = None;
        loop {
            if self.at_keyword("elseif") {
                self.advance();
                let predicate = self.parse_condition()?;
                let body = self.parse_body(BRANCH_END)?;
                branches.push(Branch { predicate, body });
                continue;
            }
            if self.at_keyword("else") {
                self.advance();
                else_body = Some(self.parse_body(&["end"])?);
            }
            self.expect_keyword("end")?;
            break;
        }

        Ok(RequirementNode::Conditional(ConditionalReq { branches, else_body }))
    }

    // --- Predicates ---

    fn parse_condition(&mut self) -> ParseResult<Predicate> {
        let predicate = self.parse_or()?;
        if *self.peek() != TokenKind::Separator {
            return Err(self.error_here(format!(
                "expected a line break after the condition, found {}",
                describe(self.peek())
            )));
        }
        Ok(predicate)
    }

    fn parse_or(&mut self) -> ParseResult<Predicate> {
        let mut terms = vec![self.parse_and()?];
        while self.eat(&TokenKind::OrOr) {
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 { terms.swap_remove(0) } else { Predicate::Any(terms) })
    }

    fn parse_and(&mut self) -> ParseResult<Predicate> {
        let mut terms = vec![self.parse_unary()?];
        while self.eat(&TokenKind::AndAnd) {
            terms.push(self.parse_unary()?);
        }
        Ok(if terms.len() == 1 { terms.swap_remove(0) } else { Predicate::All(terms) })
    }

    fn parse_unary(&mut self) -> ParseResult<Predicate> {
        match self.peek().clone() {
            TokenKind::Bang => {
                self.advance();
                Ok(Predicate::Not(Box::new(self.nested(Self::parse_unary)?)))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.nested(Self::parse_or)?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(inner)
            }
            TokenKind::Ident(word) if word == "true" || word == "false" => {
                self.advance();
                Ok(Predicate::Literal(word == "true"))
            }
            TokenKind::Ident(word) if word == "implements" => {
                self.advance();
                self.expect(TokenKind::LParen, "`(`")?;
                let ty = self.parse_type()?;
                self.expect(TokenKind::Comma, "`,`")?;
                let iface = if self.at_keyword("self") {
                    self.advance();
                    self.identity.to_string()
                } else {
                    self.expect_ident("an interface name")?
                };
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(Predicate::Implements(ty, InterfaceId(iface)))
            }
            _ => {
                let lhs = self.parse_type()?;
                if self.eat(&TokenKind::Subtype) {
                    Ok(Predicate::SubtypeOf(lhs, self.parse_type()?))
                } else if self.eat(&TokenKind::EqEq) {
                    Ok(Predicate::Equals(lhs, self.parse_type()?))
                } else {
                    Err(self.error_here(format!(
                        "expected `<:` or `==` in condition, found {}",
                        describe(self.peek())
                    )))
                }
            }
        }
    }
}
