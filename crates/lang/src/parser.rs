use mas_core::{ArithOp, Literal, RelOp, Term, Trigger, TriggerKind, TriggerOp};

use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::lexer::{Lexer, Spanned, Token};

/// Recursive-descent parser for agent sources.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    anonymous: usize,
}

impl Parser {
    pub fn new(input: &str) -> ParseResult<Self> {
        let tokens = Lexer::new(input).tokenize()?;
        Ok(Self {
            tokens,
            pos: 0,
            anonymous: 0,
        })
    }

    pub(crate) fn current(&self) -> &Spanned {
        // tokenize always ends with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.current().token
    }

    pub(crate) fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.current().token.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn check(&self, token: &Token) -> bool {
        self.peek() == token
    }

    pub(crate) fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn error(&self, expected: &str) -> ParseError {
        let current = self.current();
        if current.token == Token::Eof {
            ParseError::UnexpectedEof {
                expected: expected.to_string(),
            }
        } else {
            ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: current.token.describe(),
                line: current.line,
                col: current.col,
            }
        }
    }

    pub(crate) fn invalid(&self, message: impl Into<String>) -> ParseError {
        let current = self.current();
        ParseError::Invalid {
            message: message.into(),
            line: current.line,
            col: current.col,
        }
    }

    pub(crate) fn expect(&mut self, token: Token, expected: &str) -> ParseResult<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.check(&Token::Eof)
    }

    /// Parses a complete agent source: beliefs, rules, initial goals and
    /// plans in any order.
    pub fn parse_agent(&mut self) -> ParseResult<AgentSource> {
        let mut source = AgentSource::default();

        while !self.is_at_end() {
            match self.peek() {
                Token::At | Token::Plus | Token::Minus => {
                    source.plans.push(self.parse_plan()?);
                }
                Token::Bang => {
                    self.advance();
                    source.goals.push(self.parse_literal()?);
                    self.expect(Token::Dot, "'.' after initial goal")?;
                }
                _ => {
                    let head = self.parse_literal()?;
                    if self.eat(&Token::RuleArrow) {
                        let body = self.parse_condition()?;
                        source.rules.push(Rule { head, body });
                    } else if !head.is_ground() {
                        return Err(self.invalid(format!("belief {} is not ground", head)));
                    } else {
                        source.beliefs.push(head);
                    }
                    self.expect(Token::Dot, "'.' after belief or rule")?;
                }
            }
        }

        Ok(source)
    }

    pub fn parse_plan(&mut self) -> ParseResult<Plan> {
        let label = if self.eat(&Token::At) {
            Some(self.parse_literal()?)
        } else {
            None
        };

        let trigger = self.parse_trigger()?;
        let mut plan = Plan::new(trigger);
        plan.label = label;

        if self.eat(&Token::Colon) {
            plan.context = self.parse_condition()?;
        }
        if self.eat(&Token::Arrow) {
            plan.body = self.parse_body(&Token::Dot)?;
        }
        self.expect(Token::Dot, "'.' at end of plan")?;

        Ok(plan)
    }

    fn parse_trigger(&mut self) -> ParseResult<Trigger> {
        let op = match self.peek() {
            Token::Plus => TriggerOp::Add,
            Token::Minus => TriggerOp::Del,
            _ => return Err(self.error("'+' or '-' starting a trigger")),
        };
        self.advance();
        let kind = if self.eat(&Token::Bang) {
            TriggerKind::Achieve
        } else if self.eat(&Token::Question) {
            TriggerKind::Test
        } else {
            TriggerKind::Belief
        };
        Ok(Trigger::new(op, kind, self.parse_literal()?))
    }

    fn parse_body(&mut self, terminator: &Token) -> ParseResult<Vec<BodyStep>> {
        let mut steps = Vec::new();
        if self.check(terminator) {
            return Ok(steps);
        }
        loop {
            steps.push(self.parse_step()?);
            if !self.eat(&Token::Semicolon) {
                break;
            }
        }
        Ok(steps)
    }

    fn parse_step(&mut self) -> ParseResult<BodyStep> {
        match self.peek().clone() {
            Token::Bang => {
                self.advance();
                Ok(BodyStep::Achieve(self.parse_literal()?))
            }
            Token::DoubleBang => {
                self.advance();
                Ok(BodyStep::AchieveAsync(self.parse_literal()?))
            }
            Token::Question => {
                self.advance();
                Ok(BodyStep::Test(self.parse_literal()?))
            }
            Token::Plus => {
                self.advance();
                Ok(BodyStep::AddBelief(self.parse_literal()?))
            }
            Token::Minus => {
                self.advance();
                Ok(BodyStep::RemoveBelief(self.parse_literal()?))
            }
            Token::MinusPlus => {
                self.advance();
                Ok(BodyStep::ReplaceBelief(self.parse_literal()?))
            }
            Token::Internal(name) => {
                self.advance();
                let mut lit = Literal::new(name);
                if self.eat(&Token::LParen) {
                    lit.args = self.parse_terms(&Token::RParen)?;
                    self.expect(Token::RParen, "')' closing internal action")?;
                }
                Ok(BodyStep::Internal(lit))
            }
            Token::If => self.parse_if(),
            Token::True if self.peek_at(1) != &Token::LParen => {
                self.advance();
                Ok(BodyStep::Constraint(Condition::True))
            }
            _ => {
                let left = self.parse_expr()?;
                if let Some(op) = self.relop() {
                    let right = self.parse_expr()?;
                    Ok(BodyStep::Constraint(Condition::Compare(left, op, right)))
                } else {
                    Ok(BodyStep::Action(self.to_literal(left)?))
                }
            }
        }
    }

    fn parse_if(&mut self) -> ParseResult<BodyStep> {
        self.expect(Token::If, "'if'")?;
        self.expect(Token::LParen, "'(' after if")?;
        let condition = self.parse_condition()?;
        self.expect(Token::RParen, "')' closing if condition")?;
        let then_branch = self.parse_block()?;

        let else_branch = if self.eat(&Token::Else) {
            if self.check(&Token::If) {
                vec![self.parse_if()?]
            } else {
                self.parse_block()?
            }
        } else {
            Vec::new()
        };

        Ok(BodyStep::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_block(&mut self) -> ParseResult<Vec<BodyStep>> {
        self.expect(Token::LBrace, "'{'")?;
        let steps = self.parse_body(&Token::RBrace)?;
        self.expect(Token::RBrace, "'}'")?;
        Ok(steps)
    }

    pub fn parse_condition(&mut self) -> ParseResult<Condition> {
        let mut left = self.parse_conjunction()?;
        while self.eat(&Token::Pipe) {
            let right = self.parse_conjunction()?;
            left = Condition::or(left, right);
        }
        Ok(left)
    }

    fn parse_conjunction(&mut self) -> ParseResult<Condition> {
        let mut left = self.parse_unary_condition()?;
        while self.eat(&Token::Amp) {
            let right = self.parse_unary_condition()?;
            left = Condition::and(left, right);
        }
        Ok(left)
    }

    fn parse_unary_condition(&mut self) -> ParseResult<Condition> {
        match self.peek() {
            Token::Not => {
                self.advance();
                Ok(Condition::Not(Box::new(self.parse_unary_condition()?)))
            }
            Token::True => {
                self.advance();
                Ok(Condition::True)
            }
            Token::False => {
                self.advance();
                Ok(Condition::False)
            }
            Token::LParen => {
                // `(cond)` or a parenthesised arithmetic operand
                let start = self.pos;
                self.advance();
                if let Ok(inner) = self.parse_condition() {
                    if self.eat(&Token::RParen) && self.relop_ahead().is_none() && !self.arith_ahead()
                    {
                        return Ok(inner);
                    }
                }
                self.pos = start;
                self.parse_comparison_or_literal()
            }
            _ => self.parse_comparison_or_literal(),
        }
    }

    fn parse_comparison_or_literal(&mut self) -> ParseResult<Condition> {
        let left = self.parse_expr()?;
        if let Some(op) = self.relop() {
            let right = self.parse_expr()?;
            Ok(Condition::Compare(left, op, right))
        } else {
            Ok(Condition::Literal(self.to_literal(left)?))
        }
    }

    fn relop_ahead(&self) -> Option<RelOp> {
        match self.peek() {
            Token::Eq => Some(RelOp::Unify),
            Token::EqEq => Some(RelOp::Eq),
            Token::NotEq => Some(RelOp::Ne),
            Token::Lt => Some(RelOp::Lt),
            Token::Gt => Some(RelOp::Gt),
            Token::Le => Some(RelOp::Le),
            Token::Ge => Some(RelOp::Ge),
            _ => None,
        }
    }

    fn arith_ahead(&self) -> bool {
        matches!(
            self.peek(),
            Token::Plus | Token::Minus | Token::Star | Token::Slash | Token::Div | Token::Mod
        )
    }

    fn relop(&mut self) -> Option<RelOp> {
        let op = self.relop_ahead()?;
        self.advance();
        Some(op)
    }

    fn to_literal(&self, term: Term) -> ParseResult<Literal> {
        Literal::from_term(term).map_err(|e| self.invalid(e.to_string()))
    }

    /// `["~"] atom ["(" terms ")"] ["[" terms "]"]`
    pub fn parse_literal(&mut self) -> ParseResult<Literal> {
        let negated = self.eat(&Token::Tilde);
        let functor = match self.peek().clone() {
            Token::Atom(name) => {
                self.advance();
                name
            }
            // keywords are plain atoms in literal position
            Token::True => {
                self.advance();
                "true".to_string()
            }
            Token::False => {
                self.advance();
                "false".to_string()
            }
            _ => return Err(self.error("literal")),
        };
        self.finish_literal(negated, functor)
    }

    fn finish_literal(&mut self, negated: bool, functor: String) -> ParseResult<Literal> {
        let mut lit = Literal::new(functor);
        lit.negated = negated;
        if self.eat(&Token::LParen) {
            lit.args = self.parse_terms(&Token::RParen)?;
            self.expect(Token::RParen, "')' closing arguments")?;
        }
        if self.eat(&Token::LBracket) {
            for annot in self.parse_terms(&Token::RBracket)? {
                lit.add_annot(annot);
            }
            self.expect(Token::RBracket, "']' closing annotations")?;
        }
        Ok(lit)
    }

    pub(crate) fn parse_terms(&mut self, closing: &Token) -> ParseResult<Vec<Term>> {
        let mut terms = Vec::new();
        if self.check(closing) {
            return Ok(terms);
        }
        loop {
            terms.push(self.parse_expr()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(terms)
    }

    /// Additive expression; the entry point for every term.
    pub fn parse_expr(&mut self) -> ParseResult<Term> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => ArithOp::Add,
                Token::Minus => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Term::Arith(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Term> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => ArithOp::Mul,
                Token::Slash => ArithOp::Div,
                Token::Div => ArithOp::IntDiv,
                Token::Mod => ArithOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Term::Arith(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Term> {
        if self.eat(&Token::Minus) {
            return Ok(match self.parse_unary()? {
                Term::Number(n) => Term::Number(-n),
                other => Term::Neg(Box::new(other)),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Term> {
        match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Term::Number(n))
            }
            Token::String(s) => {
                self.advance();
                Ok(Term::Str(s))
            }
            Token::Var(name) => {
                self.advance();
                if name == "_" {
                    self.anonymous += 1;
                    Ok(Term::Var(format!("_{}_anon", self.anonymous)))
                } else {
                    Ok(Term::Var(name))
                }
            }
            Token::Atom(_) | Token::Tilde | Token::True | Token::False => {
                let lit = self.parse_literal()?;
                Ok(Term::structure(lit))
            }
            Token::LBracket => {
                self.advance();
                let items = self.parse_terms(&Token::RBracket)?;
                if self.check(&Token::Pipe) {
                    return Err(self.invalid("list tails are not supported"));
                }
                self.expect(Token::RBracket, "']' closing list")?;
                Ok(Term::List(items))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            _ => Err(self.error("term")),
        }
    }
}

/// Parses a complete agent source.
pub fn parse_agent(input: &str) -> ParseResult<AgentSource> {
    Parser::new(input)?.parse_agent()
}

/// Parses comma-separated literals, as written in `beliefs="a(1), b"`.
pub fn parse_literals(input: &str) -> ParseResult<Vec<Literal>> {
    let mut parser = Parser::new(input)?;
    let mut literals = Vec::new();
    while !parser.is_at_end() {
        literals.push(parser.parse_literal()?);
        if !parser.eat(&Token::Comma) {
            break;
        }
    }
    if !parser.is_at_end() {
        return Err(parser.error("',' between literals"));
    }
    Ok(literals)
}

/// Parses a single literal such as `count(0)` or `done[source(a)]`; a
/// trailing `.` is accepted.
pub fn parse_literal(input: &str) -> ParseResult<Literal> {
    let mut parser = Parser::new(input)?;
    let lit = parser.parse_literal()?;
    parser.eat(&Token::Dot);
    if !parser.is_at_end() {
        return Err(parser.error("end of literal"));
    }
    Ok(lit)
}

/// Parses an initial belief, which must be ground.
pub fn parse_belief(input: &str) -> ParseResult<Literal> {
    let mut parser = Parser::new(input)?;
    let lit = parser.parse_literal()?;
    if !lit.is_ground() {
        return Err(parser.invalid(format!("belief {} is not ground", lit)));
    }
    parser.eat(&Token::Dot);
    if !parser.is_at_end() {
        return Err(parser.error("end of literal"));
    }
    Ok(lit)
}
