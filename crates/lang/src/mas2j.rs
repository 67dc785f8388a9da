//! Reader for `.mas2j` project files.
//!
//! ```text
//! MAS factory {
//!     infrastructure: Centralised
//!     environment: env.FactoryEnv
//!     agents: robot [beliefs="battery(100)", goals="start"] #2;
//!             supervisor supervisor.asl;
//!     aslSourcePath: "src/asl";
//! }
//! ```

use mas_core::{Literal, Term};
use tracing::debug;

use crate::error::ParseResult;
use crate::lexer::Token;
use crate::parser::{parse_literals, Parser};
use crate::system::EnvironmentSpec;

/// Upper bound on `#N` and on TOML `instances`.
pub const MAX_INSTANCES: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDefinition {
    pub name: String,
    pub environment: Option<EnvironmentSpec>,
    pub agents: Vec<AgentEntry>,
    pub source_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentEntry {
    pub name: String,
    /// Plan file as written; `None` means `<name>.asl`
    pub source: Option<String>,
    pub beliefs: Vec<Literal>,
    pub goals: Vec<Literal>,
    pub policy: Option<String>,
    pub instances: usize,
}

impl AgentEntry {
    fn new(name: String) -> Self {
        Self {
            name,
            source: None,
            beliefs: Vec::new(),
            goals: Vec::new(),
            policy: None,
            instances: 1,
        }
    }
}

pub fn parse_project(input: &str) -> ParseResult<ProjectDefinition> {
    Parser::new(input)?.parse_project()
}

impl Parser {
    fn ident(&mut self) -> ParseResult<String> {
        match self.peek().clone() {
            Token::Atom(s) | Token::Var(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.error("identifier")),
        }
    }

    fn is_ident(token: &Token) -> bool {
        matches!(token, Token::Atom(_) | Token::Var(_))
    }

    /// `a.b.C`; the lexer splits this into identifiers, dots and internal
    /// action tokens.
    fn qualified_name(&mut self) -> ParseResult<String> {
        let mut name = self.ident()?;
        loop {
            match self.peek().clone() {
                Token::Internal(part) => {
                    self.advance();
                    name.push('.');
                    name.push_str(&part);
                }
                Token::Dot if Self::is_ident(self.peek_at(1)) => {
                    self.advance();
                    name.push('.');
                    name.push_str(&self.ident()?);
                }
                _ => return Ok(name),
            }
        }
    }

    fn optional_args(&mut self) -> ParseResult<Vec<Term>> {
        if self.eat(&Token::LParen) {
            let args = self.parse_terms(&Token::RParen)?;
            self.expect(Token::RParen, "')'")?;
            Ok(args)
        } else {
            Ok(Vec::new())
        }
    }

    fn section_starts(&self) -> bool {
        Self::is_ident(self.peek()) && self.peek_at(1) == &Token::Colon
    }

    pub(crate) fn parse_project(&mut self) -> ParseResult<ProjectDefinition> {
        match self.ident()?.as_str() {
            "MAS" => {}
            _ => return Err(self.invalid("project must start with MAS")),
        }
        let name = self.ident()?;
        self.expect(Token::LBrace, "'{'")?;

        let mut project = ProjectDefinition {
            name,
            environment: None,
            agents: Vec::new(),
            source_path: None,
        };

        while !self.check(&Token::RBrace) {
            let section = self.ident()?;
            self.expect(Token::Colon, "':' after section name")?;
            match section.as_str() {
                "infrastructure" => {
                    let infra = self.qualified_name()?;
                    self.optional_args()?;
                    debug!(infrastructure = %infra, "ignoring infrastructure");
                }
                "environment" => {
                    let kind = self.qualified_name()?;
                    let args = self.optional_args()?;
                    project.environment = Some(EnvironmentSpec { kind, args });
                }
                "agents" => {
                    while !self.check(&Token::RBrace) && !self.section_starts() {
                        project.agents.push(self.parse_agent_entry()?);
                    }
                }
                "aslSourcePath" | "directives" | "classpath" => {
                    let mut paths = Vec::new();
                    while let Token::String(path) = self.peek().clone() {
                        self.advance();
                        paths.push(path);
                        self.eat(&Token::Semicolon);
                    }
                    if section == "aslSourcePath" {
                        project.source_path = paths.into_iter().next();
                    }
                }
                other => return Err(self.invalid(format!("unknown section '{}'", other))),
            }
            self.eat(&Token::Semicolon);
        }

        self.expect(Token::RBrace, "'}'")?;
        if !self.is_at_end() {
            return Err(self.error("end of file"));
        }
        Ok(project)
    }

    fn parse_agent_entry(&mut self) -> ParseResult<AgentEntry> {
        let mut entry = AgentEntry::new(self.ident()?);

        loop {
            match self.peek().clone() {
                Token::Semicolon => {
                    self.advance();
                    break;
                }
                Token::String(path) => {
                    self.advance();
                    entry.source = Some(path);
                }
                Token::LBracket => {
                    self.advance();
                    self.parse_agent_options(&mut entry)?;
                }
                Token::Hash => {
                    self.advance();
                    match self.advance() {
                        Token::Number(n)
                            if n >= 1.0 && n <= MAX_INSTANCES as f64 && n.fract() == 0.0 =>
                        {
                            entry.instances = n as usize;
                        }
                        _ => {
                            return Err(self.invalid(format!(
                                "'#' must be followed by a count from 1 to {}",
                                MAX_INSTANCES
                            )))
                        }
                    }
                }
                Token::Atom(word) | Token::Var(word)
                    if matches!(
                        word.as_str(),
                        "agentClass" | "agentArchClass" | "beliefBaseClass"
                    ) =>
                {
                    self.advance();
                    let class = self.qualified_name()?;
                    self.optional_args()?;
                    debug!(agent = %entry.name, %class, "ignoring {}", word);
                }
                Token::Atom(_) | Token::Var(_) if matches!(self.peek_at(1), Token::Internal(_)) => {
                    entry.source = Some(self.qualified_name()?);
                }
                _ => return Err(self.error("agent option or ';'")),
            }
        }

        Ok(entry)
    }

    fn parse_agent_options(&mut self, entry: &mut AgentEntry) -> ParseResult<()> {
        while !self.check(&Token::RBracket) {
            let key = self.ident()?;
            self.expect(Token::Eq, "'=' in agent option")?;
            let value = match self.advance() {
                Token::String(s) | Token::Atom(s) | Token::Var(s) => s,
                Token::Number(n) => n.to_string(),
                _ => return Err(self.invalid(format!("bad value for option '{}'", key))),
            };
            match key.as_str() {
                "beliefs" => {
                    let beliefs = parse_literals(&value)?;
                    if let Some(open) = beliefs.iter().find(|b| !b.is_ground()) {
                        return Err(self.invalid(format!("belief {} is not ground", open)));
                    }
                    entry.beliefs.extend(beliefs);
                }
                "goals" => entry.goals.extend(parse_literals(&value)?),
                "policy" => entry.policy = Some(value),
                other => debug!(agent = %entry.name, option = other, "ignoring agent option"),
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBracket, "']' closing agent options")
    }
}
