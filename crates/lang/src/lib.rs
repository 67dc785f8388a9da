//! Agent source language and system definition files.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod mas2j;
pub mod parser;
pub mod system;

pub use ast::*;
pub use error::{LexError, ParseError, ParseResult, SystemError, SystemResult};
pub use lexer::{Lexer, Spanned, Token};
pub use mas2j::{parse_project, AgentEntry, ProjectDefinition, MAX_INSTANCES};
pub use parser::{parse_agent, parse_belief, parse_literal, parse_literals, Parser};
pub use system::{
    load, AgentBlueprint, AgentDefinition, EnvironmentSpec, LoadedSystem, MasSettings,
    RunSettings, SystemDefinition,
};
