pub mod environment;
pub mod error;
pub mod id;
pub mod message;
pub mod policy;
pub mod term;
pub mod trigger;
pub mod unify;

pub use async_trait::async_trait;
pub use environment::{Environment, NullEnvironment};
pub use error::{ActionError, CoreError, Result};
pub use id::{AgentName, IdGen, IntentionId, MessageId};
pub use message::{Message, Performative};
pub use policy::{NoApplicablePolicy, SchedulingPolicy, SelectionPolicy};
pub use term::{ArithOp, Literal, RelOp, Term};
pub use trigger::{Trigger, TriggerKind, TriggerOp};
pub use unify::Unifier;
