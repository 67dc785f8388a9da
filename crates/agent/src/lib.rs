pub mod agent;
pub mod belief;
pub mod builtin;
pub mod bus;
pub mod context;
pub mod error;
pub mod event;
pub mod intention;
pub mod plan;
mod reasoning;
pub mod scheduler;
pub mod selector;
pub mod trace;

pub use agent::{AgentConfig, AgentRuntime};
pub use belief::BeliefBase;
pub use builtin::{ActionContext, ActionRegistry, InternalAction, Outcome};
pub use bus::MessageBus;
pub use context::{Outgoing, PendingAction, Recipient, StepContext, StepEffects, Timer};
pub use error::{AgentError, Result};
pub use event::Event;
pub use intention::{Frame, FrameKind, Intention, IntentionState};
pub use plan::PlanLibrary;
pub use scheduler::{
    RunSummary, Scheduler, SchedulerConfig, SchedulerHandle, Termination, DEFAULT_MAX_STEPS,
};
pub use selector::{selector_for, ApplicablePlan, FirstMatch, PlanSelector, PriorityMatch, RandomMatch};
pub use trace::{Trace, TraceEntry, TraceEvent};

pub mod prelude {
    pub use crate::agent::AgentRuntime;
    pub use crate::builtin::{ActionRegistry, InternalAction, Outcome};
    pub use crate::error::AgentError;
    pub use crate::scheduler::{RunSummary, Scheduler, SchedulerConfig, SchedulerHandle, Termination};
    pub use crate::trace::{Trace, TraceEvent};
    pub use mas_core::{async_trait, Environment, Literal, Term};
}
