use thiserror::Error;

use mas_agent::AgentError;
use mas_env::EnvError;
use mas_lang::SystemError;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    System(#[from] SystemError),

    #[error(transparent)]
    Environment(#[from] EnvError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Failed to encode trace: {0}")]
    Trace(#[from] serde_json::Error),
}

impl RunnerError {
    /// 2 for a system file that cannot be loaded, 1 for anything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunnerError::System(_) | RunnerError::Environment(_) => 2,
            RunnerError::Agent(_) | RunnerError::Trace(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use mas_core::AgentName;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes() {
        let missing = RunnerError::from(SystemError::UnsupportedFormat(PathBuf::from("x.txt")));
        assert_eq!(missing.exit_code(), 2);
        let env = RunnerError::from(EnvError::UnknownKind("house".into()));
        assert_eq!(env.exit_code(), 2);
        let agent = RunnerError::from(AgentError::AgentNotFound(AgentName::from("a")));
        assert_eq!(agent.exit_code(), 1);
    }
}
