use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::id::{AgentName, MessageId};
use crate::term::Literal;

/// Speech-act type of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Performative {
    Tell,
    Untell,
    Achieve,
    Unachieve,
    AskOne,
    AskAll,
}

impl Performative {
    pub fn as_str(&self) -> &'static str {
        match self {
            Performative::Tell => "tell",
            Performative::Untell => "untell",
            Performative::Achieve => "achieve",
            Performative::Unachieve => "unachieve",
            Performative::AskOne => "askOne",
            Performative::AskAll => "askAll",
        }
    }
}

impl fmt::Display for Performative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Performative {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tell" => Ok(Performative::Tell),
            "untell" => Ok(Performative::Untell),
            "achieve" => Ok(Performative::Achieve),
            "unachieve" => Ok(Performative::Unachieve),
            "askOne" | "askone" | "ask_one" => Ok(Performative::AskOne),
            "askAll" | "askall" | "ask_all" => Ok(Performative::AskAll),
            other => Err(CoreError::InvalidPerformative(other.to_string())),
        }
    }
}

/// An inter-agent message. Immutable once sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: AgentName,
    pub receiver: AgentName,
    pub performative: Performative,
    pub content: Literal,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{},{},{},{},{}>",
            self.id, self.sender, self.performative, self.receiver, self.content
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_performative_round_trips_names() {
        for p in [
            Performative::Tell,
            Performative::Untell,
            Performative::Achieve,
            Performative::Unachieve,
            Performative::AskOne,
            Performative::AskAll,
        ] {
            assert_eq!(p.as_str().parse::<Performative>().unwrap(), p);
        }
    }

    #[test]
    fn test_unknown_performative() {
        assert_eq!(
            "shout".parse::<Performative>(),
            Err(CoreError::InvalidPerformative("shout".to_string()))
        );
    }
}
