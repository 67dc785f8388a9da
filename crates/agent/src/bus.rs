use std::collections::{BTreeMap, VecDeque};

use mas_core::{AgentName, Message};

use crate::error::{AgentError, Result};

/// Mailboxes of every live agent.
///
/// One FIFO queue per receiver, so messages from one sender to one receiver
/// are delivered in send order.
#[derive(Debug, Default)]
pub struct MessageBus {
    mailboxes: BTreeMap<AgentName, VecDeque<Message>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: AgentName) {
        self.mailboxes.entry(agent).or_default();
    }

    /// Removes the mailbox of `agent`, returning the messages it still held.
    pub fn unregister(&mut self, agent: &AgentName) -> Vec<Message> {
        self.mailboxes
            .remove(agent)
            .map(Vec::from)
            .unwrap_or_default()
    }

    pub fn contains(&self, agent: &AgentName) -> bool {
        self.mailboxes.contains_key(agent)
    }

    pub fn send(&mut self, message: Message) -> Result<()> {
        match self.mailboxes.get_mut(&message.receiver) {
            Some(queue) => {
                queue.push_back(message);
                Ok(())
            }
            None => Err(AgentError::UnknownRecipient(message.receiver)),
        }
    }

    /// Drains every pending message of `agent`, oldest first.
    pub fn receive(&mut self, agent: &AgentName) -> Vec<Message> {
        self.mailboxes
            .get_mut(agent)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn has_pending(&self, agent: &AgentName) -> bool {
        self.mailboxes.get(agent).is_some_and(|q| !q.is_empty())
    }

    pub fn pending(&self) -> usize {
        self.mailboxes.values().map(VecDeque::len).sum()
    }

    /// Registered agents in name order.
    pub fn recipients(&self) -> impl Iterator<Item = &AgentName> {
        self.mailboxes.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mas_core::{Literal, MessageId, Performative};

    fn message(id: u64, from: &str, to: &str, content: &str) -> Message {
        Message {
            id: MessageId(id),
            sender: from.into(),
            receiver: to.into(),
            performative: Performative::Tell,
            content: Literal::new(content),
        }
    }

    #[test]
    fn test_per_pair_order() {
        let mut bus = MessageBus::new();
        bus.register("b".into());
        for (i, c) in ["m1", "m2", "m3"].iter().enumerate() {
            bus.send(message(i as u64, "a", "b", c)).unwrap();
        }
        bus.send(message(9, "c", "b", "x")).unwrap();

        let received: Vec<_> = bus
            .receive(&"b".into())
            .into_iter()
            .filter(|m| m.sender.as_str() == "a")
            .map(|m| m.content.functor)
            .collect();
        assert_eq!(received, vec!["m1", "m2", "m3"]);
        assert!(!bus.has_pending(&"b".into()));
    }

    #[test]
    fn test_unknown_recipient() {
        let mut bus = MessageBus::new();
        let err = bus.send(message(1, "a", "ghost", "hi")).unwrap_err();
        assert!(matches!(err, AgentError::UnknownRecipient(n) if n.as_str() == "ghost"));
    }

    #[test]
    fn test_unregister_discards_mail() {
        let mut bus = MessageBus::new();
        bus.register("b".into());
        bus.send(message(1, "a", "b", "hi")).unwrap();
        assert_eq!(bus.unregister(&"b".into()).len(), 1);
        assert!(bus.send(message(2, "a", "b", "hi")).is_err());
        assert_eq!(bus.pending(), 0);
    }
}
