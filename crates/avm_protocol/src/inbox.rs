//! The message inbox: a staging buffer plus the delivered queue.
//!
//! Hosts stage messages at any time with [`Inbox::send_message`];
//! nothing becomes machine-observable until [`Inbox::deliver_messages`]
//! appends the whole staged batch to the delivered queue in one step.
//! The delivered queue is itself a value — the empty tuple, extended
//! as `Tuple(previous, message)` — so inbox identity participates in
//! the machine hash.

use ethereum_types::H256;

use avm_value::Value;

use crate::message::Message;

#[derive(Debug, Clone)]
pub struct Inbox {
    delivered: Value,
    staged: Vec<Message>,
}

impl Inbox {
    pub fn new() -> Inbox {
        Inbox {
            delivered: Value::none(),
            staged: Vec::new(),
        }
    }

    /// Stage a message for the next delivery.
    pub fn send_message(&mut self, msg: Message) {
        self.staged.push(msg);
    }

    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Atomically append every staged message to the delivered queue.
    /// Returns the delivered batch so the caller can credit balances.
    pub fn deliver_messages(&mut self) -> Vec<Message> {
        let batch = std::mem::take(&mut self.staged);
        for msg in &batch {
            self.delivered = Value::tuple2(self.delivered.clone(), msg.as_value());
        }
        batch
    }

    /// The delivered queue as seen by the `INBOX` opcode.
    pub fn receive(&self) -> Value {
        self.delivered.clone()
    }

    pub fn hash(&self) -> H256 {
        self.delivered.hash()
    }
}

impl Default for Inbox {
    fn default() -> Inbox {
        Inbox::new()
    }
}
