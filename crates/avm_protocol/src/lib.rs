//! AVM protocol types.
//!
//! Everything that crosses the machine boundary: token identifiers,
//! messages, the staged/delivered inbox, the balance tracker that
//! authorizes sends, time bounds, and the assertion record returned by
//! an execution run.

pub mod assertion;
pub mod balance;
pub mod inbox;
pub mod message;
pub mod timebounds;
pub mod token;

pub use assertion::{Assertion, TraceStep};
pub use balance::{BalanceError, BalanceTracker};
pub use inbox::Inbox;
pub use message::Message;
pub use timebounds::TimeBounds;
pub use token::{TokenType, TOKEN_TYPE_LEN};
