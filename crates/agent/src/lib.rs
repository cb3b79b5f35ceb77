//! The workshop assistant's conversation engines.
//!
//! - [`AgentLoop`]: a bounded **Dispatch → Decode → Branch** cycle. The model
//!   either answers, or requests tool calls whose results are appended before
//!   the next round trip. At most [`DEFAULT_MAX_ITERATIONS`] round trips.
//! - [`ChatGateway`]: one round trip without tools, optionally routed to the
//!   reasoning deployment or grounded in knowledge base snippets.

pub mod chat;
pub mod loop_runner;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use chat::{ChatGateway, ChatReply, ChatTurn};
pub use loop_runner::{AgentLoop, AgentRun, DEFAULT_MAX_ITERATIONS, build_conversation};
