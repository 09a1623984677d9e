//! The response loop — the heart of AlterEgo.
//!
//! Each visitor turn follows the same cycle:
//!
//! 1. **Build** the message sequence (persona prompt + history + new message)
//! 2. **Send** it to the completion service with the tool schemas attached
//! 3. **If tool calls**: run each tool, append the results, loop back to step 2
//! 4. **Otherwise**: return the answer, or stream it in growing prefixes
//!
//! The loop ends when the model stops asking for tools or the round cap is hit.

pub mod response_loop;

pub use response_loop::{ResponseLoop, DEFAULT_MAX_TOOL_ROUNDS};
