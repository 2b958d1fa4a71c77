//! The reflection session engine: a server-authoritative conversation
//! controller driving a multi-turn guided interview. Two chained oracle
//! calls per turn (analyst, then facilitator), a final summary + evaluation
//! pair at submission, and a policy snapshot frozen at session creation.

pub mod controller;
pub mod evaluator;
pub mod interviewer;
pub mod parse;
pub mod policy;
pub mod prompts;
pub mod store;
pub mod topics;

/// Hard ceiling on interview turns; the analyst is told to wrap up as the
/// conversation approaches it.
pub const MAX_TURNS: i32 = 16;

/// How far back submitted summaries are fed into the analyst for
/// cross-session continuity, and how many at most.
pub const RECENT_SUMMARIES_DAYS: i64 = 14;
pub const RECENT_SUMMARIES_LIMIT: i64 = 3;
