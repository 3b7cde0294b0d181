pub mod reaction;

pub use reaction::{plan, ReactionPlan};
