pub mod common;
pub mod completions;
pub mod profile;
pub mod queue;
pub mod record;
