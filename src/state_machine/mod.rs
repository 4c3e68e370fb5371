mod attempt;
mod driver;
mod job;
mod state;

pub use attempt::{Attempt, AttemptRecord};
pub use driver::{run_attempt, AttemptOutcome, AttemptReport};
pub use job::{Job, RetryPolicy};
pub use state::{AttemptState, Event, PollingStateMachine, Step};
