//! Progress bridging between the blocking transfer and the observer
//!
//! - [`channel`] - bounded, ordered conduit with an exactly-once terminal marker
//! - [`relay`] - milestone de-duplication and observer forwarding
//! - [`phase`] - percentage to stage label table
//! - [`throttle`] - optional rate limit for observer calls

pub mod channel;
pub mod phase;
pub mod relay;
pub mod throttle;

pub use channel::{progress_channel, ProgressEvent, ProgressReceiver, ProgressSender};
pub use phase::{PhaseEntry, PhaseTable};
pub use relay::{
    percent_of, MilestoneTracker, ProgressMilestone, ProgressRelay, RelayConfig, RelayExit,
    RelayReport,
};
pub use throttle::ProgressThrottle;
