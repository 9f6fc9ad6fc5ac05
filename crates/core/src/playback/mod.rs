pub mod playback;
pub mod scheduler;

pub use playback::{Playback, PlaybackState};
pub use scheduler::Scheduler;
