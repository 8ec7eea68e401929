mod party_event;
mod playback_state;

pub use party_event::*;
pub use playback_state::*;
