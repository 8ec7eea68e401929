pub mod drift_corrector;
pub mod guest_sync;

pub use drift_corrector::*;
pub use guest_sync::*;
