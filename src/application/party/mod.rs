mod create_party;
mod end_party;
mod get_party_session;
mod join_party;
mod leave_party;

pub use create_party::*;
pub use end_party::*;
pub use get_party_session::*;
pub use join_party::*;
pub use leave_party::*;
