// Match session runtime: replay pacing, the poll loop that feeds it, and the
// controller that starts a session for the local account.

pub mod controller;
pub mod protocol;
pub mod replay;
pub mod session;
