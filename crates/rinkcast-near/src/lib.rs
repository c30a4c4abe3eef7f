// Game contract access: the backend trait the match session depends on, and
// its NEAR JSON-RPC implementation.

pub mod backend;
pub mod rpc;
