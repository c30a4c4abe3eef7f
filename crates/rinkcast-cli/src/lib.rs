// Terminal front end for the rinkcast binary.

pub mod input;
pub mod presenter;
