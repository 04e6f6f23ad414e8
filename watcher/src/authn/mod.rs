//! Bearer-token authentication

pub mod token_mngr;
