//! HTTP front end for the EMDR remote session store.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod rate_limit;
pub mod state;
