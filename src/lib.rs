// lib.rs
// Library modules for the jigsaw arena server

pub mod defs;
pub mod logging;
pub mod error;
pub mod config;
pub mod piece;
pub mod piece_source;
pub mod session;
pub mod arbiter;
pub mod room;
pub mod registry;
pub mod archive;
pub mod protocol;
pub mod dispatcher;
pub mod server;
pub mod status;
pub mod client;
