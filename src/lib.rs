//! Gateway server for NFC reader devices: configuration loading and the
//! TCP transport that feeds reader messages into [`nfcsec_lib::Pipeline`].

pub mod config;
pub mod error;
pub mod server;
