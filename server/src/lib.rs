pub extern crate actix_web;

pub mod connection;
mod connection_tx;
pub mod handlers;
pub mod server;
pub mod settings;
