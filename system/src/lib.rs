pub extern crate serde;
pub extern crate serde_json;

mod broadcast;
mod document;
mod document_store;
mod error;
mod message;
mod share_registry;
mod storage;
mod subscription;
mod types;

pub use broadcast::*;
pub use document::*;
pub use document_store::*;
pub use error::*;
pub use message::*;
pub use share_registry::*;
pub use storage::*;
pub use subscription::*;
pub use types::*;
