pub mod discussions;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod manager;
pub mod messages;
pub mod people;
pub mod rooms;
pub mod runs;
pub mod topics;
pub mod types;
pub mod vector;

pub use error::{Result, StoreError};
pub use manager::ArchiveStore;
pub use messages::NewMessage;
