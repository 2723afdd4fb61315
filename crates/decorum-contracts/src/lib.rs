pub mod chat;
pub mod design;
pub mod events;
pub mod models;
pub mod runs;
pub mod session;
pub mod versions;
