pub mod chat;
pub mod grid;
pub mod net;
pub mod participant;
pub mod time;
