pub mod ack;
pub mod command;
pub mod measurement;
pub mod snapshot;
