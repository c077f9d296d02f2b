pub mod bot;
pub mod commands;
pub mod common;
pub mod configs;
pub mod console;
pub mod presence;
pub mod scheduler;
pub mod sounds;
pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
