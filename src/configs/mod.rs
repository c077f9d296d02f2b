pub mod base;
pub mod bot;
pub mod console;
pub mod logging;

pub use base::*;
pub use bot::*;
pub use console::*;
pub use logging::*;
