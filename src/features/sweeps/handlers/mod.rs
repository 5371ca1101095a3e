mod sweep_handler;

pub use sweep_handler::*;
