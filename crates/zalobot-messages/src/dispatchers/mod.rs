//! Built-in [`StreamCallbacks`](crate::StreamCallbacks) implementations.

pub mod console;
pub mod memory;

pub use console::ConsoleDispatcher;
pub use memory::{DispatchEvent, MemoryDispatcher};
