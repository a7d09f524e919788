//! Outbound actions for zalobot.
//!
//! The streaming protocol turns model output into [`Action`]s and hands them
//! to a [`StreamCallbacks`] implementation, normally the Zalo platform
//! adapter. Two dispatchers ship with the crate:
//!
//! | Dispatcher | Description |
//! |------------|-------------|
//! | [`MemoryDispatcher`] | Records every call; used by tests |
//! | [`ConsoleDispatcher`] | Prints every call; used by the CLI |
//!
//! ## Example
//!
//! ```rust,no_run
//! use zalobot_messages::{Action, MemoryDispatcher, StreamCallbacks};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = MemoryDispatcher::new();
//!     dispatcher.dispatch(&Action::message("Xin chào", None)).await?;
//!     assert_eq!(dispatcher.messages().await, vec!["Xin chào".to_string()]);
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod callbacks;
pub mod dispatchers;
pub mod error;

pub use action::{Action, ActionKind, ReactionKind, ReactionSpec, UndoSelector};
pub use callbacks::StreamCallbacks;
pub use dispatchers::{ConsoleDispatcher, DispatchEvent, MemoryDispatcher};
pub use error::{Error, Result};
