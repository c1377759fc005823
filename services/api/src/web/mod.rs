pub mod chat_task;
pub mod protocol;
pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible to the binary that
// will build the web server router.
pub use rest::{chapter_progress_handler, chat_turn_handler};
