//! lock wrappers used to share wallet state between tokio tasks.

pub mod tokio;
