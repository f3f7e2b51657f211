//! Types shared by the pop server and its clients.
//!
//! Validation here is authoritative on the server and advisory on the client.
//! Both sides call the same functions.

pub mod count;
pub mod handle;
pub mod payloads;

pub use count::{InvalidCount, MAX_BATCH, PopCount};
pub use handle::{Handle, InvalidHandle, MAX_HANDLE_LEN};

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 100;
pub const MAX_LEADERBOARD_LIMIT: usize = 500;
