// Error modeling shared by every layer of the crate.
pub mod error;
