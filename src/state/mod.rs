//! State transition engine and block assembly

pub mod block_manager;
pub mod state_manager;

pub use block_manager::{BlockManager, BlockManagerError};
pub use state_manager::{StateManager, StateManagerError};
