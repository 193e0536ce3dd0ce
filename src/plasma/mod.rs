//! Plasma chain data types: state updates, transactions, blocks and checkpoints

pub mod block;
pub mod checkpoint;
pub mod receipt;
pub mod state_update;
pub mod transaction;

pub use block::Block;
pub use checkpoint::Checkpoint;
pub use receipt::{ReceiptStatus, TransactionReceipt};
pub use state_update::StateUpdate;
pub use transaction::{SignedTransaction, Transaction};
