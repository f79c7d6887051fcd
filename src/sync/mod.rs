pub mod remote_ledger;

pub use remote_ledger::{PendingChange, RemoteLedger};
