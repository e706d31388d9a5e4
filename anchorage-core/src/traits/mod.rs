pub use cas::*;
pub use events::*;
pub use ledger::*;
pub use processor::*;
pub use store::*;

mod cas;
mod events;
mod ledger;
mod processor;
mod store;
