pub use primitive_types::{H160, H256, U256};

pub use anchor::*;
pub use events::*;
pub use operation::*;
pub use record::*;
pub use status::*;
pub use sync::*;

mod anchor;
mod events;
mod operation;
mod record;
mod status;
mod sync;
