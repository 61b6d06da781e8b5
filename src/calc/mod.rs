pub mod checking;
pub mod context;
pub mod error;
pub mod names;
pub mod process;
pub mod step;
pub mod types;

pub use checking::check_state;
pub use context::{Context, Env};
pub use error::{Entity, Error, ErrorKind, Side};
pub use names::{Id, QualSym, Rev, Sym};
pub use step::take_with;
