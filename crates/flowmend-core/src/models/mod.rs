pub mod process;
pub mod session;

pub use process::*;
pub use session::*;
