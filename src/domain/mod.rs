pub mod battery;
pub mod load;
pub mod program;
pub mod schedule;
pub mod types;

pub use battery::*;
pub use load::*;
pub use program::*;
pub use schedule::*;
pub use types::*;
