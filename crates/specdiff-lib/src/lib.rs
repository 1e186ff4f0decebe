pub mod compare;
pub mod error;
pub mod io;
pub mod recording;
pub mod table;
pub mod welch;
pub mod window;

pub use compare::*;
pub use error::*;
pub use io::*;
pub use recording::*;
pub use table::*;
pub use welch::*;
pub use window::*;
