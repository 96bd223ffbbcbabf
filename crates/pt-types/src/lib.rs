pub mod errors;
pub mod prediction;
pub mod process;
pub mod profile;
pub mod result;
pub mod scenario;

pub use errors::*;
pub use prediction::*;
pub use process::*;
pub use profile::*;
pub use result::*;
pub use scenario::*;
