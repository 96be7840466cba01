pub mod analysis;
pub mod draft;

pub use analysis::*;
pub use draft::*;
