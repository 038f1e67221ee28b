mod loader;
mod utils;

pub use loader::*;
pub use utils::*;
