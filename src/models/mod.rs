pub mod field;
pub mod issue;
pub mod search;
pub mod status;

pub use field::*;
pub use issue::*;
pub use search::*;
pub use status::*;
