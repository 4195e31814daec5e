//! Typed models

mod column;
mod metadata;
mod record;
mod row;
mod row_id;
mod value;

pub use column::*;
pub use metadata::*;
pub use record::*;
pub use row::*;
pub use row_id::*;
pub use value::*;
