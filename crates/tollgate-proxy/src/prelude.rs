pub use tollgate_core::app::App;
pub use tollgate_types::prelude::*;

// vim: ts=4
