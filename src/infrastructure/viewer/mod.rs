pub mod viewer;

pub use viewer::{ViewerContext, USER_ID_HEADER};
