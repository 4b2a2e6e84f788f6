pub mod selection;
pub mod service;

pub use selection::Selection;
pub use service::Session;
