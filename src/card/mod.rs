pub mod model;
pub mod pan;
pub mod service;

pub use model::*;
pub use service::CardService;
