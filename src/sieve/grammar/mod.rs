pub mod descriptor;
pub mod registry;
pub mod resource;

pub use registry::KeywordRegistry;
