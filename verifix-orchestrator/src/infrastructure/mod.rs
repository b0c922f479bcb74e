pub mod tool_registry;

pub use tool_registry::{RegistryError, ToolRegistry};
