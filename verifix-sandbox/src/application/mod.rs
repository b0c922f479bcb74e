pub mod executor;
pub mod template;
pub mod workspace;
