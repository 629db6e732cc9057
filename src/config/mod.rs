pub mod output;
pub mod project;

pub use project::Project;
