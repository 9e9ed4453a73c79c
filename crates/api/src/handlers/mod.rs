pub mod artifact;
pub mod chat;
pub mod project;
pub mod tasks;
pub mod templates;
