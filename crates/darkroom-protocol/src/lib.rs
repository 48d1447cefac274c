pub mod error;
pub mod generate_content;
pub mod list_models;
pub mod types;
