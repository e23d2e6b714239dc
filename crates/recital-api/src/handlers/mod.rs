pub mod analysis;
pub mod health;
pub mod llm;
pub mod media_upload;
