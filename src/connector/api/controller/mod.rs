pub mod chat_controller;
pub mod file_controller;
pub mod progress_controller;
pub mod repository_controller;
