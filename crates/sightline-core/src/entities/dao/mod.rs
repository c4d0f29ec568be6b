pub mod chat;
pub mod image;

pub use chat::{ChatMessage, ChatRole};
pub use image::{ImageAnalysis, ImageRecord};
