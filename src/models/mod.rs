pub mod content_source;
pub mod question;
