pub mod ai_service;
pub mod extractor_service;
pub mod generation_service;
pub mod prompt_service;
pub mod quiz_service;
pub mod workspace_service;
