pub mod attempt_service;
pub mod classifier_service;
pub mod difficulty_service;
pub mod grading_service;
pub mod scheduler_service;
