pub mod attempt_dto;
pub mod difficulty_dto;
