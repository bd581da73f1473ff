pub mod assignment_dto;
pub mod attempt_dto;
pub mod directory_dto;
pub mod report_dto;
pub mod test_dto;
