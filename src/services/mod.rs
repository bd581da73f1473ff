pub mod assignment_service;
pub mod attempt_service;
pub mod catalog_service;
pub mod directory_service;
pub mod export_service;
pub mod grading_service;
pub mod notification_service;
pub mod question_source_service;
pub mod report_service;
