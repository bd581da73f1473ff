pub mod assignment;
pub mod attempt;
pub mod catalog;
pub mod directory;
pub mod notification;
pub mod question;
pub mod user;
