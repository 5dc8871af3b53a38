pub mod answers;
pub mod app;
pub mod auth;
pub mod config;
pub mod courses;
pub mod enrollments;
pub mod error;
pub mod lessons;
pub mod policy;
pub mod profiles;
pub mod quizzes;
pub mod state;
pub mod store;
pub mod uploads;
pub mod validation;
