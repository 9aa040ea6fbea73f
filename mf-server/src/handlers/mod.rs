pub mod description;
pub mod download;
pub mod enhance;
pub mod health;
pub mod media;
pub mod publish;
pub mod selection;
pub mod session;
pub mod triage;
pub mod upload;
