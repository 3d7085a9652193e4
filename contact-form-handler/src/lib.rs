pub mod config;
pub mod contact;
pub mod form;
pub mod handler;
pub mod mailgun;
pub mod message;
pub mod secrets;
pub mod sender;
pub mod smtp;
