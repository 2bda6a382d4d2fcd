pub mod comments;
pub mod districts;
pub mod health;
pub mod issues;
pub mod jobs;
pub mod notifications;
pub mod profiles;
