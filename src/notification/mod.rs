pub mod controller;
pub mod digest;
pub mod model;
pub mod service;
