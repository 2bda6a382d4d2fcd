pub mod controller;
pub mod geometry;
pub mod model;
pub mod resolver;
pub mod service;
pub mod slug;
