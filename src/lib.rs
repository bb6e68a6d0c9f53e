pub mod application;
pub mod data;
pub mod domain;
pub mod gateway;
pub mod infrastructure;
pub mod presentation;
