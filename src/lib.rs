pub mod config;
pub mod dashboard;
pub mod db;
pub mod draft;
pub mod manifest;
pub mod media;
pub mod model;
pub mod pager;
pub mod poller;
pub mod session;
pub mod store;
pub mod submit;
pub mod text;
