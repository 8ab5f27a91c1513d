pub mod app;
pub mod audio;
pub mod config;
pub mod controller;
pub mod jukebox;
pub mod model;
pub mod player;
pub mod playlist;
pub mod version;
