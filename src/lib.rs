// MoBoggle: a two player word game over a direct TCP link, played in the terminal

pub mod app;
pub mod config;
pub mod debug;
pub mod game;
pub mod menu;
pub mod network;
pub mod tasks;
pub mod ui;
pub mod workflow;
