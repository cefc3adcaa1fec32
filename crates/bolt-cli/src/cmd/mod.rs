pub mod check;
pub mod config;
pub mod descriptor;
pub mod discover;
pub mod ui;
pub mod upstream;
