//! Ratatui front-end. `App` owns the connection plus the current screen and
//! mode; `run_app` drives the terminal until the user quits.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
