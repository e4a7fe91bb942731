// Library surface for the binary, headless integration tests and reuse.
pub mod app;
pub mod app_dirs;
pub mod audio;
pub mod config;
pub mod controller;
pub mod display;
pub mod form;
pub mod notify;
pub mod runtime;
pub mod timer;
pub mod ui;

pub use app::App;
pub use controller::TimerController;
