mod app;
pub use app::*;

pub mod floating_score;
pub mod input;
pub mod welcome_screen;

mod window_resizing;
