pub mod browser;
pub mod castorama;
pub mod catalog;
pub mod http;
pub mod listing;
pub mod manomano;
pub mod pipeline;
pub mod stealth;
pub mod traits;
pub mod types;

pub use pipeline::{run, RunOptions};
