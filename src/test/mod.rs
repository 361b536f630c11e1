mod api;
pub mod utils;
