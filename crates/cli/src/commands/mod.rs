pub mod board;
pub mod config_cmd;
pub mod history;
pub mod key;
pub mod render;
pub mod suggest;
pub mod voice;
