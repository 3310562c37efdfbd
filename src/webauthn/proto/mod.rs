pub mod constants;
pub mod raw_message;
pub mod web_message;
