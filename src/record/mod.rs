pub mod output;
pub mod matcher;
