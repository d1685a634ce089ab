pub mod results;
pub mod prefix;
pub mod fuzzy;
pub mod executor;
