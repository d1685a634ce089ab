pub mod posting;
pub mod inverted;
pub mod synonym_table;
pub mod term_index;
