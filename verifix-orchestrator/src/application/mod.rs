pub mod analyzer;
pub mod fix_loop;
