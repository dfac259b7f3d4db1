pub mod eu4_date;
pub mod raw_parser;
pub mod stream;

pub use eu4_date::{EU4Date, Month};
