pub mod money;
pub mod period;

pub use money::{parse_number, Price, PriceParseError};
pub use period::DateRange;
