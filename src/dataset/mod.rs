/// Dataset module: typed cells and copy-on-write tables
pub mod value;
pub mod frame;

pub use value::{parse_bool, parse_date, parse_number, CellValue, TypeTag};
pub use frame::{Column, Dataset};
