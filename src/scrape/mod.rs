pub mod controller;
pub mod parser;

pub use controller::{ScrapeController, ScrapeOutcome, StopReason};
pub use parser::{parse_page, BallRole, PageParse, RawRow, RowRejection, TaggedBall};
