// Application-layer boundaries: the capabilities the scraper core consumes

pub mod ports;

pub use ports::{DrawStore, PageFetcher};
