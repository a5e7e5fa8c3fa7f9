pub mod manager;

pub use manager::{BookCandidate, CatalogBook, LibraryError, LibraryManager, SeriesOrder};
