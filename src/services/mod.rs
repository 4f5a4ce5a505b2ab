pub mod directory;
pub mod overpass;

pub use directory::{DirectoryService, IngestReport};
pub use overpass::OverpassClient;
