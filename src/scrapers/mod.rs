pub mod browser;
pub mod standvirtual;
pub mod traits;
pub mod types;

pub use browser::StandVirtualBrowser;
pub use standvirtual::StandVirtualScraper;
pub use traits::{PageFetcher, VehicleSource};
