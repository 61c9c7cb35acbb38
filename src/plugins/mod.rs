//! Built-in crawl plugins.

pub mod screenshot;

pub use screenshot::{
    demo_title, screenshot_file_name, CaptureFailure, CaptureSummary, CaptureVariant, DemoCatalog, DemoInfo,
    DemoScreenshotOptions, DemoScreenshotPlugin,
};
