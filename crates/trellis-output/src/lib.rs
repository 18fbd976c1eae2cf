//! Writes trellis displays to disk: panel assets, `metaData`,
//! `displayInfo`, the root `displayList`, and the app `config`.

pub mod documents;
pub mod materialize;
pub mod writer;

pub use documents::{
    AppConfig, DisplayInfo, DisplayListEntry, OutputFormat, SCHEMA_VERSION, read_display_info,
    read_document,
};
pub use materialize::PLACEHOLDER_STEM;
pub use writer::{
    DISPLAYS_DIR, DisplayContent, ViewerLauncher, WriteOptions, WrittenDisplayHandle,
    display_dir_name, write_display,
};
