/// Local filesystem listing and line-reading helpers.
pub mod fs;
