pub mod json;
pub mod report;

pub use json::{build_report, JsonReport};
pub use report::render_text;
