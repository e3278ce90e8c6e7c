//! Input layer: ccusage report documents.

mod report_parser;

pub use report_parser::parse_report_file;
#[cfg(test)]
pub use report_parser::parse_report_str;
