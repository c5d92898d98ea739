//! Output module for analysis reports and run summaries
//!
//! This module handles:
//! - The [`Report`] tree every analyzer produces
//! - Serializing reports as XML fragments through a [`ReportSink`]
//! - Printing end-of-run statistics

pub mod stats;
mod traits;
pub mod xml;

pub use stats::{print_statistics, PipelineSummary};
pub use traits::{
    CollectingSink, OutputError, OutputResult, Report, ReportSink, XmlReportSink,
};
pub use xml::{
    dexmlify, format_date, format_date_time, format_map, xml_node_to_text, xmlify, xmlify_lines,
};
