// Result reporting
//
// `summary` turns a finished run into a plain value, `output` decides how that
// value is shown.

pub mod output;
pub mod summary;

pub use output::{ReportFormat, SummaryOutput};
pub use summary::{report, PhaseSummary, Summary, Verdict};
