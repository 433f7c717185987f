//! Exception reporting
//!
//! Renders a caught failure as:
//!
//! ```text
//! origin:line: message
//! offending source line
//!     ^^^^^
//! stack trace (if any)
//! ```
//!
//! The caret underline covers `[start column, end column)` of the offending
//! line, clamped to the line. Failures without a location render as the bare
//! message.

use crate::parser::ast::SourceLocation;

/// Location metadata resolved for a report
#[derive(Debug, Clone, Copy)]
pub struct ReportSite<'a> {
    pub origin: &'a str,
    pub location: SourceLocation,
    /// Full text of the line `location` points into
    pub line_text: &'a str,
}

/// Render an exception report; every line ends with a newline
pub fn render_report(message: &str, site: Option<ReportSite<'_>>, stack_trace: Option<&str>) -> String {
    let Some(site) = site else {
        return format!("{}\n", message);
    };

    let mut report = format!(
        "{}:{}: {}\n{}\n",
        site.origin, site.location.line, message, site.line_text
    );

    let line_len = site.line_text.chars().count();
    let start = site.location.column.saturating_sub(1).min(line_len);
    let end = (start + site.location.len).min(line_len);
    report.push_str(&" ".repeat(start));
    report.push_str(&"^".repeat(end - start));
    report.push('\n');

    if let Some(trace) = stack_trace.filter(|trace| !trace.is_empty()) {
        report.push_str(trace);
        report.push('\n');
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(line_text: &str, column: usize, len: usize) -> ReportSite<'_> {
        ReportSite {
            origin: "test.js",
            location: SourceLocation::new(3, column).with_extent(0, len),
            line_text,
        }
    }

    #[test]
    fn test_message_only_without_site() {
        assert_eq!(render_report("Error: boom", None, Some("ignored")), "Error: boom\n");
    }

    #[test]
    fn test_caret_span() {
        let report = render_report("TypeError: nope", Some(site("let v = x.y;", 11, 1)), None);
        assert_eq!(report, "test.js:3: TypeError: nope\nlet v = x.y;\n          ^\n");
    }

    #[test]
    fn test_zero_width_caret() {
        let report = render_report("SyntaxError: eof", Some(site("f(", 3, 0)), None);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[2], "  ");
    }

    #[test]
    fn test_caret_clamped_to_line() {
        let report = render_report("E", Some(site("abc", 2, 40)), None);
        assert_eq!(report.lines().nth(2), Some(" ^^"));
    }

    #[test]
    fn test_stack_trace_appended() {
        let report = render_report(
            "Error: x",
            Some(site("throw e;", 1, 5)),
            Some("Error: x\n    at f (test.js:3:1)"),
        );
        assert!(report.ends_with("^^^^^\nError: x\n    at f (test.js:3:1)\n"));

        let empty = render_report("Error: x", Some(site("throw e;", 1, 5)), Some(""));
        assert!(empty.ends_with("^^^^^\n"));
    }
}
