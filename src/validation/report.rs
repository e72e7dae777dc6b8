//! Issue reports for source annotation audits.
//!
//! `check-voc` collects everything wrong with a VOC dataset in one pass into
//! a [`ValidationReport`].

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Issues found during an audit, in discovery order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Returns the number of errors in the report.
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// Returns the number of warnings in the report.
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    pub fn count(&self, code: IssueCode) -> usize {
        self.issues.iter().filter(|i| i.code == code).count()
    }

    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.error_count() == 0
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return writeln!(f, "No issues found");
        }

        writeln!(
            f,
            "{} error(s) and {} warning(s):",
            self.error_count(),
            self.warning_count()
        )?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }

        Ok(())
    }
}

/// A single audit finding.
#[derive(Clone, Debug, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    pub context: IssueContext,
}

impl ValidationIssue {
    pub fn new(
        severity: Severity,
        code: IssueCode,
        message: impl Into<String>,
        context: IssueContext,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            context,
        }
    }

    pub fn error(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Error, code, message, context)
    }

    pub fn warning(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Warning, code, message, context)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN ",
        };
        write!(
            f,
            "[{}] {:?} in {}: {}",
            severity, self.code, self.context, self.message
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Suspicious, but the file is still usable.
    Warning,
    /// The file or object cannot be used as authored.
    Error,
}

/// A stable code identifying the type of issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    // File pairing
    /// An annotation has no image with the same stem.
    AnnotationWithoutImage,
    /// An image has no annotation with the same stem.
    ImageWithoutAnnotation,

    // File structure
    /// The XML could not be parsed.
    XmlParseFailed,
    /// No `<size>` block.
    MissingSize,
    /// No `<filename>`.
    MissingFilename,
    /// Width or height below one pixel.
    DegenerateImageSize,
    /// The annotation has no objects.
    NoObjects,

    // Objects
    /// An object has no `<name>`.
    MissingObjectName,
    /// An object has no readable `<bndbox>`.
    MalformedBox,
    /// A class name is not in the class table.
    UnknownClassName,
    /// Box corners are swapped on at least one axis.
    InvertedBox,
    /// Box has zero width or height, or a non-finite coordinate.
    DegenerateBox,
    /// Box extends beyond the image.
    BoxOutOfFrame,
    /// Box area is below the minimum.
    BoxTooSmall,
}

/// Where an issue occurred.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum IssueContext {
    Dataset,
    File { path: PathBuf },
    Object { path: PathBuf, index: usize },
}

impl fmt::Display for IssueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueContext::Dataset => write!(f, "dataset"),
            IssueContext::File { path } => write!(f, "{}", path.display()),
            IssueContext::Object { path, index } => {
                write!(f, "{} object {}", path.display(), index)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_severity_and_code() {
        let mut report = ValidationReport::new();
        report.add(ValidationIssue::error(
            IssueCode::InvertedBox,
            "xmin > xmax",
            IssueContext::Object {
                path: PathBuf::from("a.xml"),
                index: 0,
            },
        ));
        report.add(ValidationIssue::warning(
            IssueCode::NoObjects,
            "annotation has no objects",
            IssueContext::File {
                path: PathBuf::from("b.xml"),
            },
        ));

        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.count(IssueCode::InvertedBox), 1);
        assert!(!report.is_ok());
        assert!(report
            .to_string()
            .contains("[ERROR] InvertedBox in a.xml object 0: xmin > xmax"));
    }
}
