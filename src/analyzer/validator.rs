//! External validation tools for PDF and TIFF files

use crate::output::Report;
use std::path::Path;
use std::process::{Command, Stdio};

/// Upper bound for tool output kept in a report
const MAX_TOOL_OUTPUT: usize = 64 * 1024;

/// Options controlling when PDF validators run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PdfAValidationOptions {
    /// Skip files that do not claim PDF/A conformance
    pub validate_only_pdfa: bool,
}

/// Locations of the external validators
#[derive(Debug, Clone, Default)]
pub struct Validators {
    pub jhove: Option<String>,
    pub verapdf: Option<String>,
    pub pdfbox_validator: Option<String>,
    pub callas_pdfapilot: Option<String>,
    pub dpf_manager: Option<String>,
    pub three_heights_validator: Option<String>,
    pub three_heights_license: Option<String>,
    pub pdfa_options: PdfAValidationOptions,
}

impl Validators {
    pub fn has_pdf_validators(&self) -> bool {
        self.jhove.is_some()
            || self.verapdf.is_some()
            || self.pdfbox_validator.is_some()
            || self.callas_pdfapilot.is_some()
            || self.three_heights_validator.is_some()
    }

    /// Runs every configured PDF validator on `path`
    pub fn validate_pdf(&self, path: &Path) -> Vec<Report> {
        let mut reports = Vec::new();

        if let Some(script) = &self.jhove {
            let mut command = Command::new(script);
            command.args(["-m", "PDF-hul", "-h", "xml"]).arg(path);
            reports.push(run_tool("jhove", &mut command));
        }

        if let Some(cli) = &self.verapdf {
            let mut command = Command::new(cli);
            command.args(["--format", "text"]).arg(path);
            reports.push(run_tool("verapdf", &mut command));
        }

        if let Some(jar) = &self.pdfbox_validator {
            let mut command = Command::new("java");
            command.arg("-jar").arg(jar).arg(path);
            reports.push(run_tool("pdfboxvalidator", &mut command));
        }

        if let Some(cli) = &self.callas_pdfapilot {
            let mut command = Command::new(cli);
            command.arg("--analyze").arg(path);
            reports.push(run_tool("callaspdfapilot", &mut command));
        }

        if let Some(cli) = &self.three_heights_validator {
            let mut command = Command::new(cli);
            if let Some(key) = &self.three_heights_license {
                command.arg("-lk").arg(key);
            }
            command.arg(path);
            reports.push(run_tool("threeheightsvalidator", &mut command));
        }

        reports
    }

    /// Runs the TIFF validator on `path`, if configured
    pub fn validate_tiff(&self, path: &Path) -> Option<Report> {
        let jar = self.dpf_manager.as_ref()?;
        let mut command = Command::new("java");
        command.arg("-jar").arg(jar).arg("check").arg(path);
        Some(run_tool("dpfmanager", &mut command))
    }
}

/// Runs a validator and records exit status and output
///
/// A tool that cannot be started yields a report with `status="error"`; it
/// never fails the analysis.
fn run_tool(name: &str, command: &mut Command) -> Report {
    let mut report = Report::new("validation").with_attribute("tool", name);

    match command.stdin(Stdio::null()).stderr(Stdio::null()).output() {
        Ok(output) => {
            let exit_code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |code| code.to_string());
            report.set_attribute("exitcode", exit_code);
            report.set_attribute("passed", output.status.success());

            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            if text.len() > MAX_TOOL_OUTPUT {
                let mut end = MAX_TOOL_OUTPUT;
                while !text.is_char_boundary(end) {
                    end -= 1;
                }
                text.truncate(end);
                report.set_attribute("truncated", true);
            }
            report.text = text.trim().to_string();
        }
        Err(e) => {
            tracing::warn!("Cannot run validator {}: {}", name, e);
            report.set_attribute("status", "error");
            report.set_attribute("message", e);
        }
    }

    report
}
