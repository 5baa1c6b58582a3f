//! Third-party Verilog toolchain invocations: verilator for lint, iverilog
//! and vvp for simulation. Each invocation gets its own scratch space that
//! is removed when the handle drops.

use crate::constants::{
    COMPILE_BINARY, LINT_BINARY, SIM_BINARY, SIM_MODULE_FILE, SIM_OUT_FILE, SIM_TB_FILE,
    SIM_VCD_FILE,
};
use crate::types::{Result, VeristreamError};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tokio::process::Command;

lazy_static! {
    // %Error: module.v:3:10: message  /  %Warning-WIDTH: ...
    static ref DIAGNOSTIC_LINE: Regex =
        Regex::new(r"^%(Error|Warning)[^:]*:[^:]+:(\d+):(\d+):\s*(.+)$").unwrap();
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Run `verilator --lint-only --Wall` over the submitted source and parse
/// its diagnostics.
pub async fn lint_source(code: &str) -> Result<Vec<Diagnostic>> {
    let file = tempfile::Builder::new()
        .suffix(".v")
        .tempfile()
        .map_err(VeristreamError::Io)?;
    tokio::fs::write(file.path(), code)
        .await
        .map_err(VeristreamError::Io)?;

    let output = Command::new(LINT_BINARY)
        .args(["--lint-only", "--Wall"])
        .arg(file.path())
        .output()
        .await
        .map_err(|e| map_spawn_error(LINT_BINARY, e))?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    let diagnostics = parse_verilator_output(&combined);
    tracing::debug!("[lint] {} diagnostics", diagnostics.len());
    Ok(diagnostics)
}

/// Parse `%Error:`/`%Warning:` lines of the form `file:line:col: message`.
/// Lines that do not match are tool chatter and are dropped.
pub fn parse_verilator_output(output: &str) -> Vec<Diagnostic> {
    output
        .lines()
        .filter_map(|line| {
            let caps = DIAGNOSTIC_LINE.captures(line)?;
            Some(Diagnostic {
                line: caps[2].parse().ok()?,
                column: caps[3].parse().ok()?,
                severity: if &caps[1] == "Error" {
                    Severity::Error
                } else {
                    Severity::Warning
                },
                message: caps[4].trim().to_string(),
            })
        })
        .collect()
}

/// Compile the module and testbench with iverilog, then run the result
/// under vvp inside the scratch directory so `$dumpfile` output lands
/// there. Compile and runtime failures are reported in the logs, not as
/// HTTP errors; only a missing toolchain is.
pub async fn simulate(code: &str, testbench: &str) -> Result<String> {
    let dir = tempfile::tempdir().map_err(VeristreamError::Io)?;
    let module_path = dir.path().join(SIM_MODULE_FILE);
    let tb_path = dir.path().join(SIM_TB_FILE);
    let out_path = dir.path().join(SIM_OUT_FILE);

    tokio::fs::write(&module_path, code)
        .await
        .map_err(VeristreamError::Io)?;
    tokio::fs::write(&tb_path, testbench)
        .await
        .map_err(VeristreamError::Io)?;

    let mut logs = String::new();

    let compile = Command::new(COMPILE_BINARY)
        .arg("-o")
        .arg(&out_path)
        .arg(&module_path)
        .arg(&tb_path)
        .output()
        .await
        .map_err(|e| map_spawn_error(COMPILE_BINARY, e))?;
    logs.push_str(&String::from_utf8_lossy(&compile.stdout));
    logs.push_str(&String::from_utf8_lossy(&compile.stderr));
    if !compile.status.success() {
        logs.push_str("\n[Compiler error] compilation failed\n");
        return Ok(logs);
    }

    let run = Command::new(SIM_BINARY)
        .arg(&out_path)
        .current_dir(dir.path())
        .output()
        .await
        .map_err(|e| map_spawn_error(SIM_BINARY, e))?;
    logs.push_str(&String::from_utf8_lossy(&run.stdout));
    logs.push_str(&String::from_utf8_lossy(&run.stderr));
    if !run.status.success() {
        logs.push_str("\n[Simulation error] simulation failed\n");
        return Ok(logs);
    }

    if dir.path().join(SIM_VCD_FILE).exists() {
        logs.push_str("\nVCD waveform file generated successfully.\n");
    } else {
        logs.push_str("\n[Info] No VCD file generated (testbench may not dump waveforms).\n");
    }

    Ok(logs)
}

fn map_spawn_error(binary: &str, e: std::io::Error) -> VeristreamError {
    if e.kind() == std::io::ErrorKind::NotFound {
        VeristreamError::Toolchain(format!("{} is not installed or not on PATH", binary))
    } else {
        VeristreamError::Io(e)
    }
}

/// PATH lookup for readiness checks.
pub fn binary_on_path(name: &str) -> bool {
    let path = match std::env::var_os("PATH") {
        Some(p) => p,
        None => return false,
    };
    std::env::split_paths(&path).any(|dir| dir.join(name).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verilator_diagnostics() {
        let output = "\
%Error: /tmp/x.v:3:10: syntax error, unexpected endmodule\n\
some unrelated chatter\n\
%Warning-WIDTH: /tmp/x.v:5:2: Operator ASSIGN expects 8 bits\n";
        let diags = parse_verilator_output(output);
        assert_eq!(diags.len(), 2);
        assert_eq!(
            diags[0],
            Diagnostic {
                line: 3,
                column: 10,
                severity: Severity::Error,
                message: "syntax error, unexpected endmodule".into(),
            }
        );
        assert_eq!(diags[1].severity, Severity::Warning);
        assert_eq!(diags[1].line, 5);
    }

    #[test]
    fn test_parse_skips_non_matching_lines() {
        let diags = parse_verilator_output("- V e r i l a t o r: exiting\n");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_value(Severity::Warning).unwrap();
        assert_eq!(json, "warning");
    }
}
