//! Human-readable error descriptions and structured JSON error formatting.

use motorcheck_core::error::{BuildError, DiagError};

/// Process exit code when at least one port failed (or never reached a verdict).
pub const EXIT_PORT_FAILED: i32 = 3;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingBus => {
                "What happened: No port bus was provided to the diagnostics engine.\nLikely causes: The bus failed to initialize or was not wired into the builder.\nHow to fix: Ensure the bus is created successfully and passed via with_bus(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML or the reference table.\nHow to fix: Edit the config file, then rerun `motorcheck self-check`."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<DiagError>() {
        return match de {
            DiagError::InvalidPort { port, ports } => format!(
                "What happened: Port {} does not exist.\nLikely causes: Port numbers run from 1 to {ports} with the current bus.ports setting.\nHow to fix: Pick a port in range or raise bus.ports (max 21).",
                port + 1
            ),
            DiagError::State(msg) => format!(
                "What happened: The port cannot do that right now ({msg}).\nLikely causes: A retest was requested before the session reached a verdict.\nHow to fix: Wait for Pass, Warning or Fail, then retest."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid TOML for this tool.\nLikely causes: A typo, a wrong value type, or a misplaced section.\nHow to fix: Fix the reported location and rerun. Parser said: {}",
            te.message()
        );
    }

    // String-based heuristics for errors coming from config loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("reference csv must have headers") {
        return "Invalid headers in reference CSV. Expected 'drive_mv,settle_speed,settle_current'."
            .to_string();
    }

    if lower.contains("invalid csv row") || lower.starts_with("test point") {
        return format!(
            "What happened: The reference table is invalid ({msg}).\nLikely causes: A non-numeric cell, a zero drive, or a speed whose sign does not match its drive.\nHow to fix: Correct the row and rerun `motorcheck references`."
        );
    }

    if lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: A value outside its allowed range.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Every error exits with 1; port verdicts use `EXIT_PORT_FAILED` on the success path.
pub fn exit_code_for_error(_err: &eyre::Report) -> i32 {
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = if err.downcast_ref::<BuildError>().is_some() {
        "BuildError"
    } else if let Some(de) = err.downcast_ref::<DiagError>() {
        match de {
            DiagError::InvalidPort { .. } => "InvalidPort",
            DiagError::State(_) => "State",
            DiagError::Config(_) => "Config",
            DiagError::Hardware(_) | DiagError::HardwareFault(_) => "Hardware",
        }
    } else {
        "Error"
    };
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_port_is_shown_one_based() {
        let err = eyre::Report::new(DiagError::InvalidPort { port: 21, ports: 21 });
        let text = humanize(&err);
        assert!(text.contains("Port 22 does not exist"), "{text}");
        let json: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(json["reason"], "InvalidPort");
    }

    #[test]
    fn csv_header_error_is_recognised() {
        let err = eyre::eyre!(
            "reference CSV must have headers 'drive_mv,settle_speed,settle_current', got: a,b"
        );
        assert!(humanize(&err).starts_with("Invalid headers in reference CSV"));
        assert_eq!(exit_code_for_error(&err), 1);
    }
}
