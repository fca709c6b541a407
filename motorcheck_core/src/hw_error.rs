//! Maps `Box<dyn Error>` from trait boundaries to typed `DiagError`.
//!
//! The actuator trait in `motorcheck_traits` returns `Box<dyn Error + Send + Sync>`;
//! this module converts those to our typed error enum, with an optional
//! feature-gated path for `motorcheck_hardware::HwError` downcasting.

use crate::error::DiagError;

/// Map a trait-boundary error to a typed `DiagError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to the error's display text.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> DiagError {
    #[cfg(feature = "hardware-errors")]
    {
        use motorcheck_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::InvalidPort { port, ports } => DiagError::InvalidPort {
                    port: *port,
                    ports: *ports,
                },
                other => DiagError::HardwareFault(other.to_string()),
            };
        }
    }

    DiagError::Hardware(e.to_string())
}
