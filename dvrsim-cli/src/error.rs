use std::process::ExitCode;

use dvrsim_config::ConfigError;
use dvrsim_engine::EngineError;

/// Distinct exit codes so scripts can tell a regression from a setup problem.
pub fn exit_code(err: &anyhow::Error) -> ExitCode {
    for cause in err.chain() {
        if let Some(engine) = cause.downcast_ref::<EngineError>() {
            return match engine {
                EngineError::HashMismatch { .. } => ExitCode::from(2),
                EngineError::Config(_) => ExitCode::from(3),
                _ => ExitCode::FAILURE,
            };
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return ExitCode::from(3);
        }
    }
    ExitCode::FAILURE
}
