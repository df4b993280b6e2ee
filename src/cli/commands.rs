//! Command implementations for the CLI
//!
//! SBIO pattern: commands return Results, printing and exit codes are handled
//! by the caller

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::display::format_json;
use super::Commands;
use crate::config::{config_options, expand_path, metadata, ConfigError, ModuleConfig};
use crate::host::{FileHostDatabase, HostDatabase, HostError, MemoryHostDatabase};
use crate::lifecycle::{dispatch, ConnectionReport, Provisioner, SUCCESS};
use crate::params::{ParamsError, ServiceParams};

/// Errors that can occur before an operation gets to run
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to read params from {path}: {source}")]
    ReadParams {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for commands
pub type CommandResult<T> = Result<T, CommandError>;

/// What to print and whether the host should treat it as a failure
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub text: String,
    pub success: bool,
}

impl CommandOutput {
    fn ok(text: String) -> Self {
        Self {
            text,
            success: true,
        }
    }

    fn failed(text: String) -> Self {
        Self {
            text,
            success: false,
        }
    }
}

// ============================================================================
// Input helpers
// ============================================================================

/// Read the parameter bag from a file, or stdin for `-`
pub fn read_params(path: &Path) -> CommandResult<ServiceParams> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|source| CommandError::ReadParams {
                path: "stdin".to_string(),
                source,
            })?;
        buf
    } else {
        let path = expand_path(&path.to_string_lossy())?;
        std::fs::read_to_string(&path).map_err(|source| CommandError::ReadParams {
            path: path.display().to_string(),
            source,
        })?
    };
    Ok(ServiceParams::from_json(&content)?)
}

/// File-backed host database when a path is given, otherwise a throwaway
/// in-memory one
pub fn open_host_database(path: Option<&Path>) -> CommandResult<Arc<dyn HostDatabase>> {
    match path {
        Some(path) => {
            let path = expand_path(&path.to_string_lossy())?;
            debug!("Using host database {}", path.display());
            Ok(Arc::new(FileHostDatabase::open(path)?))
        }
        None => Ok(Arc::new(MemoryHostDatabase::new())),
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Run one command against the panel named in its params
pub async fn execute(command: &Commands, config: &ModuleConfig) -> CommandResult<CommandOutput> {
    let Some(args) = command.hook_args() else {
        let text = match command {
            Commands::ConfigOptions => format_json(&config_options())?,
            _ => format_json(&metadata())?,
        };
        return Ok(CommandOutput::ok(text));
    };

    let params = read_params(&args.params)?;
    let host = open_host_database(args.host_db.as_deref())?;

    if let Some(operation) = command.operation() {
        let message = dispatch(operation, &params, config, host).await;
        let success = message == SUCCESS;
        return Ok(CommandOutput { text: message, success });
    }

    let provisioner = match Provisioner::from_params(&params, config, host) {
        Ok(provisioner) => provisioner,
        Err(e) => {
            if let Commands::TestConnection(_) = command {
                let report = ConnectionReport::failed(e.to_string());
                return Ok(CommandOutput::failed(format_json(&report)?));
            }
            return Ok(CommandOutput::failed(e.to_string()));
        }
    };

    match command {
        Commands::TestConnection(_) => {
            let report = provisioner.test_connection().await;
            Ok(CommandOutput {
                text: format_json(&report)?,
                success: report.success,
            })
        }
        // Views of another module's service print nothing
        Commands::ClientArea(_) => match provisioner.client_area(&params).await {
            Some(view) => Ok(CommandOutput::ok(format_json(&view)?)),
            None => Ok(CommandOutput::ok(String::new())),
        },
        _ => Ok(CommandOutput::ok(
            provisioner.login_link(&params).await.unwrap_or_default(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::HookArgs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_params(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("params.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_params_from_file() {
        let dir = TempDir::new().unwrap();
        let path = write_params(&dir, r#"{"serviceid": "12", "serverhostname": "panel.example.com"}"#);
        let params = read_params(&path).unwrap();
        assert_eq!(params.service_id, 12);
    }

    #[test]
    fn test_read_params_missing_file() {
        let err = read_params(Path::new("/nonexistent/params.json")).unwrap_err();
        assert!(matches!(err, CommandError::ReadParams { .. }));
    }

    #[test]
    fn test_read_params_rejects_bad_json() {
        let dir = TempDir::new().unwrap();
        let path = write_params(&dir, "{not json");
        assert!(matches!(read_params(&path), Err(CommandError::Params(_))));
    }

    #[tokio::test]
    async fn test_execute_metadata() {
        let output = execute(&Commands::Metadata, &ModuleConfig::default())
            .await
            .unwrap();
        assert!(output.success);
        let value: serde_json::Value = serde_json::from_str(&output.text).unwrap();
        assert_eq!(value["DisplayName"], "Pelican");
    }

    #[tokio::test]
    async fn test_execute_operation_without_hostname_fails() {
        let dir = TempDir::new().unwrap();
        let path = write_params(&dir, r#"{"serviceid": 12}"#);
        let command = Commands::Suspend(HookArgs {
            params: path,
            host_db: None,
        });

        let output = execute(&command, &ModuleConfig::default()).await.unwrap();
        assert!(!output.success);
        assert_eq!(
            output.text,
            "Could not find the panel's hostname - did you configure server group for the product?"
        );
    }

    #[tokio::test]
    async fn test_execute_login_link_of_other_module_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_params(
            &dir,
            r#"{"serviceid": 12, "moduletype": "cpanel", "serverhostname": "panel.example.com"}"#,
        );
        let command = Commands::LoginLink(HookArgs {
            params: path,
            host_db: None,
        });

        let output = execute(&command, &ModuleConfig::default()).await.unwrap();
        assert!(output.success);
        assert_eq!(output.text, "");
    }

    #[tokio::test]
    async fn test_execute_test_connection_reports_json() {
        let dir = TempDir::new().unwrap();
        let path = write_params(&dir, r#"{"serviceid": 12}"#);
        let command = Commands::TestConnection(HookArgs {
            params: path,
            host_db: None,
        });

        let output = execute(&command, &ModuleConfig::default()).await.unwrap();
        assert!(!output.success);
        let report: serde_json::Value = serde_json::from_str(&output.text).unwrap();
        assert_eq!(report["success"], false);
    }
}
