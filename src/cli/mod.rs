//! CLI module for pelican-whmcs
//!
//! One subcommand per host entry point:
//! - `pelican-whmcs metadata` / `config-options` - static module description
//! - `pelican-whmcs test-connection` - check the panel credentials
//! - `pelican-whmcs create|suspend|unsuspend|terminate|change-password|change-package`
//! - `pelican-whmcs client-area|login-link` - read-only views
//!
//! Hook commands read the host's parameter bag as JSON from `--params`.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod display;

pub use commands::*;
pub use display::*;

use crate::lifecycle::Operation;

#[derive(Parser, Debug)]
#[command(name = "pelican-whmcs")]
#[command(about = "Provision Pelican panel servers from WHMCS lifecycle hooks")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: ~/.pelican-whmcs/config.yaml)
    #[arg(long, global = true, env = "PELICAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to a .env file loaded before the config
    #[arg(long, value_name = "FILE", global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print module metadata as JSON
    Metadata,

    /// Print the config-option schema as JSON
    ConfigOptions,

    /// Check the panel hostname and application key
    TestConnection(HookArgs),

    /// Create the service's server
    Create(HookArgs),

    /// Suspend the service's server
    Suspend(HookArgs),

    /// Unsuspend the service's server
    Unsuspend(HookArgs),

    /// Delete the service's server
    Terminate(HookArgs),

    /// Set a new password on the server owner's account
    ChangePassword(HookArgs),

    /// Push the product's current limits and startup to the server
    ChangePackage(HookArgs),

    /// Print the client area template data as JSON
    ClientArea(HookArgs),

    /// Print the admin login link markup
    LoginLink(HookArgs),
}

/// Arguments shared by every hook command
#[derive(Args, Debug, Clone)]
pub struct HookArgs {
    /// Host parameter bag as JSON (`-` reads stdin)
    #[arg(long, value_name = "FILE")]
    pub params: PathBuf,

    /// JSON file standing in for the host database
    #[arg(long, value_name = "FILE", env = "PELICAN_HOST_DB")]
    pub host_db: Option<PathBuf>,
}

impl Commands {
    pub fn hook_args(&self) -> Option<&HookArgs> {
        match self {
            Self::Metadata | Self::ConfigOptions => None,
            Self::TestConnection(args)
            | Self::Create(args)
            | Self::Suspend(args)
            | Self::Unsuspend(args)
            | Self::Terminate(args)
            | Self::ChangePassword(args)
            | Self::ChangePackage(args)
            | Self::ClientArea(args)
            | Self::LoginLink(args) => Some(args),
        }
    }

    /// The state-changing operation this command runs, if any
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Create(_) => Some(Operation::Create),
            Self::Suspend(_) => Some(Operation::Suspend),
            Self::Unsuspend(_) => Some(Operation::Unsuspend),
            Self::Terminate(_) => Some(Operation::Terminate),
            Self::ChangePassword(_) => Some(Operation::ChangePassword),
            Self::ChangePackage(_) => Some(Operation::ChangePackage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        let cli = Cli::parse_from(["pelican-whmcs", "metadata"]);
        assert!(matches!(cli.command, Commands::Metadata));
        assert!(cli.command.hook_args().is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_create() {
        let cli = Cli::parse_from([
            "pelican-whmcs",
            "create",
            "--params",
            "params.json",
            "--host-db",
            "host.json",
        ]);
        match &cli.command {
            Commands::Create(args) => {
                assert_eq!(args.params, PathBuf::from("params.json"));
                assert_eq!(args.host_db, Some(PathBuf::from("host.json")));
            }
            _ => panic!("Expected Create command"),
        }
        assert_eq!(cli.command.operation(), Some(Operation::Create));
    }

    #[test]
    fn test_parse_change_password_from_stdin() {
        let cli = Cli::parse_from(["pelican-whmcs", "change-password", "--params", "-"]);
        assert_eq!(cli.command.operation(), Some(Operation::ChangePassword));
        assert_eq!(cli.command.hook_args().unwrap().params, PathBuf::from("-"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "pelican-whmcs",
            "suspend",
            "--params",
            "p.json",
            "-vv",
            "--config",
            "/etc/pelican.yaml",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/pelican.yaml")));
    }

    #[test]
    fn test_views_are_not_operations() {
        let cli = Cli::parse_from(["pelican-whmcs", "client-area", "--params", "p.json"]);
        assert_eq!(cli.command.operation(), None);
        let cli = Cli::parse_from(["pelican-whmcs", "test-connection", "--params", "p.json"]);
        assert_eq!(cli.command.operation(), None);
    }

    #[test]
    fn test_hook_requires_params() {
        assert!(Cli::try_parse_from(["pelican-whmcs", "terminate"]).is_err());
    }
}
