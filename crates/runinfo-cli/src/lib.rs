//! runinfo-cli: command-line surface for the run info service.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use runinfo_core::config::{expand_tilde, Config};
use runinfo_core::protocol::ClientRequest;
use url::Url;

pub mod backend;
pub mod channels;
pub mod csv;
pub mod endpoints;
mod flags;
mod job;
pub mod plot;

pub use backend::SessionBackend;

/// Stable crate label used by bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "runinfo-cli"
}

static VERSION: OnceLock<String> = OnceLock::new();

/// Set the version string for `--version` output.
pub fn set_version(version: &str) {
    let _ = VERSION.set(version.to_string());
}

fn get_version() -> &'static str {
    VERSION.get().map(|s| s.as_str()).unwrap_or("dev")
}

fn help_text() -> String {
    "\
runinfo requests plots and exports for a run from the data handler.

Usage:
  runinfo [flags] [command]

Available Commands:
  channels    Show a run summary and its selectable chronobox channels
  csv         Download a CSV export for a run
  help        Help about any command
  plot        Download a plot for a run
  url         Show the endpoints derived from a run page URL

Flags:
      --config FILE        config file (default $XDG_CONFIG_HOME/runinfo/config.yaml)
      --download-dir DIR   directory downloads are saved in
  -h, --help               help for runinfo
      --url URL            data handler base URL
  -v, --version            version for runinfo

Use \"runinfo [command] --help\" for more information about a command.\n"
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    fn ok(stdout: String) -> Self {
        Self {
            stdout,
            stderr: String::new(),
            exit_code: 0,
        }
    }

    fn from_result(result: Result<CommandOutput, (i32, String)>) -> Self {
        match result {
            Ok(output) => output,
            Err((exit_code, message)) => Self {
                stdout: String::new(),
                stderr: format!("Error: {message}\n"),
                exit_code,
            },
        }
    }
}

/// Flags accepted before the command name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    pub url: Option<String>,
    pub config: Option<String>,
    pub download_dir: Option<String>,
}

/// One job to run against the data handler.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    /// Page of the run the job is for. Endpoints are derived from it.
    pub page_url: Url,
    pub download_dir: PathBuf,
    pub connect_timeout: Duration,
    pub request: ClientRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job's output was downloaded to this path.
    Saved(PathBuf),
    /// The server reported an error, or the download failed.
    Failed(String),
    /// The socket closed before the job finished.
    ConnectionLost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// The job's tab log, one entry per line.
    pub lines: Vec<String>,
    pub outcome: JobOutcome,
}

pub trait RunInfoBackend {
    /// Load configuration, from `config_file` if given.
    fn load_config(&self, config_file: Option<&str>) -> Result<Config, String>;
    fn read_file(&self, path: &str) -> Result<Vec<u8>, String>;
    /// Submit one job and wait for it to finish.
    fn run_job(&self, job: &JobSpec) -> Result<JobReport, String>;
}

/// Resolve the effective configuration: defaults, file, environment, then
/// command-line flags.
fn resolve_config(
    globals: &GlobalOptions,
    backend: &dyn RunInfoBackend,
) -> Result<Config, (i32, String)> {
    let mut config = backend
        .load_config(globals.config.as_deref())
        .map_err(|e| (1, e))?;
    if let Some(url) = &globals.url {
        config.server.url = url.trim().to_string();
    }
    if let Some(dir) = &globals.download_dir {
        config.download.dir = expand_tilde(dir.trim()).map_err(|e| (1, e.to_string()))?;
    }
    config.validate().map_err(|e| (1, e.to_string()))?;
    Ok(config)
}

fn parse_globals<'a>(args: &'a [&'a str]) -> Result<(GlobalOptions, &'a [&'a str]), (i32, String)> {
    let mut globals = GlobalOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        let (name, inline) = flags::split(args[idx]);
        let slot = match name {
            "--url" => &mut globals.url,
            "--config" => &mut globals.config,
            "--download-dir" => &mut globals.download_dir,
            _ => break,
        };
        let value = flags::value(args, &mut idx, name, inline)?;
        *slot = Some(value);
        idx += 1;
    }
    Ok((globals, &args[idx..]))
}

pub fn run_cli_for_test(args: &[&str], backend: &dyn RunInfoBackend) -> CommandOutput {
    let (globals, rest) = match parse_globals(args) {
        Ok(parsed) => parsed,
        Err(err) => return CommandOutput::from_result(Err(err)),
    };

    let Some((cmd, rest)) = rest.split_first() else {
        // No command: show help (exit 0).
        return CommandOutput::ok(help_text());
    };

    match *cmd {
        "--help" | "-h" | "help" => CommandOutput::ok(help_text()),
        "--version" | "-v" => CommandOutput::ok(format!("runinfo version {}\n", get_version())),
        "channels" => channels::run_channels_for_test(rest, backend),
        "csv" => csv::run_csv_for_test(rest, &globals, backend),
        "plot" => plot::run_plot_for_test(rest, &globals, backend),
        "url" => endpoints::run_url_for_test(rest),
        _ => CommandOutput {
            stdout: String::new(),
            stderr: format!("Error: unknown command \"{cmd}\" for \"runinfo\"\n"),
            exit_code: 1,
        },
    }
}

pub fn run_cli(args: &[String], backend: &dyn RunInfoBackend) -> CommandOutput {
    let refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    run_cli_for_test(&refs, backend)
}


#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests_common::MockBackend;

    #[test]
    fn crate_label_is_stable() {
        assert_eq!(crate_label(), "runinfo-cli");
    }

    #[test]
    fn no_args_shows_help_exit_0() {
        let out = run_cli_for_test(&[], &MockBackend::new());
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.contains("Available Commands:"));
        assert!(out.stderr.is_empty());
    }

    #[test]
    fn version_flag_shows_version() {
        for flag in ["--version", "-v"] {
            let out = run_cli_for_test(&[flag], &MockBackend::new());
            assert_eq!(out.exit_code, 0);
            assert!(out.stdout.starts_with("runinfo version "), "{:?}", out.stdout);
        }
    }

    #[test]
    fn unknown_command_exit_1() {
        let out = run_cli_for_test(&["frobnicate"], &MockBackend::new());
        assert_eq!(out.exit_code, 1);
        assert_eq!(
            out.stderr,
            "Error: unknown command \"frobnicate\" for \"runinfo\"\n"
        );
    }

    #[test]
    fn global_flags_override_config() {
        let backend = MockBackend::new();
        let out = run_cli_for_test(
            &[
                "--url=https://alpha-g.example/data/",
                "--download-dir",
                "/srv/plots",
                "csv",
                "vertices",
                "11084",
            ],
            &backend,
        );
        assert_eq!(out.exit_code, 0, "{}", out.stderr);
        let jobs = backend.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].page_url.as_str(), "https://alpha-g.example/data/11084");
        assert_eq!(jobs[0].download_dir, PathBuf::from("/srv/plots"));
    }

    #[test]
    fn global_flag_without_value_is_usage_error() {
        let out = run_cli_for_test(&["--url"], &MockBackend::new());
        assert_eq!(out.exit_code, 2);
        assert!(out.stderr.contains("--url"));
    }

    #[test]
    fn unreadable_explicit_config_fails() {
        let out = run_cli_for_test(
            &["--config", "missing.yaml", "csv", "vertices", "1"],
            &MockBackend::new(),
        );
        assert_eq!(out.exit_code, 1);
        assert!(out.stderr.starts_with("Error: read config"));
    }

    #[test]
    fn empty_url_fails_validation() {
        let out = run_cli_for_test(&["--url", " ", "csv", "vertices", "1"], &MockBackend::new());
        assert_eq!(out.exit_code, 1);
        assert!(out.stderr.contains("server.url"));
    }
}
