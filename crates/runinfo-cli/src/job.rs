//! Running a job command and rendering its report.

use runinfo_client::connection::CONNECTION_LOST;
use runinfo_core::endpoint::{parse_page_url, run_page_url};
use runinfo_core::protocol::ClientRequest;

use crate::{resolve_config, CommandOutput, GlobalOptions, JobOutcome, JobSpec, RunInfoBackend};

pub(crate) fn run_job_command(
    request: ClientRequest,
    globals: &GlobalOptions,
    backend: &dyn RunInfoBackend,
) -> Result<CommandOutput, (i32, String)> {
    let config = resolve_config(globals, backend)?;
    let base = parse_page_url(&config.server.url).map_err(|e| (1, e.to_string()))?;
    let page_url = run_page_url(&base, request.run_number()).map_err(|e| (1, e.to_string()))?;

    let job = JobSpec {
        page_url,
        download_dir: config.download.dir.clone(),
        connect_timeout: config.connection.connect_timeout,
        request,
    };
    let report = backend.run_job(&job).map_err(|e| (1, e))?;

    let mut stdout = String::new();
    for line in &report.lines {
        stdout.push_str(line);
        stdout.push('\n');
    }
    let (stderr, exit_code) = match report.outcome {
        JobOutcome::Saved(path) => {
            stdout.push_str(&format!("Saved {}\n", path.display()));
            (String::new(), 0)
        }
        JobOutcome::Failed(message) => (format!("Error: {message}\n"), 1),
        JobOutcome::ConnectionLost => (format!("Error: {CONNECTION_LOST}\n"), 1),
    };
    Ok(CommandOutput {
        stdout,
        stderr,
        exit_code,
    })
}
