//! `runinfo csv`: request one of the plain exports for a run.

use runinfo_core::protocol::ClientRequest;

use crate::flags;
use crate::job::run_job_command;
use crate::{CommandOutput, GlobalOptions, RunInfoBackend};

const KINDS: &str = "chronobox, initial-odb, sequencer, trg-scalers, vertices";

fn help_text() -> String {
    format!(
        "\
Download a CSV (or JSON) export for a run.

Usage:
  runinfo csv <kind> <run>

Kinds:
  {KINDS}\n"
    )
}

/// Run the csv command from test arguments.
pub fn run_csv_for_test(
    args: &[&str],
    globals: &GlobalOptions,
    backend: &dyn RunInfoBackend,
) -> CommandOutput {
    CommandOutput::from_result(execute_csv(args, globals, backend))
}

fn execute_csv(
    args: &[&str],
    globals: &GlobalOptions,
    backend: &dyn RunInfoBackend,
) -> Result<CommandOutput, (i32, String)> {
    if args.iter().any(|a| flags::is_help(a)) {
        return Ok(CommandOutput::ok(help_text()));
    }
    let [kind, run] = args else {
        return Err((2, format!("usage: runinfo csv <kind> <run> (kinds: {KINDS})")));
    };
    let run_number = flags::run_number(run)?;
    let request = match *kind {
        "chronobox" => ClientRequest::ChronoboxCsv { run_number },
        "initial-odb" => ClientRequest::InitialOdb { run_number },
        "sequencer" => ClientRequest::SequencerEvents { run_number },
        "trg-scalers" => ClientRequest::TrgScalersCsv { run_number },
        "vertices" => ClientRequest::VerticesCsv { run_number },
        other => return Err((2, format!("unknown export {other:?} (kinds: {KINDS})"))),
    };
    run_job_command(request, globals, backend)
}
