//! `runinfo plot`: request a plot and save the resulting PDF.

use runinfo_core::form::{AxisRange, ChannelSelection, ChronoboxForm, JobForm, TrgScalersForm, VerticesForm};
use runinfo_core::odb::{parse_dump, RunInfo};
use runinfo_core::protocol::ClientRequest;

use crate::flags;
use crate::job::run_job_command;
use crate::{CommandOutput, GlobalOptions, RunInfoBackend};

fn help_text() -> String {
    "\
Download a plot for a run.

Usage:
  runinfo plot chronobox <run> --board NAME --channel N [--t-bins N] [--t-min S] [--t-max S]
  runinfo plot chronobox <run> --odb FILE --name DESCRIPTION [--t-bins N] [--t-min S] [--t-max S]
  runinfo plot trg-scalers <run> [--t-bins N] [--t-min S] [--t-max S]
                           [--drift-veto] [--pulser] [--scaledown] [--no-input] [--no-output]
  runinfo plot vertices <run> [--{phi,r,t,z}-bins N] [--{phi,r,t,z}-min X] [--{phi,r,t,z}-max X]

With --odb, the channel is looked up by its description in a final ODB
dump (see `runinfo channels`). Empty bins and bounds are left for the
server to choose.\n"
        .to_string()
}

/// Run the plot command from test arguments.
pub fn run_plot_for_test(
    args: &[&str],
    globals: &GlobalOptions,
    backend: &dyn RunInfoBackend,
) -> CommandOutput {
    CommandOutput::from_result(execute_plot(args, globals, backend))
}

fn execute_plot(
    args: &[&str],
    globals: &GlobalOptions,
    backend: &dyn RunInfoBackend,
) -> Result<CommandOutput, (i32, String)> {
    let Some((kind, rest)) = args.split_first() else {
        return Err((2, "plot needs a kind: chronobox, trg-scalers, vertices".to_string()));
    };
    if flags::is_help(kind) || rest.iter().any(|a| matches!(*a, "-h" | "--help")) {
        return Ok(CommandOutput::ok(help_text()));
    }
    let Some((run, rest)) = rest.split_first() else {
        return Err((2, format!("plot {kind} needs a run number")));
    };
    let run = flags::run_number(run)?;

    let request = match *kind {
        "chronobox" => build(&parse_chronobox(rest, backend)?, run)?,
        "trg-scalers" | "trg_scalers" => build(&parse_trg_scalers(rest)?, run)?,
        "vertices" => build(&parse_vertices(rest)?, run)?,
        other => return Err((2, format!("unknown plot kind {other:?}"))),
    };
    run_job_command(request, globals, backend)
}

/// Invalid forms are usage errors; the message lists every problem.
fn build(form: &dyn JobForm, run: u32) -> Result<ClientRequest, (i32, String)> {
    form.to_request(run).map_err(|errors| (2, errors.to_string()))
}

/// Apply a `--bins`/`--min`/`--max` style flag to `range`.
fn set_range(range: &mut AxisRange, field: &str, name: &str, raw: &str) -> Result<(), (i32, String)> {
    match field {
        "bins" => range.bins = Some(flags::parse(name, raw)?),
        "min" => range.min = Some(flags::parse(name, raw)?),
        "max" => range.max = Some(flags::parse(name, raw)?),
        _ => return Err((2, format!("unknown flag: {name}"))),
    }
    Ok(())
}

fn parse_chronobox(
    args: &[&str],
    backend: &dyn RunInfoBackend,
) -> Result<ChronoboxForm, (i32, String)> {
    let mut form = ChronoboxForm::default();
    let mut board: Option<String> = None;
    let mut number: Option<u8> = None;
    let mut odb: Option<String> = None;
    let mut description: Option<String> = None;
    let mut idx = 0usize;
    while idx < args.len() {
        let (name, inline) = flags::split(args[idx]);
        match name {
            "--board" => board = Some(flags::value(args, &mut idx, name, inline)?),
            "--odb" => odb = Some(flags::value(args, &mut idx, name, inline)?),
            "--name" => description = Some(flags::value(args, &mut idx, name, inline)?),
            "--channel" => {
                let raw = flags::value(args, &mut idx, name, inline)?;
                number = Some(flags::parse(name, &raw)?);
            }
            "--t-bins" | "--t-min" | "--t-max" => {
                let raw = flags::value(args, &mut idx, name, inline)?;
                set_range(&mut form.time, &name[4..], name, &raw)?;
            }
            other => return Err((2, format!("unknown flag: {other}"))),
        }
        idx += 1;
    }
    form.channel = match (board, number, odb, description) {
        (Some(board), Some(number), None, None) => Some(ChannelSelection { board, number }),
        (None, None, Some(odb), Some(description)) => {
            Some(channel_by_description(&odb, &description, backend)?)
        }
        (None, None, None, None) => None,
        (_, _, None, None) => {
            return Err((2, "--board and --channel must be given together".to_string()))
        }
        (None, None, _, _) => {
            return Err((2, "--odb and --name must be given together".to_string()))
        }
        _ => return Err((2, "use either --board/--channel or --odb/--name".to_string())),
    };
    Ok(form)
}

/// Resolve a channel description against the channel list of an ODB dump.
fn channel_by_description(
    path: &str,
    description: &str,
    backend: &dyn RunInfoBackend,
) -> Result<ChannelSelection, (i32, String)> {
    let raw = backend.read_file(path).map_err(|e| (1, e))?;
    let odb = parse_dump(&raw).map_err(|e| (1, format!("{path}: {e}")))?;
    let info = RunInfo::try_from_odb(&odb).map_err(|e| (1, format!("{path}: {e}")))?;
    info.find_channel(description)
        .map(|channel| channel.selection())
        .ok_or_else(|| (1, format!("{path}: no selectable chronobox channel named {description:?}")))
}

fn parse_trg_scalers(args: &[&str]) -> Result<TrgScalersForm, (i32, String)> {
    let mut form = TrgScalersForm::default();
    let mut idx = 0usize;
    while idx < args.len() {
        let (name, inline) = flags::split(args[idx]);
        match name {
            "--drift-veto" | "--pulser" | "--scaledown" | "--no-input" | "--no-output" => {
                flags::switch(name, inline)?;
                match name {
                    "--drift-veto" => form.drift_veto = true,
                    "--pulser" => form.pulser = true,
                    "--scaledown" => form.scaledown = true,
                    "--no-input" => form.input = false,
                    _ => form.output = false,
                }
            }
            "--t-bins" | "--t-min" | "--t-max" => {
                let raw = flags::value(args, &mut idx, name, inline)?;
                set_range(&mut form.time, &name[4..], name, &raw)?;
            }
            other => return Err((2, format!("unknown flag: {other}"))),
        }
        idx += 1;
    }
    Ok(form)
}

fn parse_vertices(args: &[&str]) -> Result<VerticesForm, (i32, String)> {
    let mut form = VerticesForm::default();
    let mut idx = 0usize;
    while idx < args.len() {
        let (name, inline) = flags::split(args[idx]);
        let Some((axis, field)) = name.strip_prefix("--").and_then(|f| f.split_once('-')) else {
            return Err((2, format!("unknown flag: {name}")));
        };
        let range = match axis {
            "phi" => &mut form.phi,
            "r" => &mut form.r,
            "t" => &mut form.t,
            "z" => &mut form.z,
            _ => return Err((2, format!("unknown flag: {name}"))),
        };
        let raw = flags::value(args, &mut idx, name, inline)?;
        set_range(range, field, name, &raw)?;
        idx += 1;
    }
    Ok(form)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests_common::MockBackend;
    use runinfo_core::form::FIX_FORM_ERRORS;

    fn run(args: &[&str]) -> (CommandOutput, MockBackend) {
        let backend = MockBackend::new();
        let out = run_plot_for_test(args, &GlobalOptions::default(), &backend);
        (out, backend)
    }

    #[test]
    fn chronobox_plot_builds_request() {
        let (out, backend) = run(&[
            "chronobox", "11084", "--board", "cb02", "--channel=14", "--t-bins", "200", "--t-max", "12.5",
        ]);
        assert_eq!(out.exit_code, 0, "{}", out.stderr);
        let ClientRequest::ChronoboxPlot { run_number, args } = &backend.jobs()[0].request else {
            panic!("expected chronobox plot");
        };
        assert_eq!(*run_number, 11084);
        assert_eq!(args.board_name, "cb02");
        assert_eq!(args.channel_number, 14);
        assert_eq!(args.t_bins, Some(200));
        assert_eq!(args.t_min, None);
        assert_eq!(args.t_max, Some(12.5));
    }

    #[test]
    fn chronobox_without_channel_is_rejected() {
        let (out, backend) = run(&["chronobox", "1"]);
        assert_eq!(out.exit_code, 2);
        assert!(out.stderr.starts_with(&format!("Error: {FIX_FORM_ERRORS}")));
        assert!(out.stderr.contains("select a chronobox channel"));
        assert!(backend.jobs().is_empty());
    }

    #[test]
    fn trg_scalers_checkboxes_map_to_flags() {
        let (out, backend) = run(&["trg-scalers", "7", "--pulser", "--no-output"]);
        assert_eq!(out.exit_code, 0, "{}", out.stderr);
        let ClientRequest::TrgScalersPlot { args, .. } = &backend.jobs()[0].request else {
            panic!("expected trg scalers plot");
        };
        assert!(args.include_pulser);
        assert!(!args.include_drift_veto);
        assert!(!args.remove_input);
        assert!(args.remove_output);
    }

    const ODB: &str = r#"{
      "Runinfo": {
        "Run number": 11084,
        "Start time binary": "0x65a0b400",
        "Stop time binary": "0x65a0c210"
      },
      "Experiment": { "Edit on start": { "Comment": "" } },
      "Equipment": {
        "cb01": { "Settings": { "names": ["TPC_trig", "spare", "Spare"] } },
        "cb02": { "Settings": { "names": ["BV_or"] } },
        "cb03": { "Settings": { "names": [] } },
        "cb04": { "Settings": { "names": [] } }
      }
    }"#;

    fn backend_with_odb() -> MockBackend {
        let mut backend = MockBackend::new();
        backend.files.insert("final.json".into(), ODB.as_bytes().to_vec());
        backend
    }

    #[test]
    fn chronobox_channel_resolves_by_description() {
        let backend = backend_with_odb();
        let out = run_plot_for_test(
            &["chronobox", "11084", "--odb", "final.json", "--name", "bv_OR"],
            &GlobalOptions::default(),
            &backend,
        );
        assert_eq!(out.exit_code, 0, "{}", out.stderr);
        let ClientRequest::ChronoboxPlot { args, .. } = &backend.jobs()[0].request else {
            panic!("expected chronobox plot");
        };
        assert_eq!(args.board_name, "cb02");
        assert_eq!(args.channel_number, 0);
    }

    #[test]
    fn hidden_or_unknown_descriptions_do_not_resolve() {
        let backend = backend_with_odb();
        for name in ["spare", "nope"] {
            let out = run_plot_for_test(
                &["chronobox", "1", "--odb=final.json", "--name", name],
                &GlobalOptions::default(),
                &backend,
            );
            assert_eq!(out.exit_code, 1, "name={name}");
            assert!(out.stderr.contains("no selectable chronobox channel"), "{}", out.stderr);
        }
        assert!(backend.jobs().is_empty());
    }

    #[test]
    fn boolean_flags_take_no_value() {
        let (out, backend) = run(&["trg-scalers", "7", "--pulser=false"]);
        assert_eq!(out.exit_code, 2);
        assert!(out.stderr.contains("--pulser takes no value"), "{}", out.stderr);
        assert!(backend.jobs().is_empty());
    }

    #[test]
    fn trg_scalers_needs_a_counter() {
        let (out, _) = run(&["trg-scalers", "7", "--no-input", "--no-output"]);
        assert_eq!(out.exit_code, 2);
        assert!(out.stderr.contains("at least one trigger counter"));
    }

    #[test]
    fn vertices_axes_are_validated() {
        let (out, _) = run(&["vertices", "7", "--z-min", "10", "--z-max", "-10"]);
        assert_eq!(out.exit_code, 2);
        assert!(out.stderr.contains("z max"));

        let (out, backend) = run(&["vertices", "7", "--phi-bins", "64", "--r-max=190"]);
        assert_eq!(out.exit_code, 0, "{}", out.stderr);
        let ClientRequest::VerticesPlot { args, .. } = &backend.jobs()[0].request else {
            panic!("expected vertices plot");
        };
        assert_eq!(args.phi_bins, Some(64));
        assert_eq!(args.r_max, Some(190.0));
        assert_eq!(args.z_min, None);
    }

    #[test]
    fn usage_errors_exit_2() {
        for args in [
            &[][..],
            &["chronobox"][..],
            &["histogram", "1"][..],
            &["vertices", "x"][..],
            &["vertices", "1", "--w-bins", "3"][..],
            &["chronobox", "1", "--board", "cb01"][..],
            &["chronobox", "1", "--odb", "final.json"][..],
            &["chronobox", "1", "--board", "cb01", "--channel", "2", "--name", "x"][..],
        ] {
            let (out, backend) = run(args);
            assert_eq!(out.exit_code, 2, "args={args:?}");
            assert!(backend.jobs().is_empty());
        }
    }

    #[test]
    fn help_is_shown() {
        let (out, _) = run(&["--help"]);
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.contains("runinfo plot vertices"));
    }
}
