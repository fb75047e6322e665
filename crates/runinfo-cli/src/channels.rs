//! `runinfo channels`: run summary and chronobox channel list from a final
//! ODB dump.

use std::io::Write;

use runinfo_core::odb::{parse_dump, RunInfo};

use crate::{CommandOutput, RunInfoBackend};

fn help_text() -> String {
    "\
Show a run summary and the chronobox channels that can be plotted.

Usage:
  runinfo channels <final-odb.json> [--all] [--json]

Flags:
      --all    include channels hidden because their description is shared
      --json   print as JSON\n"
        .to_string()
}

/// Run the channels command from test arguments.
pub fn run_channels_for_test(args: &[&str], backend: &dyn RunInfoBackend) -> CommandOutput {
    CommandOutput::from_result(execute_channels(args, backend))
}

#[derive(Debug, Default)]
struct ParsedChannelsArgs {
    path: String,
    all: bool,
    json: bool,
}

fn parse_channels_args(args: &[&str]) -> Result<Option<ParsedChannelsArgs>, (i32, String)> {
    let mut parsed = ParsedChannelsArgs::default();
    let mut positional = 0u32;
    for arg in args {
        match *arg {
            "-h" | "--help" | "help" => return Ok(None),
            "--all" => parsed.all = true,
            "--json" => parsed.json = true,
            flag if flag.starts_with("--") => return Err((2, format!("unknown flag: {flag}"))),
            path => {
                positional += 1;
                parsed.path = path.to_string();
            }
        }
    }
    if positional != 1 {
        return Err((2, "usage: runinfo channels <final-odb.json>".to_string()));
    }
    Ok(Some(parsed))
}

fn execute_channels(
    args: &[&str],
    backend: &dyn RunInfoBackend,
) -> Result<CommandOutput, (i32, String)> {
    let Some(parsed) = parse_channels_args(args)? else {
        return Ok(CommandOutput::ok(help_text()));
    };
    let raw = backend.read_file(&parsed.path).map_err(|e| (1, e))?;
    let odb = parse_dump(&raw).map_err(|e| (1, format!("{}: {e}", parsed.path)))?;
    let info = RunInfo::try_from_odb(&odb).map_err(|e| (1, format!("{}: {e}", parsed.path)))?;

    let stdout = if parsed.json {
        render_json(&info, parsed.all)?
    } else {
        render_text(&info, parsed.all)?
    };
    Ok(CommandOutput::ok(stdout))
}

fn listed(info: &RunInfo, all: bool) -> Vec<(&runinfo_core::odb::ChronoboxChannel, bool)> {
    info.channels
        .iter()
        .enumerate()
        .map(|(i, c)| (c, info.label_at(i).is_some()))
        .filter(|(_, selectable)| all || *selectable)
        .collect()
}

fn render_text(info: &RunInfo, all: bool) -> Result<String, (i32, String)> {
    let mut out = String::new();
    out.push_str(&format!("Run:      {}\n", info.run_number));
    out.push_str(&format!("Start:    {}\n", info.start_time.to_rfc2822()));
    out.push_str(&format!("Stop:     {}\n", info.stop_time.to_rfc2822()));
    out.push_str(&format!("Comment:  {}\n", info.operator_comment));

    let channels = listed(info, all);
    if channels.is_empty() {
        out.push_str("\nNo selectable chronobox channels\n");
        return Ok(out);
    }
    out.push('\n');

    let mut tw = tabwriter::TabWriter::new(Vec::new()).padding(2);
    let _ = writeln!(tw, "DESCRIPTION\tBOARD\tCHANNEL");
    for (channel, selectable) in channels {
        let marker = if selectable { "" } else { " (hidden)" };
        let _ = writeln!(
            tw,
            "{}{marker}\t{}\t{}",
            channel.description, channel.board, channel.number
        );
    }
    let _ = tw.flush();
    match tw.into_inner() {
        Ok(bytes) => out.push_str(&String::from_utf8_lossy(&bytes)),
        Err(_) => return Err((1, "failed to render table".to_string())),
    }
    Ok(out)
}

fn render_json(info: &RunInfo, all: bool) -> Result<String, (i32, String)> {
    let channels: Vec<serde_json::Value> = listed(info, all)
        .into_iter()
        .map(|(c, selectable)| {
            serde_json::json!({
                "board": c.board,
                "channel": c.number,
                "description": c.description,
                "selectable": selectable,
            })
        })
        .collect();
    let payload = serde_json::json!({
        "run_number": info.run_number,
        "start_time": info.start_time.to_rfc3339(),
        "stop_time": info.stop_time.to_rfc3339(),
        "operator_comment": info.operator_comment,
        "channels": channels,
    });
    let mut s = serde_json::to_string_pretty(&payload).map_err(|e| (1, format!("encode: {e}")))?;
    s.push('\n');
    Ok(s)
}
