//! `runinfo url`: show the endpoints a run page talks to.

use runinfo_core::endpoint::{download_url, parse_page_url, search_url, websocket_url};

use crate::flags;
use crate::CommandOutput;

/// Placeholder shown where the signed token goes.
const TOKEN_PLACEHOLDER: &str = "TOKEN";

fn help_text() -> String {
    "\
Show the WebSocket and download endpoints derived from a run page URL.

Usage:
  runinfo url <page-url> [--search TERM]

Flags:
      --search TERM   also show the page a search for TERM navigates to\n"
        .to_string()
}

/// Run the url command from test arguments.
pub fn run_url_for_test(args: &[&str]) -> CommandOutput {
    CommandOutput::from_result(execute_url(args))
}

fn execute_url(args: &[&str]) -> Result<CommandOutput, (i32, String)> {
    let mut page: Option<&str> = None;
    let mut search: Option<String> = None;
    let mut idx = 0usize;
    while idx < args.len() {
        let (name, inline) = flags::split(args[idx]);
        match name {
            "-h" | "--help" | "help" => return Ok(CommandOutput::ok(help_text())),
            "--search" => search = Some(flags::value(args, &mut idx, name, inline)?),
            flag if flag.starts_with("--") => return Err((2, format!("unknown flag: {flag}"))),
            positional if page.is_none() => page = Some(positional),
            extra => return Err((2, format!("unexpected argument {extra:?}"))),
        }
        idx += 1;
    }
    let Some(page) = page else {
        return Err((2, "usage: runinfo url <page-url>".to_string()));
    };

    let page = parse_page_url(page).map_err(|e| (1, e.to_string()))?;
    let ws = websocket_url(&page).map_err(|e| (1, e.to_string()))?;
    let download = download_url(&page, TOKEN_PLACEHOLDER).map_err(|e| (1, e.to_string()))?;

    let mut stdout = format!("page:       {page}\nwebsocket:  {ws}\ndownload:   {download}\n");
    if let Some(term) = search {
        match search_url(&page, &term).map_err(|e| (1, e.to_string()))? {
            Some(target) => stdout.push_str(&format!("search:     {target}\n")),
            None => stdout.push_str("search:     (empty search does not navigate)\n"),
        }
    }
    Ok(CommandOutput::ok(stdout))
}
