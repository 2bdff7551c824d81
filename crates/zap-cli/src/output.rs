use atty::Stream;
use color_eyre::Result;
use serde_json::Value;

use crate::outcome::{format_status_message, to_json_response, CommandStatus, ExecutionOutcome};
use crate::style::Style;

#[derive(Clone, Copy, Debug)]
pub struct OutputOptions {
    pub quiet: bool,
    pub json: bool,
    pub no_color: bool,
}

pub fn emit_output(opts: &OutputOptions, command: &str, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.status.exit_code();
    let style = Style::new(opts.no_color, atty::is(Stream::Stdout));

    if opts.json {
        let payload = to_json_response(command, outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }

    let message = format_status_message(command, &outcome.message);
    if outcome.status == CommandStatus::Failure {
        eprintln!("{}", style.status(outcome.status, &message));
        if let Some(hint) = hint_from_details(&outcome.details) {
            eprintln!("{}", style.info(&format!("Hint: {hint}")));
        }
        return Ok(code);
    }
    if opts.quiet {
        return Ok(code);
    }
    println!("{}", style.status(outcome.status, &message));
    for line in detail_lines(command, &outcome.details) {
        println!("{}", style.dimmed(&line));
    }
    if let Some(hint) = hint_from_details(&outcome.details) {
        println!("{}", style.info(&format!("Hint: {hint}")));
    }
    Ok(code)
}

fn hint_from_details(details: &Value) -> Option<&str> {
    details
        .as_object()
        .and_then(|map| map.get("hint"))
        .and_then(Value::as_str)
}

fn detail_lines(command: &str, details: &Value) -> Vec<String> {
    match command {
        "resolve" => details
            .get("dependencies")
            .and_then(Value::as_array)
            .map(|deps| {
                deps.iter()
                    .filter_map(|dep| {
                        let coordinate = dep.get("coordinate")?.as_str()?;
                        let state = dep.get("state")?.as_str()?;
                        let path = dep.get("path").and_then(Value::as_str).unwrap_or("-");
                        Some(format!("  {coordinate} [{state}] {path}"))
                    })
                    .collect()
            })
            .unwrap_or_default(),
        "tree" => string_list(details, "dependencies")
            .into_iter()
            .map(|dep| format!("  {dep}"))
            .collect(),
        "path" => ["artifact", "descriptor", "checksum"]
            .iter()
            .filter_map(|key| {
                let url = details.get(*key)?.as_str()?;
                Some(format!("  {key:<10} {url}"))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn string_list<'a>(details: &'a Value, key: &str) -> Vec<&'a str> {
    details
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}
