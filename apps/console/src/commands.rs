//! Operator input lines parsed into session intents.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Search { code: String },
    Select { code: String },
    SetStatus { value: String },
    SetLocation { value: String },
    Submit,
    Address { value: String },
    Clear,
    View { label: String },
    Refresh,
    Closing,
    Tenants,
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  search <code>       load an order by tracking code
  select <code>       load the detailed record of a listed order
  status <value>      set the new status (RECIBIDA, FECHA_SET, EN_CAMINO, ENTREGADO)
  location <text>     set the new location
  submit              send the status update
  address <text>      change the customer address of the focused order
  clear               drop the focused order
  view <all|tenant>   switch the visible order list
  refresh             reload the order list
  closing             load the daily closing report
  tenants             show per-tenant order counts
  show                print the current state
  quit                exit";

pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "search" | "s" => ConsoleCommand::Search {
            code: required(verb, rest)?,
        },
        "select" => ConsoleCommand::Select {
            code: required(verb, rest)?,
        },
        // An empty status clears the field, so no argument is required here.
        "status" => ConsoleCommand::SetStatus {
            value: rest.to_string(),
        },
        "location" | "loc" => ConsoleCommand::SetLocation {
            value: rest.to_string(),
        },
        "submit" => ConsoleCommand::Submit,
        "address" => ConsoleCommand::Address {
            value: required(verb, rest)?,
        },
        "clear" => ConsoleCommand::Clear,
        "view" => ConsoleCommand::View {
            label: if rest.is_empty() { "ALL".into() } else { rest.to_string() },
        },
        "refresh" => ConsoleCommand::Refresh,
        "closing" => ConsoleCommand::Closing,
        "tenants" => ConsoleCommand::Tenants,
        "show" => ConsoleCommand::Show,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };
    Ok(Some(command))
}

fn required(verb: &str, rest: &str) -> Result<String, String> {
    if rest.is_empty() {
        Err(format!("'{verb}' needs an argument"))
    } else {
        Ok(rest.to_string())
    }
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
