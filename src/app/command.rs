#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Remove(String),
    Open(String),
    Back,
    Contracts { include_spot: bool },
    Refresh,
    Help,
    Metrics,
    Quit,
    /// Empty line: just redraw.
    Redraw,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: {0} (type `help`)")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// Parse one line of user input. Symbol arguments are passed through raw;
/// normalization happens in the watchlist controller.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(Command::Redraw);
    };
    let arg = parts.next().map(str::to_string);

    match verb.to_ascii_lowercase().as_str() {
        "add" | "a" => Ok(Command::Add(arg.unwrap_or_default())),
        "rm" | "remove" | "del" => Ok(Command::Remove(arg.unwrap_or_default())),
        "open" | "o" => arg.map(Command::Open).ok_or(CommandError::Usage("open SYMBOL")),
        "back" | "b" => Ok(Command::Back),
        "contracts" | "available" => Ok(Command::Contracts {
            include_spot: matches!(arg.as_deref(), Some("spot") | Some("--spot")),
        }),
        "refresh" | "r" => Ok(Command::Refresh),
        "help" | "h" | "?" => Ok(Command::Help),
        "metrics" => Ok(Command::Metrics),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}
