use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Read a deal request piped on stdin.
///
/// `None` when stdin is a terminal or the pipe is empty. A body starting
/// with `{` is parsed as JSON, anything else as YAML, so
/// `cat deal.yaml | deal analyze` works the same as `--input deal.yaml`.
pub fn read_stdin<T: DeserializeOwned>(what: &str) -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_request(&buffer, what)
}

fn parse_request<T: DeserializeOwned>(
    body: &str,
    what: &str,
) -> Result<Option<T>, Box<dyn std::error::Error>> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let request = if trimmed.starts_with('{') {
        serde_json::from_str(trimmed)
            .map_err(|e| format!("Failed to parse {what} from stdin as JSON: {e}"))?
    } else {
        serde_yaml::from_str(trimmed)
            .map_err(|e| format!("Failed to parse {what} from stdin as YAML: {e}"))?
    };
    Ok(Some(request))
}
