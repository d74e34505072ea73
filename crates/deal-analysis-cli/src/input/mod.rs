pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Load a request from `--input` when given, otherwise from piped stdin.
pub fn load<T: DeserializeOwned>(
    path: Option<&str>,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_input(path);
    }
    match stdin::read_stdin(what)? {
        Some(request) => Ok(request),
        None => Err(format!("--input <file.json|file.yaml> or stdin required for {what}").into()),
    }
}
