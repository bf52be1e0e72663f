pub mod file;

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::{self, Read};

/// Read typed input from `--input`, falling back to JSON piped on stdin.
pub fn read_input<T: DeserializeOwned>(path: Option<&str>) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_structured(path);
    }
    match piped_json()? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Err("No input: pass --input <file> or pipe JSON on stdin".into()),
    }
}

/// `None` when stdin is a terminal or carries only whitespace.
fn piped_json() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    match buffer.trim() {
        "" => Ok(None),
        body => Ok(Some(serde_json::from_str(body)?)),
    }
}
