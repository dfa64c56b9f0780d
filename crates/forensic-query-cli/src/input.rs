//! Query argument resolution: literal JSON, `@file`, `-` for stdin, or a named sample.

use std::io::Read;

use forensic_query::samples;

/// Failure to obtain query text.
#[derive(thiserror::Error, Debug)]
pub enum InputError {
    #[error("failed to read query from {origin}: {source}")]
    Read {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no query given: pass JSON, @file, - for stdin, or --sample <name>")]
    Missing,

    #[error("query input is empty")]
    Empty,

    #[error("unknown sample '{0}', run `fq samples` to list them")]
    UnknownSample(String),
}

/// Resolve the query text, reading stdin for `-`.
pub fn read_query_text(arg: Option<&str>, sample: Option<&str>) -> Result<String, InputError> {
    read_query_text_from(arg, sample, std::io::stdin().lock())
}

/// [`read_query_text`] with an explicit reader standing in for stdin.
pub fn read_query_text_from(
    arg: Option<&str>,
    sample: Option<&str>,
    mut stdin: impl Read,
) -> Result<String, InputError> {
    if let Some(name) = sample {
        let sample =
            samples::sample(name).ok_or_else(|| InputError::UnknownSample(name.to_string()))?;
        return Ok(sample.query.to_string());
    }

    let arg = arg.ok_or(InputError::Missing)?;
    let text = if arg == "-" {
        let mut buf = String::new();
        stdin
            .read_to_string(&mut buf)
            .map_err(|source| InputError::Read {
                origin: "stdin".to_string(),
                source,
            })?;
        buf
    } else if let Some(path) = arg.strip_prefix('@') {
        std::fs::read_to_string(path).map_err(|source| InputError::Read {
            origin: path.to_string(),
            source,
        })?
    } else {
        arg.to_string()
    };

    if text.trim().is_empty() {
        return Err(InputError::Empty);
    }
    Ok(text)
}
