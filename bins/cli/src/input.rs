//! Parsing of `--tag` and `--timer` values.

use crate::error::CliError;
use pinba_facade::TagMap;

/// A pre-measured timer from `--timer K=V[,K=V]...:SECONDS`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerArg {
    pub tags: TagMap,
    pub seconds: f64,
}

/// Parse `KEY=VALUE`. Keys must be non-empty; values may be empty.
pub fn parse_tag(raw: &str) -> Result<(String, String), CliError> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(CliError::InvalidInput(format!(
            "tag `{raw}` must look like KEY=VALUE"
        )));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::InvalidInput(format!("tag `{raw}` has an empty key")));
    }
    Ok((key.to_owned(), value.trim().to_owned()))
}

/// Parse `KEY=VALUE[,KEY=VALUE]...:SECONDS`. The last `:` separates the value.
/// An empty tag list (`:SECONDS`) is a timer with no tags.
pub fn parse_timer(raw: &str) -> Result<TimerArg, CliError> {
    let Some((tags, seconds)) = raw.rsplit_once(':') else {
        return Err(CliError::InvalidInput(format!(
            "timer `{raw}` must look like KEY=VALUE[,KEY=VALUE]:SECONDS"
        )));
    };
    let seconds = seconds.trim().parse::<f64>().map_err(|_| {
        CliError::InvalidInput(format!("timer `{raw}` has a non-numeric duration"))
    })?;

    let tags = tags
        .split(',')
        .filter(|pair| !pair.trim().is_empty())
        .map(parse_tag)
        .collect::<Result<TagMap, _>>()?;

    Ok(TimerArg { tags, seconds })
}
