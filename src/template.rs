//! Placeholder substitution for embedded service templates
//!
//! Templates reference values as `${KEY}` or `$KEY`. Recognized keys are
//! replaced, unrecognized ones are rendered through an [`Unexpanded`] policy so
//! drift between a template and the code that fills it shows up in the output
//! instead of silently collapsing to an empty string.
//!
//! Lexing: a bare `$KEY` takes the longest run of ASCII letters, digits and
//! `_`, so `$12` is the single key `12`, not `$1` followed by `2`. A `$`
//! followed by anything else (`$@`, `$*`, `$#`, `$$`, `$ `) is not a
//! placeholder and is copied through untouched.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:\{([^}]*)\}|([A-Za-z0-9_]+))").expect("placeholder pattern is valid")
});

/// Placeholder names shared by every template
pub mod keys {
    pub const NAME: &str = "TASK_NAME";
    pub const USER: &str = "TASK_USER";
    pub const UID: &str = "TASK_UID";
    pub const BIN: &str = "TASK_BIN";
    pub const ARGS: &str = "TASK_ARGS";
    pub const DIR: &str = "TASK_DIR";
}

/// How an unrecognized placeholder is written to the rendered text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unexpanded {
    /// Keep it as `${KEY}`; harmless in shell scripts where `$1` etc. appear
    Braced,
    /// Replace it with `<prefix><KEY>`
    Marked(&'static str),
}

impl Unexpanded {
    fn render(self, key: &str) -> String {
        match self {
            Self::Braced => format!("${{{key}}}"),
            Self::Marked(prefix) => format!("{prefix}{key}"),
        }
    }
}

/// Render `template`, replacing each recognized key in `vars`
pub fn render(template: &str, vars: &[(&str, &str)], unexpanded: Unexpanded) -> String {
    let rendered: Cow<'_, str> = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let key = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        match vars.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => (*value).to_string(),
            None => unexpanded.render(key),
        }
    });
    rendered.into_owned()
}
