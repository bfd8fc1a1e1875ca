//! File name templating.
//!
//! Renders the destination file name from a user-configured [upon] template.
//! Placeholders use single braces (`{label}`), and the usual upon filters
//! work inside them (`{label|slug}`), extended with two helpers:
//!
//! - **`slug`**: converts strings to URL-safe slugs, stripping quotation marks
//!   first to avoid artifacts like leading/trailing hyphens.
//! - **`truncate`**: truncates strings to a maximum number of characters,
//!   usable as either `{truncate(original, 20)}` or `{original|truncate: 20}`.
//!
//! # Template Variables
//!
//! | Variable    | Description                                          |
//! |-------------|------------------------------------------------------|
//! | `timestamp` | Context time, to the minute, as `YYYYMMDDHHMM`       |
//! | `label`     | Sanitized context label                              |
//! | `category`  | Category derived from the file extension             |
//! | `original`  | Sanitized original file name, extension included     |
//!
//! # Example
//!
//! ```
//! use tagdrop_intake::template::{NameFields, NameTemplate};
//! use time::macros::datetime;
//!
//! let template: NameTemplate = "{timestamp}__{label}__{category}__{original}".parse().unwrap();
//! let name = template
//!     .render(&NameFields {
//!         timestamp: datetime!(2024-05-01 09:30:59 +09:00),
//!         label: "Team Chat",
//!         category: "images",
//!         original: "photo.jpg",
//!     })
//!     .unwrap();
//! assert_eq!(name, "202405010930__Team Chat__images__photo.jpg");
//! ```

use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use std::str::FromStr;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::{datetime, format_description};
use upon::{Engine, Syntax, Template};

/// Context timestamps are rendered to the minute.
pub const MINUTE_STAMP: &[BorrowedFormatItem<'static>] = format_description!("[year][month][day][hour][minute]");

/// Values substituted into a [`NameTemplate`].
#[derive(Debug, Clone)]
pub struct NameFields<'a> {
    pub timestamp: OffsetDateTime,
    pub label: &'a str,
    pub category: &'a str,
    pub original: &'a str,
}

/// A compiled file name template.
///
/// Constructed via [`FromStr`], which compiles the template and renders it
/// once against sample values, so that syntax errors and unknown
/// placeholders surface at startup rather than on the first file.
pub struct NameTemplate {
    engine: Engine<'static>,
    template: Template<'static>,
    source: String,
}
impl FromStr for NameTemplate {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let syntax = Syntax::builder().expr("{", "}").build();
        let mut engine = Engine::with_syntax(syntax);
        addons::configure(&mut engine);
        let template = match engine.compile(s.to_string()) {
            Ok(template) => template,
            Err(e) => exn::bail!(ErrorKind::Config(format!("template {s:?}: {e}"))),
        };
        let compiled = Self {
            engine,
            template,
            source: s.to_string(),
        };
        let sample = NameFields {
            timestamp: datetime!(2000-01-01 00:00 UTC),
            label: "label",
            category: "category",
            original: "original.txt",
        };
        if let Err(e) = compiled.render_raw(&sample) {
            exn::bail!(ErrorKind::Config(format!("template {s:?}: {e}")));
        }
        Ok(compiled)
    }
}
impl std::fmt::Debug for NameTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NameTemplate").field(&self.source).finish()
    }
}
impl NameTemplate {
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Renders the template. The result is not sanitized.
    pub fn render(&self, fields: &NameFields<'_>) -> Result<String> {
        self.render_raw(fields).or_raise(|| ErrorKind::Template)
    }

    fn render_raw(&self, fields: &NameFields<'_>) -> std::result::Result<String, upon::Error> {
        let timestamp = fields.timestamp.format(MINUTE_STAMP).unwrap_or_default();
        self.template
            .render(
                &self.engine,
                upon::value! {
                    timestamp: timestamp,
                    label: fields.label,
                    category: fields.category,
                    original: fields.original,
                },
            )
            .to_string()
    }
}

/// Custom [`upon`] extensions for name-safe string manipulation.
mod addons {
    use rslug::slugify;
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    /// Converts strings to URL-safe slugs.
    ///
    /// Strips quotation marks before slugifying to avoid awkward slug output
    /// like `"hello"` becoming `-hello-`.
    fn slug_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => {
                // Various quotation marks: '"''""„"`«»
                let marks = [
                    '\u{0027}', '\u{0022}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201B}',
                    '\u{0060}', '\u{00AB}', '\u{00BB}', '\u{2039}', '\u{203A}',
                ];
                let stripped: String = s.chars().filter(|c| !marks.contains(c)).collect();
                write!(f, "{}", slugify!(&stripped))?
            },
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    /// Keeps the first `max_chars` characters.
    fn truncate_chars(s: &str, max_chars: usize) -> String {
        s.chars().take(max_chars).collect()
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("slug", slug_formatter);
        engine.add_function("truncate", truncate_chars);
    }
}
