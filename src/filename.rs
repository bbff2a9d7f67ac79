//! Filename template rendering and output path construction
//!
//! A template such as `{1}/{2}.{3}` or `{title}.{ext}` is parsed once at
//! startup into directory components. Each record renders the template twice:
//! once with sanitized values to get the real path, and once with the
//! sanitization masks to get a parallel diagnostic path.

use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use crate::error::{Error, Result};
use crate::sanitize::Sanitizer;

/// Rendered in place of a field that is absent or empty
pub const UNKNOWN_VALUE: &str = "Unknown";

/// One piece of a template component
#[derive(Clone, Debug, PartialEq, Eq)]
enum TemplatePart {
    Literal(String),
    /// 1-based selected-field ordinal
    Field(usize),
    Title,
    Ext,
}

/// A parsed filename template
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilenameTemplate {
    source: String,
    components: Vec<Vec<TemplatePart>>,
}

impl FilenameTemplate {
    /// Parse `template`, checking every ordinal against `field_count` selected fields.
    ///
    /// Both `/` and `\` separate directory components. `{{` and `}}` are literal
    /// braces.
    pub fn parse(template: &str, field_count: usize) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidTemplate {
            template: template.to_string(),
            reason,
        };

        let mut components = Vec::new();
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(invalid("unmatched '}'".to_string())),
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for next in chars.by_ref() {
                        if next == '}' {
                            closed = true;
                            break;
                        }
                        name.push(next);
                    }
                    if !closed {
                        return Err(invalid(format!("unclosed placeholder '{{{name}'")));
                    }

                    let part = match name.trim() {
                        "title" => TemplatePart::Title,
                        "ext" => TemplatePart::Ext,
                        other => match other.parse::<usize>() {
                            Ok(0) => {
                                return Err(invalid("field placeholders start at {1}".to_string()));
                            }
                            Ok(n) if n > field_count => {
                                return Err(invalid(format!(
                                    "placeholder {{{n}}} exceeds the {field_count} selected fields"
                                )));
                            }
                            Ok(n) => TemplatePart::Field(n),
                            Err(_) => {
                                return Err(invalid(format!("unknown placeholder '{{{other}}}'")));
                            }
                        },
                    };

                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(part);
                }
                '/' | '\\' => {
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    components.push(std::mem::take(&mut parts));
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }
        components.push(parts);

        if components.iter().all(Vec::is_empty) {
            return Err(invalid("template is empty".to_string()));
        }

        Ok(Self {
            source: template.to_string(),
            components,
        })
    }

    /// The template text as configured
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the template references the given 1-based field ordinal
    pub fn references_field(&self, ordinal: usize) -> bool {
        self.components
            .iter()
            .flatten()
            .any(|part| *part == TemplatePart::Field(ordinal))
    }

    fn render(&self, title: &str, ext: &str, fields: &[String]) -> Vec<String> {
        self.components
            .iter()
            .map(|parts| {
                parts
                    .iter()
                    .map(|part| match part {
                        TemplatePart::Literal(text) => text.as_str(),
                        TemplatePart::Field(n) => {
                            fields.get(n - 1).map(String::as_str).unwrap_or(UNKNOWN_VALUE)
                        }
                        TemplatePart::Title => title,
                        TemplatePart::Ext => ext,
                    })
                    .collect()
            })
            .collect()
    }
}

/// Split off the final extension, ignoring leading dots (`.bashrc` has none).
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) if !name[..dot].chars().all(|c| c == '.') => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    }
}

/// Drop a redundant inner extension: `report.PDF.pdf` becomes `report.pdf`.
///
/// The outer extension is lower-cased when a collapse happens; differing
/// extensions (`report.xls.pdf`) are left alone.
pub fn collapse_double_extension(name: &str) -> String {
    let (base, ext) = split_extension(name);
    if ext.is_empty() {
        return name.to_string();
    }

    let (inner_base, inner_ext) = split_extension(base);
    if inner_ext.eq_ignore_ascii_case(ext) {
        format!("{inner_base}{}", ext.to_lowercase())
    } else {
        name.to_string()
    }
}

/// A record's destination and its diagnostic twin
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltPath {
    /// Absolute path the content is written to
    pub path: PathBuf,
    /// Output directory joined with the template rendered from masks
    pub mask_path: String,
}

impl BuiltPath {
    /// Final path component, used as the hyperlink label
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Builds sanitized output paths under a fixed directory
#[derive(Clone, Debug)]
pub struct FilenameBuilder {
    output_dir: PathBuf,
    template: FilenameTemplate,
    sanitizer: Sanitizer,
}

impl FilenameBuilder {
    /// Create a builder. `output_dir` should already be absolute.
    pub fn new(output_dir: impl Into<PathBuf>, template: FilenameTemplate, sanitizer: Sanitizer) -> Self {
        Self {
            output_dir: output_dir.into(),
            template,
            sanitizer,
        }
    }

    /// Directory every built path lives under
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The parsed template
    pub fn template(&self) -> &FilenameTemplate {
        &self.template
    }

    /// Compute the destination for one record without touching the filesystem.
    ///
    /// `fields` holds the text of every selected field in query order, with
    /// absent values already replaced by [`UNKNOWN_VALUE`].
    pub fn plan(&self, title: &str, ext: &str, fields: &[String]) -> BuiltPath {
        let title = self.sanitizer.sanitize(title);
        let ext = self.sanitizer.sanitize(ext);
        let (cleaned, masks): (Vec<String>, Vec<String>) = fields
            .iter()
            .map(|value| {
                let s = self.sanitizer.sanitize(value);
                (s.cleaned, s.mask)
            })
            .unzip();

        let real = self.template.render(&title.cleaned, &ext.cleaned, &cleaned);
        let shadow = self.template.render(&title.mask, &ext.mask, &masks);

        // components that would leave or collapse onto the output directory are dropped
        let mut kept: Vec<(String, String)> = real
            .into_iter()
            .zip(shadow)
            .filter(|(component, _)| !matches!(component.as_str(), "" | "." | ".."))
            .collect();

        match kept.last_mut() {
            Some((name, mask)) => {
                *name = collapse_double_extension(name);
                *mask = collapse_double_extension(mask);
            }
            None => kept.push((UNKNOWN_VALUE.to_string(), " ".repeat(UNKNOWN_VALUE.len()))),
        }

        let mut path = self.output_dir.clone();
        let mut mask_path = self.output_dir.to_string_lossy().into_owned();
        for (name, mask) in kept {
            path.push(name);
            mask_path.push(MAIN_SEPARATOR);
            mask_path.push_str(&mask);
        }

        BuiltPath { path, mask_path }
    }

    /// Compute the destination and make sure its parent directory exists.
    pub async fn build_path(&self, title: &str, ext: &str, fields: &[String]) -> Result<BuiltPath> {
        let built = self.plan(title, ext, fields);
        if let Some(parent) = built.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(built)
    }
}
