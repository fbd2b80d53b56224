// Manifest parsing
// One source per line: a path, a URL, or a wildcard pattern expanded to files


use anyhow::{Context, Result};
use fancy_regex::Regex;
use itertools::Itertools;
use jwalk::WalkDir;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// A usable manifest line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestEntry {
    /// A single file path or URL, read as given
    Source(String),
    /// A pattern containing `*`, expanded against the filesystem
    Pattern(String),
}

impl ManifestEntry {
    /// Concrete sources this entry stands for, in processing order
    #[inline]
    pub fn sources(&self) -> Result<Vec<String>> {
        match self {
            Self::Source(source) => Ok(vec![source.clone()]),
            Self::Pattern(pattern) => {
                let files = expand_pattern(pattern)?;
                debug!("Pattern {} matched {} files", pattern, files.len());
                Ok(files)
            }
        }
    }
}

/// Read a manifest file into its usable entries
#[inline]
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    Ok(parse_manifest(&contents))
}

#[inline]
pub fn parse_manifest(contents: &str) -> Vec<ManifestEntry> {
    contents
        .split_inclusive('\n')
        .filter_map(|line| {
            let line = normalize_line(line);
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            Some(if line.contains('*') {
                ManifestEntry::Pattern(line)
            } else {
                ManifestEntry::Source(line)
            })
        })
        .collect()
}

/// Strip line endings, trailing whitespace and `%0A` artifacts
#[inline]
pub fn normalize_line(line: &str) -> String {
    line.replace(" \n", "")
        .replace('\n', "")
        .replace("%0A", "")
        .trim_end()
        .to_string()
}

/// Expand a wildcard pattern into a sorted list of matching files
///
/// `**` matches any number of directories, `*` and `?` stay inside a single
/// path component. Hidden files and directories are never matched.
#[inline]
pub fn expand_pattern(pattern: &str) -> Result<Vec<String>> {
    let (base, rest) = split_pattern(pattern);
    let root = if base.is_empty() { "." } else { base.as_str() };

    if !Path::new(root).is_dir() {
        warn!("Pattern {} has no directory {} to search", pattern, root);
        return Ok(Vec::new());
    }

    let matcher = Regex::new(&pattern_to_regex(&rest))
        .with_context(|| format!("Invalid pattern: {}", pattern))?;

    let mut files: Vec<String> = WalkDir::new(root)
        .skip_hidden(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => {
                let path = entry.path();
                is_regular_file(entry.file_type(), &path).then_some(path)
            }
            Err(err) => {
                warn!("Failed to walk directory entry: {}", err);
                None
            }
        })
        .filter_map(|path| {
            let relative = relative_string(path.strip_prefix(root).ok()?);
            matcher
                .is_match(&relative)
                .unwrap_or(false)
                .then(|| join_base(&base, &relative))
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Regular files, including symlinks that resolve to one. Symlinked
/// directories are matched against but never descended into.
fn is_regular_file(file_type: fs::FileType, path: &Path) -> bool {
    file_type.is_file()
        || (file_type.is_symlink() && fs::metadata(path).is_ok_and(|meta| meta.is_file()))
}

/// Split a pattern into its literal leading directory and the wildcard rest
fn split_pattern(pattern: &str) -> (String, String) {
    let components: Vec<&str> = pattern.split('/').collect();
    let literal = components
        .iter()
        .take_while(|component| !component.contains(['*', '?']))
        .count();

    // The last component always belongs to the pattern, even without wildcards
    let literal = literal.min(components.len().saturating_sub(1));

    let base = components[..literal].join("/");
    let rest = components[literal..].join("/");
    if base.is_empty() && pattern.starts_with('/') {
        ("/".to_string(), rest)
    } else {
        (base, rest)
    }
}

fn pattern_to_regex(pattern: &str) -> String {
    let mut regex = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    regex.push_str("(?:[^/]*/)*");
                } else {
                    regex.push_str(".*");
                }
            }
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            c => regex.push_str(&fancy_regex::escape(&c.to_string())),
        }
    }

    regex.push('$');
    regex
}

fn relative_string(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .join("/")
}

fn join_base(base: &str, relative: &str) -> String {
    if base.is_empty() {
        relative.to_string()
    } else {
        PathBuf::from(base)
            .join(relative)
            .to_string_lossy()
            .into_owned()
    }
}
