//! Obsidian export via the `obsidian://new` URI scheme.

use std::path::PathBuf;

use chrono::Local;

use super::{ExportOptions, NoteExporter};
use crate::config::ExportConfig;
use crate::error::ExportError;

const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_FILENAME_CHARS: usize = 100;
const UNTITLED: &str = "Untitled paper";

/// Builds `obsidian://new` URIs for generated notes.
pub struct ObsidianExporter {
    config: ExportConfig,
    install_paths: Vec<PathBuf>,
}

impl ObsidianExporter {
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            install_paths: default_install_paths(),
        }
    }

    /// Override the locations checked when validating the destination.
    pub fn with_install_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.install_paths = paths;
        self
    }

    /// Whether Obsidian appears to be installed on this machine.
    pub fn is_installed(&self) -> bool {
        self.install_paths.iter().any(|path| path.exists())
    }
}

impl NoteExporter for ObsidianExporter {
    fn build_export_target(
        &self,
        title: &str,
        content: &str,
        options: &ExportOptions,
    ) -> Result<String, ExportError> {
        if options.validate && !self.is_installed() {
            return Err(ExportError::DestinationNotFound(
                "Obsidian is not installed or could not be detected".to_string(),
            ));
        }

        let vault = options
            .vault
            .as_deref()
            .unwrap_or(&self.config.default_vault);
        if vault.trim().is_empty() {
            return Err(ExportError::InvalidInput("vault name is empty".to_string()));
        }

        let mut path = match &options.file_path {
            Some(path) => path.clone(),
            None => format!(
                "{}/{}",
                self.config.default_path.trim_end_matches('/'),
                sanitize_filename(title)
            ),
        };
        if !path.ends_with(".md") {
            path.push_str(".md");
        }

        let note = render_note(title, content);

        Ok(format!(
            "obsidian://new?vault={}&file={}&content={}",
            urlencoding::encode(vault),
            encode_path(&path),
            urlencoding::encode(&note)
        ))
    }
}

/// Make `title` safe to use as a file name.
pub fn sanitize_filename(title: &str) -> String {
    let mut sanitized: String = title
        .chars()
        .map(|c| if INVALID_FILENAME_CHARS.contains(&c) { '-' } else { c })
        .collect();

    while sanitized.contains("--") {
        sanitized = sanitized.replace("--", "-");
    }

    let mut sanitized: String = sanitized
        .trim_matches(|c| c == '-' || c == ' ')
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect();
    sanitized.truncate(sanitized.trim_end().len());

    if sanitized.is_empty() {
        UNTITLED.to_string()
    } else {
        sanitized
    }
}

/// Wrap the generated summary in front matter and a header block.
pub fn render_note(title: &str, content: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!(
        r#"---
title: "{title}"
type: "paper-note"
created: "{timestamp}"
source: "podcast audio"
tags:
  - paper
  - ai-summary
  - podcast-notes
---

# {title}

> **Created**: {timestamp}
> **Source**: podcast audio → speech-to-text → AI summary
> **Tool**: Paper Notes

{content}

---
*This note was generated automatically. Review and extend it as needed.*"#
    )
}

/// Percent-encode a vault path, keeping `/` separators readable.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn default_install_paths() -> Vec<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_default();

    if cfg!(target_os = "windows") {
        vec![
            home.join("AppData/Local/Obsidian"),
            PathBuf::from("C:/Program Files/Obsidian"),
            PathBuf::from("C:/Program Files (x86)/Obsidian"),
        ]
    } else if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/Applications/Obsidian.app"),
            home.join("Applications/Obsidian.app"),
        ]
    } else {
        vec![
            PathBuf::from("/usr/bin/obsidian"),
            home.join(".local/bin/obsidian"),
            PathBuf::from("/opt/Obsidian"),
        ]
    }
}
