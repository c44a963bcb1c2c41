/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Codec manifest files
//!
//! A codec module ships with a plain-text manifest describing its
//! capabilities, so the registry can index a codec without binding it:
//!
//! ```text
//! [codec]
//! layout = 8
//! version = 1.2.0
//! name = jpeg
//! priority = 0
//! description = Joint Photographic Experts Group
//! extensions = jpg;jpeg;jpe
//! mime-types = image/jpeg
//! magic-numbers = "ff d8 ff"
//! ```
//!
//! Parsing is line based: `key = value` pairs under a bracketed section
//! header, `;`-separated list values, and magic numbers given as quoted,
//! whitespace-separated lowercase hex prefixes (`??` matches any byte).

use std::fmt::Write as _;

use log::warn;

use marlin_core::errors::MarlinError;

/// The parsed contents of one manifest file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CodecManifest {
    pub name:          String,
    pub version:       String,
    pub layout:        u32,
    pub priority:      u32,
    pub description:   String,
    pub extensions:    Vec<String>,
    pub mime_types:    Vec<String>,
    pub magic_numbers: Vec<String>
}

impl CodecManifest {
    /// Parse a manifest from its textual form.
    ///
    /// Unknown keys are skipped with a warning; missing `name` or
    /// `layout` keys make the manifest unusable.
    pub fn parse(text: &str) -> Result<CodecManifest, MarlinError> {
        let mut manifest = CodecManifest::default();
        let mut in_codec_section = false;
        let mut saw_layout = false;

        for raw_line in text.lines() {
            let line = raw_line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') {
                in_codec_section = line == "[codec]";
                continue;
            }
            if !in_codec_section {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(MarlinError::CannotLoadCodec(format!(
                    "manifest line is not a key = value pair: '{line}'"
                )));
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "name" => manifest.name = value.to_lowercase(),
                "version" => manifest.version = value.to_string(),
                "layout" => {
                    manifest.layout = value.parse().map_err(|_| {
                        MarlinError::CannotLoadCodec(format!(
                            "manifest layout is not a number: '{value}'"
                        ))
                    })?;
                    saw_layout = true;
                }
                "priority" => {
                    manifest.priority = value.parse().map_err(|_| {
                        MarlinError::CannotLoadCodec(format!(
                            "manifest priority is not a number: '{value}'"
                        ))
                    })?;
                }
                "description" => manifest.description = value.to_string(),
                "extensions" => manifest.extensions = split_list(value),
                "mime-types" => manifest.mime_types = split_list(value),
                "magic-numbers" => manifest.magic_numbers = parse_magic_numbers(value)?,
                _ => warn!("Skipping unknown manifest key '{key}'")
            }
        }

        if manifest.name.is_empty() {
            return Err(MarlinError::CannotLoadCodec(
                "manifest has no codec name".to_string()
            ));
        }
        if !saw_layout {
            return Err(MarlinError::CannotLoadCodec(format!(
                "manifest for '{}' declares no layout",
                manifest.name
            )));
        }
        Ok(manifest)
    }

    /// Render the manifest back into its textual form.
    pub fn to_text(&self) -> String {
        let mut out = String::from("[codec]\n");

        let _ = writeln!(out, "layout = {}", self.layout);
        let _ = writeln!(out, "version = {}", self.version);
        let _ = writeln!(out, "name = {}", self.name);
        let _ = writeln!(out, "priority = {}", self.priority);
        let _ = writeln!(out, "description = {}", self.description);
        let _ = writeln!(out, "extensions = {}", self.extensions.join(";"));
        let _ = writeln!(out, "mime-types = {}", self.mime_types.join(";"));

        let magics: Vec<String> = self
            .magic_numbers
            .iter()
            .map(|m| format!("\"{m}\""))
            .collect();
        let _ = writeln!(out, "magic-numbers = {}", magics.join(" "));

        out
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Parse the `magic-numbers` value: quoted patterns, or a single bare
/// pattern when no quotes are present.
fn parse_magic_numbers(value: &str) -> Result<Vec<String>, MarlinError> {
    let mut patterns = Vec::new();

    if value.contains('"') {
        for (idx, chunk) in value.split('"').enumerate() {
            // odd chunks sit between quote pairs
            if idx % 2 == 1 && !chunk.trim().is_empty() {
                patterns.push(chunk.trim().to_lowercase());
            }
        }
    } else if !value.is_empty() {
        patterns.push(value.to_lowercase());
    }

    for pattern in &patterns {
        for token in pattern.split_whitespace() {
            let valid = token.len() == 2
                && (token == "??"
                    || token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
            if !valid {
                return Err(MarlinError::CannotLoadCodec(format!(
                    "bad magic number token '{token}'"
                )));
            }
        }
    }
    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG_MANIFEST: &str = r#"
[codec]
layout = 8
version = 1.2.0
name = jpeg
priority = 0
description = Joint Photographic Experts Group
extensions = jpg;jpeg;jpe
mime-types = image/jpeg
magic-numbers = "ff d8 ff"
"#;

    #[test]
    fn parses_the_documented_example() {
        let manifest = CodecManifest::parse(JPEG_MANIFEST).unwrap();

        assert_eq!(manifest.name, "jpeg");
        assert_eq!(manifest.layout, 8);
        assert_eq!(manifest.priority, 0);
        assert_eq!(manifest.extensions, vec!["jpg", "jpeg", "jpe"]);
        assert_eq!(manifest.mime_types, vec!["image/jpeg"]);
        assert_eq!(manifest.magic_numbers, vec!["ff d8 ff"]);
    }

    #[test]
    fn multiple_quoted_magics() {
        let text = "[codec]\nlayout = 8\nname = gif\nmagic-numbers = \"47 49 46 38 37 61\" \"47 49 46 38 39 61\"\n";
        let manifest = CodecManifest::parse(text).unwrap();

        assert_eq!(manifest.magic_numbers.len(), 2);
    }

    #[test]
    fn wildcard_bytes_are_accepted() {
        let text = "[codec]\nlayout = 8\nname = x\nmagic-numbers = \"52 49 ?? 46\"\n";
        let manifest = CodecManifest::parse(text).unwrap();

        assert_eq!(manifest.magic_numbers, vec!["52 49 ?? 46"]);
    }

    #[test]
    fn nameless_manifest_is_rejected() {
        assert!(CodecManifest::parse("[codec]\nlayout = 8\n").is_err());
    }

    #[test]
    fn bad_magic_token_is_rejected() {
        let text = "[codec]\nlayout = 8\nname = x\nmagic-numbers = \"zz\"\n";
        assert!(CodecManifest::parse(text).is_err());
    }

    #[test]
    fn round_trips_through_text() {
        let manifest = CodecManifest::parse(JPEG_MANIFEST).unwrap();
        let again = CodecManifest::parse(&manifest.to_text()).unwrap();

        assert_eq!(manifest, again);
    }
}
