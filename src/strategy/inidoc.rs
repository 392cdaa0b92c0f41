// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Canonical INI document handling.
//!
//! The INI-based merge strategies do not attempt to preserve the textual
//! layout of their inputs. Both documents are parsed (which drops comments),
//! combined at the key level, and re-serialized into one canonical shape:
//! sections in sorted order, keys within a section in sorted order, and
//! `key = value` spacing throughout. Resyncing the same template twice then
//! produces byte-identical output no matter how the target was formatted.

use crate::strategy::{Document, MergeError, Result};

use ini::Ini;
use std::collections::BTreeMap;

/// Parse INI bytes on behalf of a strategy.
///
/// # Errors
///
/// - Return [`MergeError::NotUtf8`] if the bytes are not valid UTF-8.
/// - Return [`MergeError::IniParse`] if the text is not a parsable INI
///   document.
pub fn parse(contents: &[u8], document: Document, strategy: &'static str) -> Result<Ini> {
    let text = std::str::from_utf8(contents).map_err(|source| MergeError::NotUtf8 {
        strategy,
        document,
        source,
    })?;

    Ini::load_from_str(text).map_err(|source| MergeError::IniParse {
        strategy,
        document,
        source,
    })
}

/// Copy one key from `donor` into `doc` when the donor defines it.
///
/// Missing section or key in the donor leaves `doc` unmodified.
pub fn preserve_key(doc: &mut Ini, donor: &Ini, section: &str, key: &str) {
    if let Some(value) = donor.get_from(Some(section), key) {
        let value = value.to_owned();
        doc.set_to(Some(section), key.to_owned(), value);
    }
}

/// Serialize a document into its canonical shape.
///
/// Keys outside any section come first, then each section sorted by name
/// with its keys sorted. Sections are separated by one blank line.
pub fn to_pretty_bytes(doc: &Ini) -> Vec<u8> {
    let mut sections: BTreeMap<Option<&str>, BTreeMap<&str, &str>> = BTreeMap::new();
    for (section, properties) in doc.iter() {
        let entries = sections.entry(section).or_default();
        for (key, value) in properties.iter() {
            entries.insert(key, value);
        }
    }

    let mut out = String::new();
    for (section, entries) in &sections {
        if entries.is_empty() {
            continue;
        }

        if !out.is_empty() {
            out.push('\n');
        }

        if let Some(name) = section {
            out.push_str(&format!("[{name}]\n"));
        }

        for (key, value) in entries {
            out.push_str(&format!("{key} = {value}\n"));
        }
    }

    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn pretty(text: &str) -> String {
        let doc = parse(text.as_bytes(), Document::Template, "test").unwrap();
        String::from_utf8(to_pretty_bytes(&doc)).unwrap()
    }

    #[test]
    fn sections_and_keys_are_sorted() {
        let result = pretty(indoc! {r#"
            [TYPECHECK]
            zebra = last
            apple = first

            [BASIC]
            good-names = i,j,k
        "#});

        let expect = indoc! {r#"
            [BASIC]
            good-names = i,j,k

            [TYPECHECK]
            apple = first
            zebra = last
        "#};
        assert_eq!(result, expect);
    }

    #[test]
    fn comments_are_stripped() {
        let result = pretty(indoc! {r#"
            # top comment
            [MESSAGES CONTROL]
            ; inline section comment line
            disable = C0111
        "#});

        let expect = indoc! {r#"
            [MESSAGES CONTROL]
            disable = C0111
        "#};
        assert_eq!(result, expect);
    }

    #[test]
    fn whitespace_is_normalized() {
        let result = pretty("[A]\nkey=value\nother   =   spaced\n");

        let expect = indoc! {r#"
            [A]
            key = value
            other = spaced
        "#};
        assert_eq!(result, expect);
    }

    #[test]
    fn preserve_key_copies_only_defined_values() {
        let mut doc = parse(
            b"[TYPECHECK]\nignored-modules = foo\n",
            Document::Template,
            "test",
        )
        .unwrap();
        let donor = parse(
            b"[TYPECHECK]\nignored-modules = bar\n",
            Document::Target,
            "test",
        )
        .unwrap();

        preserve_key(&mut doc, &donor, "TYPECHECK", "ignored-modules");
        preserve_key(&mut doc, &donor, "TYPECHECK", "ignored-classes");

        assert_eq!(doc.get_from(Some("TYPECHECK"), "ignored-modules"), Some("bar"));
        assert_eq!(doc.get_from(Some("TYPECHECK"), "ignored-classes"), None);
    }

    #[test]
    fn malformed_input_is_a_merge_error() {
        let error = parse(b"[unclosed\nkey = value\n", Document::Target, "pylintrc_merge")
            .unwrap_err();

        let message = error.to_string();
        assert!(message.contains("pylintrc_merge"));
        assert!(message.contains("target"));
    }
}
