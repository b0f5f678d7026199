// Copyright 2024 Kevin Ludwig
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-standard filename compliance and the sibling-uniqueness algorithm
//! shared by both namespaces.

pub mod iso9660;
pub mod joliet;

use log::warn;

use crate::{
    error::{ConfigError, Result},
    interfaces::{NotifyLevel, Progress},
    tree::{FileTree, NodeId},
};

/// Produces a standard-compliant name for one file or directory name.
/// Implemented once per namespace ([`iso9660::Iso9660NameEncoder`],
/// [`joliet::JolietNameEncoder`]).
pub trait NameEncoder {
    /// Upper bound on how many output units (bytes for ISO 9660, UCS-2
    /// code units for Joliet) the compliant form of `name` will occupy.
    fn max_name_len(&self, is_dir: bool) -> usize;

    /// Produces the compliant form of `name`, applying character-set
    /// filtering, truncation and the version suffix.
    fn encode(&self, name: &str, is_dir: bool) -> String;

    /// Namespace-specific equality used for collision detection: case
    /// folded for ISO 9660, exact for Joliet.
    fn names_equal(&self, a: &str, b: &str) -> bool;
}

/// The basename (name before the last `.`, or the whole name if there is
/// no extension or the name is a directory) must be longer than this for
/// the uniquifier to have anywhere to substitute a counter.
const MIN_UNIQUIFIABLE_BASENAME_LEN: usize = 3;

fn basename(name: &str, is_dir: bool) -> &str {
    if is_dir {
        return name;
    }
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// Substitutes the last `digits` characters of `basename` with the ASCII
/// decimal form of `counter`, zero-padded to `digits` characters.
fn substitute_counter(basename: &str, counter: u32, digits: usize) -> String {
    let keep = basename.len().saturating_sub(digits);
    let mut out = basename[..keep].to_string();
    out.push_str(&format!("{counter:0digits$}"));
    out
}

fn counter_digits(counter: u32) -> usize {
    if counter < 10 {
        1
    } else if counter < 100 {
        2
    } else {
        3
    }
}

/// Assigns a compliant, sibling-unique name (ISO 9660 or Joliet, selected
/// by `encoder`/`joliet`) to every child of `dir`. Grounded on the
/// `MakeUniqueIso9660`/`MakeUniqueJoliet` uniqueness walk: reuse an
/// already-assigned name, skip uniquification for short basenames, and
/// otherwise substitute a trailing counter, restarting the sibling scan on
/// every substitution.
#[allow(clippy::too_many_arguments)]
pub fn assign_sibling_names<E: NameEncoder>(
    tree: &mut FileTree,
    dir: NodeId,
    encoder: &E,
    joliet: bool,
    strict: bool,
    progress: &dyn Progress,
) -> Result<()> {
    let children = tree.node(dir).children.clone();

    for &child in &children {
        if tree.node(child).is_skipped() {
            continue;
        }
        let node = tree.node(child);
        let original = node.file_name.clone();
        let is_dir = node.is_dir();
        let already_assigned = if joliet {
            !node.file_name_joliet.is_empty()
        } else {
            !node.file_name_iso9660.is_empty()
        };
        if already_assigned {
            continue;
        }

        let mut candidate = if !is_dir
            && encoder.names_equal(&encoder.encode(&original, is_dir), &with_version(&original))
        {
            // Optimization shortcut: the original name is already
            // compliant once compared case/width-insensitively, so keep
            // its exact original spelling instead of the ASCII-filtered
            // buffer the encoder would otherwise produce.
            with_version(&original)
        } else {
            encoder.encode(&original, is_dir)
        };

        let base = basename(&candidate, is_dir).to_string();
        if base.len() > MIN_UNIQUIFIABLE_BASENAME_LEN {
            // Every substitution attempt replaces `base` in the original,
            // unsubstituted candidate — never in the result of a previous
            // attempt, whose basename no longer contains `base` once
            // substituted and so would silently stop matching.
            let original_candidate = candidate.clone();
            let mut counter = 0u32;
            loop {
                let collides = children.iter().take_while(|&&id| id != child).any(|&sib| {
                    let sib_name = if joliet {
                        &tree.node(sib).file_name_joliet
                    } else {
                        &tree.node(sib).file_name_iso9660
                    };
                    !sib_name.is_empty() && encoder.names_equal(sib_name, &candidate)
                });
                if !collides {
                    break;
                }
                counter += 1;
                if counter >= 255 {
                    warn!(
                        "sibling name collision could not be resolved after 255 attempts: {candidate}"
                    );
                    if strict {
                        return Err(ConfigError::NameUniquificationExhausted(candidate).into());
                    }
                    progress.notify(
                        NotifyLevel::Warning,
                        &format!("accepting duplicate name \"{candidate}\""),
                    );
                    break;
                }
                let digits = counter_digits(counter);
                let new_base = substitute_counter(&base, counter, digits);
                candidate = original_candidate.replacen(&base, &new_base, 1);
            }
        }

        let node = tree.node_mut(child);
        if joliet {
            node.file_name_joliet = candidate;
        } else {
            node.file_name_iso9660 = candidate;
        }
    }

    Ok(())
}

fn with_version(name: &str) -> String {
    if name.contains(';') {
        name.to_string()
    } else {
        format!("{name};1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_excludes_extension() {
        assert_eq!(basename("readme.txt", false), "readme");
        assert_eq!(basename("noext", false), "noext");
        assert_eq!(basename(".hidden", false), ".hidden");
    }

    #[test]
    fn counter_digit_widths() {
        assert_eq!(counter_digits(1), 1);
        assert_eq!(counter_digits(9), 1);
        assert_eq!(counter_digits(10), 2);
        assert_eq!(counter_digits(99), 2);
        assert_eq!(counter_digits(100), 3);
    }

    #[test]
    fn substitute_overwrites_trailing_chars() {
        assert_eq!(substitute_counter("LONGFILE", 1, 1), "LONGFIL1");
        assert_eq!(substitute_counter("LONGFILE", 12, 2), "LONGFI12");
    }
}
