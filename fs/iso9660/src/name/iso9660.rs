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

use super::NameEncoder;
use crate::options::InterchangeLevel;

pub struct Iso9660NameEncoder {
    pub level: InterchangeLevel,
    pub include_file_ver_info: bool,
}

fn is_legal_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'
}

fn filter(s: &str) -> String {
    s.chars()
        .map(|c| {
            let c = c.to_ascii_uppercase();
            if is_legal_char(c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn split_base_ext(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => (&name[..idx], &name[idx + 1..]),
    }
}

impl NameEncoder for Iso9660NameEncoder {
    fn max_name_len(&self, is_dir: bool) -> usize {
        let base = match self.level {
            InterchangeLevel::Level1 => 8 + 1 + 3,
            InterchangeLevel::Level2 | InterchangeLevel::Level3 => 30,
        };
        if is_dir || !self.include_file_ver_info {
            base
        } else {
            base + 2 // ";1"
        }
    }

    fn encode(&self, name: &str, is_dir: bool) -> String {
        if is_dir {
            let filtered = filter(name);
            return match self.level {
                InterchangeLevel::Level1 => filtered.chars().take(8).collect(),
                InterchangeLevel::Level2 | InterchangeLevel::Level3 => {
                    filtered.chars().take(31).collect()
                }
            };
        }

        let (base, ext) = split_base_ext(name);
        let base = filter(base);
        let ext = filter(ext);

        let mut out = match self.level {
            InterchangeLevel::Level1 => {
                let base: String = base.chars().take(8).collect();
                let ext: String = ext.chars().take(3).collect();
                if ext.is_empty() {
                    base
                } else {
                    format!("{base}.{ext}")
                }
            }
            InterchangeLevel::Level2 | InterchangeLevel::Level3 => {
                // 30 characters total for name + '.' + extension.
                let budget = 30usize.saturating_sub(1 + ext.len());
                let base: String = base.chars().take(budget.max(1)).collect();
                if ext.is_empty() {
                    base
                } else {
                    format!("{base}.{ext}")
                }
            }
        };

        if self.include_file_ver_info {
            out.push_str(";1");
        }
        out
    }

    fn names_equal(&self, a: &str, b: &str) -> bool {
        a.eq_ignore_ascii_case(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level1() -> Iso9660NameEncoder {
        Iso9660NameEncoder {
            level: InterchangeLevel::Level1,
            include_file_ver_info: true,
        }
    }

    #[test]
    fn truncates_to_eight_dot_three() {
        let enc = level1();
        assert_eq!(enc.encode("longfilename.txt", false), "LONGFILE.TXT;1");
    }

    #[test]
    fn replaces_illegal_characters() {
        let enc = level1();
        assert_eq!(enc.encode("re port.txt", false), "RE_PORT.TXT;1");
    }

    #[test]
    fn directories_have_no_extension_or_version() {
        let enc = level1();
        assert_eq!(enc.encode("subdir", true), "SUBDIR");
    }
}
