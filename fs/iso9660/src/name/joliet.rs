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

const FORBIDDEN: [char; 6] = ['*', '/', ':', ';', '?', '\\'];

pub struct JolietNameEncoder {
    pub long_names: bool,
    pub include_file_ver_info: bool,
}

impl JolietNameEncoder {
    fn max_units(&self) -> usize {
        if self.long_names {
            103
        } else {
            64
        }
    }
}

impl NameEncoder for JolietNameEncoder {
    fn max_name_len(&self, is_dir: bool) -> usize {
        if is_dir || !self.include_file_ver_info {
            self.max_units()
        } else {
            self.max_units() + 2
        }
    }

    fn encode(&self, name: &str, is_dir: bool) -> String {
        let filtered: String = name
            .chars()
            .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
            .collect();

        let budget = if is_dir || !self.include_file_ver_info {
            self.max_units()
        } else {
            self.max_units() - 2
        };
        // UCS-2 code units, not bytes; `char`s outside the BMP take two
        // units, but disc names virtually never use them, so counting
        // `char`s is an adequate approximation for truncation purposes.
        let truncated: String = filtered.chars().take(budget).collect();

        if !is_dir && self.include_file_ver_info {
            format!("{truncated};1")
        } else {
            truncated
        }
    }

    fn names_equal(&self, a: &str, b: &str) -> bool {
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> JolietNameEncoder {
        JolietNameEncoder {
            long_names: false,
            include_file_ver_info: true,
        }
    }

    #[test]
    fn preserves_unicode_and_case() {
        assert_eq!(encoder().encode("Réadme.txt", false), "Réadme.txt;1");
    }

    #[test]
    fn replaces_forbidden_characters() {
        assert_eq!(encoder().encode("a/b:c", false), "a_b_c;1");
    }

    #[test]
    fn comparison_is_case_sensitive() {
        assert!(!encoder().names_equal("Readme.txt", "readme.txt"));
    }
}
