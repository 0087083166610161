/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! `{placeholder}` substitution for message bodies.
//!
//! A placeholder is a name made of ASCII letters, digits, `_`, `-` or `.`
//! enclosed in braces. Placeholders without a value, and braces that do not
//! enclose a valid name, are copied to the output unchanged. Substituted
//! values are inserted verbatim and never scanned for further placeholders.

use std::collections::HashMap;

/// Template variables, as accepted by [`render`].
pub trait Vars {
    fn lookup(&self, name: &str) -> Option<&str>;
}

impl<K: std::borrow::Borrow<str> + std::hash::Hash + Eq, V: AsRef<str>> Vars for HashMap<K, V> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(|value| value.as_ref())
    }
}

impl<K: AsRef<str>, V: AsRef<str>> Vars for [(K, V)] {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.as_ref() == name)
            .map(|(_, value)| value.as_ref())
    }
}

impl<K: AsRef<str>, V: AsRef<str>, const N: usize> Vars for [(K, V); N] {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.as_slice().lookup(name)
    }
}

impl<K: AsRef<str>, V: AsRef<str>> Vars for Vec<(K, V)> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.as_slice().lookup(name)
    }
}

enum Token<'x> {
    Text(&'x str),
    Placeholder(&'x str),
}

fn is_name_char(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, b'_' | b'-' | b'.')
}

fn tokenize(template: &str) -> impl Iterator<Item = Token<'_>> {
    let bytes = template.as_bytes();
    let mut pos = 0;

    std::iter::from_fn(move || {
        if pos >= bytes.len() {
            return None;
        }
        let start = pos;

        if bytes[pos] == b'{' {
            let name_len = bytes[pos + 1..]
                .iter()
                .take_while(|ch| is_name_char(**ch))
                .count();
            let end = pos + 1 + name_len;
            if name_len > 0 && bytes.get(end) == Some(&b'}') {
                pos = end + 1;
                return Some(Token::Placeholder(&template[start + 1..end]));
            }
            // Not a placeholder, emit the brace as text
            pos += 1;
        }

        pos += bytes[pos..]
            .iter()
            .take_while(|ch| **ch != b'{')
            .count();
        Some(Token::Text(&template[start..pos]))
    })
}

/// Replaces every `{name}` with its value from `vars`. Unknown placeholders are kept as-is.
pub fn render(template: &str, vars: &(impl Vars + ?Sized)) -> String {
    let mut result = String::with_capacity(template.len());

    for token in tokenize(template) {
        match token {
            Token::Text(text) => result.push_str(text),
            Token::Placeholder(name) => match vars.lookup(name) {
                Some(value) => result.push_str(value),
                None => {
                    result.push('{');
                    result.push_str(name);
                    result.push('}');
                }
            },
        }
    }

    result
}

/// Lists the distinct placeholder names in order of first appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for token in tokenize(template) {
        if let Token::Placeholder(name) = token {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Lists the placeholders that have no value in `vars`.
pub fn missing<'x>(template: &'x str, vars: &(impl Vars + ?Sized)) -> Vec<&'x str> {
    placeholders(template)
        .into_iter()
        .filter(|name| vars.lookup(name).is_none())
        .collect()
}
