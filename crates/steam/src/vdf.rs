use std::fs;
use std::path::Path;

use crate::SteamError;

/// A node of a text KeyValues (VDF) document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VdfValue {
    Str(String),
    Object(Vec<(String, VdfValue)>),
}

impl VdfValue {
    /// Returns the child with `key`, compared case-insensitively.
    pub fn get(&self, key: &str) -> Option<&VdfValue> {
        match self {
            VdfValue::Object(entries) => entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v),
            VdfValue::Str(_) => None,
        }
    }

    /// Returns the string value of the child with `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(VdfValue::as_str)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            VdfValue::Str(s) => Some(s),
            VdfValue::Object(_) => None,
        }
    }

    /// Returns child entries in document order (empty for strings).
    pub fn entries(&self) -> &[(String, VdfValue)] {
        match self {
            VdfValue::Object(entries) => entries,
            VdfValue::Str(_) => &[],
        }
    }
}

/// Reads and parses a text VDF file (`libraryfolders.vdf`, `*.acf`).
pub fn load_text_vdf(path: &Path) -> Result<(String, VdfValue), SteamError> {
    let text = fs::read_to_string(path)
        .map_err(|e| SteamError::Io(format!("failed to read {}: {e}", path.display())))?;
    parse_text_vdf(&text)
}

/// Parses a text VDF document and returns its root key and object.
pub fn parse_text_vdf(text: &str) -> Result<(String, VdfValue), SteamError> {
    let data = text.as_bytes();
    let mut pos = 0;

    let (root_key, new_pos) = match next_token(data, pos)? {
        Some((Token::Str(key), new_pos)) => (key, new_pos),
        Some((token, _)) => {
            return Err(SteamError::Vdf(format!(
                "expected root key, got {token:?}"
            )));
        }
        None => return Err(SteamError::Vdf("empty document".into())),
    };
    pos = new_pos;

    match next_token(data, pos)? {
        Some((Token::Open, new_pos)) => pos = new_pos,
        _ => {
            return Err(SteamError::Vdf(format!(
                "expected '{{' after root key '{root_key}'"
            )));
        }
    }

    let (root, _) = parse_object(data, pos)?;
    Ok((root_key, root))
}

#[derive(Debug, PartialEq)]
enum Token {
    Str(String),
    Open,
    Close,
}

/// Parses entries until the matching `}`.
fn parse_object(data: &[u8], mut pos: usize) -> Result<(VdfValue, usize), SteamError> {
    let mut entries = Vec::new();

    loop {
        let (key, new_pos) = match next_token(data, pos)? {
            Some((Token::Close, new_pos)) => return Ok((VdfValue::Object(entries), new_pos)),
            Some((Token::Str(key), new_pos)) => (key, new_pos),
            Some((Token::Open, _)) => {
                return Err(SteamError::Vdf(format!(
                    "unexpected '{{' at pos {pos}"
                )));
            }
            None => {
                return Err(SteamError::Vdf(
                    "unexpected end of data in object".into(),
                ));
            }
        };
        pos = new_pos;

        match next_token(data, pos)? {
            Some((Token::Str(value), new_pos)) => {
                entries.push((key, VdfValue::Str(value)));
                pos = new_pos;
            }
            Some((Token::Open, new_pos)) => {
                let (child, new_pos) = parse_object(data, new_pos)?;
                entries.push((key, child));
                pos = new_pos;
            }
            Some((Token::Close, _)) | None => {
                return Err(SteamError::Vdf(format!("key '{key}' has no value")));
            }
        }
    }
}

/// Returns the next token, skipping whitespace, `//` comments and
/// platform conditionals such as `[$WIN32]`.
fn next_token(data: &[u8], mut pos: usize) -> Result<Option<(Token, usize)>, SteamError> {
    loop {
        while pos < data.len() && data[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= data.len() {
            return Ok(None);
        }

        match data[pos] {
            b'/' if data.get(pos + 1) == Some(&b'/') => {
                while pos < data.len() && data[pos] != b'\n' {
                    pos += 1;
                }
            }
            b'{' => return Ok(Some((Token::Open, pos + 1))),
            b'}' => return Ok(Some((Token::Close, pos + 1))),
            b'"' => {
                let (s, new_pos) = read_quoted(data, pos + 1)?;
                return Ok(Some((Token::Str(s), new_pos)));
            }
            _ => {
                let start = pos;
                while pos < data.len()
                    && !data[pos].is_ascii_whitespace()
                    && !matches!(data[pos], b'{' | b'}' | b'"')
                {
                    pos += 1;
                }
                let word = String::from_utf8_lossy(&data[start..pos]).into_owned();
                if word.starts_with('[') && word.ends_with(']') {
                    continue;
                }
                return Ok(Some((Token::Str(word), pos)));
            }
        }
    }
}

/// Reads a quoted string body starting just after the opening quote.
fn read_quoted(data: &[u8], pos: usize) -> Result<(String, usize), SteamError> {
    let start = pos;
    let mut out = Vec::new();
    let mut i = pos;
    while i < data.len() {
        match data[i] {
            b'"' => return Ok((String::from_utf8_lossy(&out).into_owned(), i + 1)),
            b'\\' if i + 1 < data.len() => {
                match data[i + 1] {
                    b'\\' => out.push(b'\\'),
                    b'"' => out.push(b'"'),
                    b'n' => out.push(b'\n'),
                    b't' => out.push(b'\t'),
                    other => {
                        out.push(b'\\');
                        out.push(other);
                    }
                }
                i += 2;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    Err(SteamError::Vdf(format!(
        "unterminated string starting at pos {start}"
    )))
}
