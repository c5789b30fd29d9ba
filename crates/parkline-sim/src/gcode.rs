//! Minimal G-code word reader.
//!
//! Reads one line into a command word (`G1`, `M810`, ...) plus either
//! lettered parameters or, for string commands, the raw argument text.
//! Comments after `;` are dropped.

use crate::error::{Result, SimError};

/// Commands whose argument is free text rather than lettered words.
fn takes_string_arg(letter: char, code: u16) -> bool {
    letter == 'M' && matches!(code, 117 | 118 | 810..=819)
}

/// One parsed G-code line.
#[derive(Debug, Clone, PartialEq)]
pub struct GcodeLine<'a> {
    /// Command letter, upper case.
    pub letter: char,
    /// Command number (`1` for `G1`).
    pub code: u16,
    /// Lettered parameters, in line order. A bare letter has no value.
    pub params: Vec<(char, Option<f64>)>,
    /// Raw argument text after the command word.
    pub string_arg: &'a str,
}

impl GcodeLine<'_> {
    /// Value of a parameter, if present with a number.
    pub fn value(&self, letter: char) -> Option<f64> {
        self.params
            .iter()
            .find(|(l, _)| *l == letter)
            .and_then(|(_, v)| *v)
    }

    /// Is the parameter present at all?
    pub fn has(&self, letter: char) -> bool {
        self.params.iter().any(|(l, _)| *l == letter)
    }

    /// Does the line carry any lettered parameter?
    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }
}

/// Parse a line. Blank and comment-only lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<GcodeLine<'_>>> {
    let line = strip_comment(line).trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.find(char::is_whitespace) {
        Some(split) => (&line[..split], line[split..].trim_start()),
        None => (line, ""),
    };

    let mut chars = word.chars();
    let letter = chars
        .next()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
        .ok_or_else(|| SimError::Gcode(format!("no command word in '{line}'")))?;
    let number = chars.as_str();
    let code = number
        .split('.')
        .next()
        .and_then(|n| n.parse::<u16>().ok())
        .ok_or_else(|| SimError::Gcode(format!("bad command number in '{word}'")))?;

    let params = if takes_string_arg(letter, code) {
        Vec::new()
    } else {
        parse_params(rest)?
    };

    Ok(Some(GcodeLine {
        letter,
        code,
        params,
        string_arg: rest,
    }))
}

/// Text before any `;` comment.
pub fn strip_comment(line: &str) -> &str {
    line.split(';').next().unwrap_or("")
}

fn parse_params(rest: &str) -> Result<Vec<(char, Option<f64>)>> {
    rest.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            let letter = chars
                .next()
                .filter(char::is_ascii_alphabetic)
                .map(|c| c.to_ascii_uppercase())
                .ok_or_else(|| SimError::Gcode(format!("bad parameter '{word}'")))?;
            let value = chars.as_str();
            if value.is_empty() {
                return Ok((letter, None));
            }
            value
                .parse::<f64>()
                .map(|v| (letter, Some(v)))
                .map_err(|_| SimError::Gcode(format!("bad value in '{word}'")))
        })
        .collect()
}
