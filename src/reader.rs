use std::io::{BufRead, ErrorKind, Lines};
use std::str::FromStr;

use crate::errors::Error;

/// Line-at-a-time reader over a solver stream. Exhaustion is always a [`Error::Format`].
pub struct LineReader<R: BufRead> {
    lines: Lines<R>,
    line_number: usize,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }

    pub fn next_line(&mut self, what: &str) -> Result<String, Error> {
        match self.lines.next() {
            Some(Ok(line)) => {
                self.line_number += 1;
                Ok(line.trim().to_string())
            }
            Some(Err(e)) if e.kind() == ErrorKind::InvalidData => Err(Error::format(format!(
                "Invalid text after line {} while reading {what}: {e}",
                self.line_number
            ))),
            Some(Err(e)) => Err(e.into()),
            None => Err(Error::format(format!(
                "Unexpected end of stream after line {} while reading {what}",
                self.line_number
            ))),
        }
    }

    pub fn parse<T: FromStr>(&mut self, what: &str) -> Result<T, Error> {
        let line = self.next_line(what)?;
        line.parse::<T>()
            .map_err(|_| Error::format(format!("Invalid {what} {line:?} at line {}", self.line_number)))
    }

    /// Parse a finite number. `inf` and `NaN` cannot be persisted as JSON numbers.
    pub fn parse_finite(&mut self, what: &str) -> Result<f64, Error> {
        let value = self.parse::<f64>(what)?;
        if !value.is_finite() {
            return Err(Error::format(format!("Non-finite {what} {value} at line {}", self.line_number)));
        }

        Ok(value)
    }

    /// Parse a line of whitespace-separated values.
    pub fn parse_all<T: FromStr>(&mut self, what: &str) -> Result<Vec<T>, Error> {
        let line = self.next_line(what)?;
        line.split_whitespace()
            .map(|token| {
                token.parse::<T>().map_err(|_| {
                    Error::format(format!(
                        "Invalid token {token:?} in {what} at line {}",
                        self.line_number
                    ))
                })
            })
            .collect()
    }
}
