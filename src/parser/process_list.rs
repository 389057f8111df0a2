//! Parser for `ps --sort=-pcpu -Ao pcpu,pmem,args` output.
//!
//! Only lines whose arguments carry the workload process title (for
//! PostgreSQL backends: `postgres: <user> <database> <state>`) produce tuples.
//! The third word of the title is the label, so all backends serving the same
//! database are summed into one tuple.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{parse_measure, LineError, LineOutcome};

/// Process title prefix of PostgreSQL backend processes.
pub const DEFAULT_PROCESS_PREFIX: &str = "postgres: ";

/// Client address appended to backend titles, e.g. `10.0.0.5(43122) idle`.
/// Everything from the first dotted quad to the end of line is discarded.
static CLIENT_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]{1,3}\.){3}.*").expect("client address pattern"));

/// Index of the label word within the process title.
const LABEL_WORD: usize = 2;

#[derive(Debug)]
pub struct ProcessListParser {
    prefix: String,
    tokens: Regex,
}

enum Token<'a> {
    Number(&'a str),
    Title(&'a str),
}

impl ProcessListParser {
    /// Builds a parser matching titles that start with `prefix` (case-insensitive).
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let tokens = Regex::new(&format!(
            r"(?i)(-?[0-9]+\.[0-9]+)|({}.*)",
            regex::escape(prefix)
        ))?;
        Ok(Self {
            prefix: prefix.to_string(),
            tokens,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn classify(&self, line: &str) -> LineOutcome {
        let stripped = CLIENT_ADDRESS.replace(line.trim(), " ");
        let line = stripped.trim();
        if line.is_empty() {
            return LineOutcome::Skip("blank");
        }

        let tokens: Vec<Token> = self
            .tokens
            .captures_iter(line)
            .filter_map(|c| match (c.get(1), c.get(2)) {
                (Some(n), _) => Some(Token::Number(n.as_str())),
                (None, Some(t)) => Some(Token::Title(t.as_str())),
                (None, None) => None,
            })
            .collect();

        let (cpu, mem, title) = match tokens.as_slice() {
            [Token::Number(cpu), Token::Number(mem), Token::Title(title)] => (*cpu, *mem, *title),
            [_, _, _] => return LineOutcome::Skip("tokens out of order"),
            _ => return LineOutcome::Skip("unexpected token count"),
        };

        let label = match title.split_whitespace().nth(LABEL_WORD) {
            Some(word) => word,
            None => return LineOutcome::Skip("process title too short"),
        };

        let cpu_percent = match parse_measure(cpu) {
            Some(v) => v,
            None => return LineOutcome::Reject(LineError::InvalidCpu(cpu.to_string())),
        };
        let memory = match parse_measure(mem) {
            Some(v) => v,
            None => return LineOutcome::Reject(LineError::InvalidMemory(mem.to_string())),
        };

        LineOutcome::Tuple {
            label: label.to_string(),
            cpu_percent,
            memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LineParser;
    use crate::sample::MetricTuple;

    fn parser() -> ProcessListParser {
        ProcessListParser::new(DEFAULT_PROCESS_PREFIX).unwrap()
    }

    #[test]
    fn test_end_to_end_backend_line() {
        let parsed = LineParser::process_list(DEFAULT_PROCESS_PREFIX)
            .unwrap()
            .parse(" 1.50  2.00 postgres: odoo matelec idle");
        assert_eq!(parsed.tuples, vec![MetricTuple::new("matelec", 1.50, 2.00)]);
    }

    #[test]
    fn test_client_address_is_stripped() {
        let outcome =
            parser().classify(" 0.3  1.1 postgres: odoo demo 10.42.0.17(51234) idle in transaction");
        assert_eq!(
            outcome,
            LineOutcome::Tuple {
                label: "demo".to_string(),
                cpu_percent: 0.3,
                memory: 1.1,
            }
        );
    }

    #[test]
    fn test_repeated_database_is_summed() {
        let output = " 1.5  2.0 postgres: odoo odoo idle\n\
                      %CPU %MEM COMMAND\n\
                      3.0  1.0 postgres: odoo odoo SELECT\n";
        let parsed = LineParser::process_list(DEFAULT_PROCESS_PREFIX)
            .unwrap()
            .parse(output);
        assert_eq!(parsed.tuples, vec![MetricTuple::new("odoo", 4.5, 3.0)]);
    }

    #[test]
    fn test_two_word_title_is_discarded() {
        assert_eq!(
            parser().classify(" 0.0  0.4 postgres: startup"),
            LineOutcome::Skip("process title too short")
        );
    }

    #[test]
    fn test_unrelated_lines_are_skipped() {
        let p = parser();
        assert_eq!(
            p.classify("%CPU %MEM COMMAND"),
            LineOutcome::Skip("unexpected token count")
        );
        assert_eq!(
            p.classify(" 0.0  0.1 /bin/bash"),
            LineOutcome::Skip("unexpected token count")
        );
        assert_eq!(p.classify("   "), LineOutcome::Skip("blank"));
    }

    #[test]
    fn test_non_numeric_columns_never_yield_tuples() {
        let p = parser();
        assert_eq!(
            p.classify("NaN inf postgres: odoo demo idle"),
            LineOutcome::Skip("unexpected token count")
        );
        assert_eq!(
            p.classify("-1.0 2.0 postgres: odoo demo idle"),
            LineOutcome::Reject(LineError::InvalidCpu("-1.0".to_string()))
        );
    }

    #[test]
    fn test_prefix_match_is_case_insensitive() {
        let outcome = parser().classify(" 2.5  0.5 POSTGRES: odoo sales active");
        assert!(matches!(outcome, LineOutcome::Tuple { ref label, .. } if label == "sales"));
    }

    #[test]
    fn test_custom_prefix() {
        let p = ProcessListParser::new("mysqld: ").unwrap();
        assert_eq!(p.prefix(), "mysqld: ");
        assert!(matches!(
            p.classify(" 4.0  8.0 mysqld: worker shop main"),
            LineOutcome::Tuple { ref label, .. } if label == "shop"
        ));
    }
}
