//! Parser for `docker stats --no-stream` table output.
//!
//! Expected columns: `NAME CONTAINER CPU% MEM-USED / MEM-LIMIT`, e.g.
//! `web1  abc123  12.3%  512MiB / 1GiB`. Memory is normalized to bytes.

use super::{parse_measure, LineError, LineOutcome};

/// First token of the header row printed by `docker stats`.
pub const HEADER_SENTINEL: &str = "NAME";

/// Minimum whitespace-separated fields for a data row.
const MIN_FIELDS: usize = 4;

/// Binary size suffixes printed by the docker CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    KiB,
    MiB,
    GiB,
}

/// Unit assumed when the memory column carries an unknown 3-character suffix.
pub const FALLBACK_MEMORY_UNIT: SizeUnit = SizeUnit::KiB;

impl SizeUnit {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "KiB" => Some(SizeUnit::KiB),
            "MiB" => Some(SizeUnit::MiB),
            "GiB" => Some(SizeUnit::GiB),
            _ => None,
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            SizeUnit::KiB => 1024.0,
            SizeUnit::MiB => 1024.0 * 1024.0,
            SizeUnit::GiB => 1024.0 * 1024.0 * 1024.0,
        }
    }
}

/// Parses a memory column such as `512MiB` into bytes.
pub fn parse_memory_bytes(field: &str) -> Result<f64, LineError> {
    let invalid = || LineError::InvalidMemory(field.to_string());

    let split = field.len().checked_sub(3).ok_or_else(invalid)?;
    if !field.is_char_boundary(split) {
        return Err(invalid());
    }
    let (magnitude, suffix) = field.split_at(split);

    let value = parse_measure(magnitude).ok_or_else(invalid)?;
    let unit = SizeUnit::from_suffix(suffix).unwrap_or(FALLBACK_MEMORY_UNIT);
    Ok(value * unit.multiplier())
}

/// Parses a cpu column such as `12.3%` into a percentage.
pub fn parse_cpu_percent(field: &str) -> Result<f64, LineError> {
    parse_measure(field.strip_suffix('%').unwrap_or(field))
        .ok_or_else(|| LineError::InvalidCpu(field.to_string()))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerStatsParser;

impl ContainerStatsParser {
    pub fn classify(&self, line: &str) -> LineOutcome {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.first() == Some(&HEADER_SENTINEL) {
            return LineOutcome::Skip("header");
        }
        if fields.len() < MIN_FIELDS {
            return LineOutcome::Skip("too few fields");
        }

        let cpu_percent = match parse_cpu_percent(fields[2]) {
            Ok(v) => v,
            Err(e) => return LineOutcome::Reject(e),
        };
        let memory = match parse_memory_bytes(fields[3]) {
            Ok(v) => v,
            Err(e) => return LineOutcome::Reject(e),
        };

        LineOutcome::Tuple {
            label: fields[0].to_string(),
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

    #[test]
    fn test_memory_units_normalize_to_bytes() {
        assert_eq!(parse_memory_bytes("3KiB").unwrap(), 3.0 * 1024.0);
        assert_eq!(parse_memory_bytes("512MiB").unwrap(), 512.0 * 1024.0 * 1024.0);
        assert_eq!(
            parse_memory_bytes("1.5GiB").unwrap(),
            1.5 * 1024.0 * 1024.0 * 1024.0
        );
    }

    #[test]
    fn test_unknown_suffix_falls_back_to_kib() {
        assert_eq!(FALLBACK_MEMORY_UNIT, SizeUnit::KiB);
        assert_eq!(parse_memory_bytes("2.0TiB").unwrap(), 2.0 * 1024.0);
    }

    #[test]
    fn test_memory_without_magnitude_is_rejected() {
        assert!(parse_memory_bytes("0B").is_err());
        assert!(parse_memory_bytes("MiB").is_err());
        assert!(parse_memory_bytes("").is_err());
    }

    #[test]
    fn test_cpu_percent_strips_sign() {
        assert_eq!(parse_cpu_percent("12.3%").unwrap(), 12.3);
        assert_eq!(parse_cpu_percent("250.01%").unwrap(), 250.01);
        assert!(parse_cpu_percent("--").is_err());
    }

    #[test]
    fn test_non_finite_and_negative_values_are_rejected() {
        let parser = ContainerStatsParser;
        assert_eq!(
            parser.classify("web1 abc NaN% infMiB / 1GiB"),
            LineOutcome::Reject(LineError::InvalidCpu("NaN%".to_string()))
        );
        assert_eq!(
            parser.classify("web1 abc 1.0% infMiB / 1GiB"),
            LineOutcome::Reject(LineError::InvalidMemory("infMiB".to_string()))
        );
        assert_eq!(
            parser.classify("web1 abc -3.0% 1MiB / 1GiB"),
            LineOutcome::Reject(LineError::InvalidCpu("-3.0%".to_string()))
        );
        assert!(parse_memory_bytes("-12MiB").is_err());
        assert!(parse_memory_bytes("NaNKiB").is_err());
    }

    #[test]
    fn test_end_to_end_single_line() {
        let parsed = LineParser::container_stats().parse("web1 abc123 12.3% 512MiB");
        assert_eq!(
            parsed.tuples,
            vec![MetricTuple::new("web1", 12.3, 512.0 * 1024.0 * 1024.0)]
        );
    }

    #[test]
    fn test_header_and_short_lines_never_produce_tuples() {
        let parser = ContainerStatsParser;
        assert_eq!(
            parser.classify("NAME CONTAINER CPU % MEM USAGE / LIMIT"),
            LineOutcome::Skip("header")
        );
        assert_eq!(
            parser.classify("NAME abc 1.0% 1MiB"),
            LineOutcome::Skip("header")
        );
        assert_eq!(
            parser.classify("web1 abc123 12.3%"),
            LineOutcome::Skip("too few fields")
        );
        assert_eq!(parser.classify(""), LineOutcome::Skip("too few fields"));
    }

    #[test]
    fn test_two_containers_yield_two_tuples() {
        let output = "NAME      CONTAINER    CPU %     MEM USAGE / LIMIT\n\
                      a         1f2e3d4c5b6a 0.50%     20MiB / 1.944GiB\n\
                      b         6a5b4c3d2e1f 3.25%     1.2GiB / 1.944GiB\n";
        let parsed = LineParser::container_stats().parse(output);

        let mut labels: Vec<&str> = parsed.tuples.iter().map(|t| t.label.as_str()).collect();
        labels.sort_unstable();
        assert_eq!(labels, vec!["a", "b"]);
        assert_eq!(parsed.rejected, 0);
    }

    #[test]
    fn test_malformed_line_does_not_drop_sample() {
        let output = "a 1 x% 20MiB / 1GiB\nb 2 1.0% 20MiB / 1GiB\n";
        let parsed = LineParser::container_stats().parse(output);
        assert_eq!(parsed.tuples, vec![MetricTuple::new("b", 1.0, 20.0 * 1024.0 * 1024.0)]);
        assert_eq!(parsed.rejected, 1);
    }
}
