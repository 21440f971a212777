//! Comparison values used by every numeric filter
//!
//! A comparison is an optional operator followed by a payload. The payload
//! shapes are tried in this order:
//!
//! ```text
//! 123 | 0x7b          scalar (decimal, or hex with 0x prefix)
//! 7b | 0x7b/0xff      hex value with an optional mask
//! 1:2 | >=2:<=3       two hex fields, each with its own operator
//! ```
//!
//! Operators: none (equal), `!`, `<`, `>`, `<=`, `>=`.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("valid decimal regex"));
static PREFIXED_HEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0[xX]([0-9a-fA-F]+)$").expect("valid hex regex"));
static MASKED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:0[xX])?([0-9a-fA-F]+)(?:/(?:0[xX])?([0-9a-fA-F]+))?$")
        .expect("valid masked hex regex")
});
static DUAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:0[xX])?([0-9a-fA-F]+):(<=|>=|!|<|>)?(?:0[xX])?([0-9a-fA-F]+)$")
        .expect("valid dual hex regex")
});

/// Errors raised while parsing a comparison value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompareError {
    #[error("empty comparison value")]
    Empty,

    #[error("unrecognized comparison value '{0}'")]
    Malformed(String),

    #[error("number '{0}' does not fit in 64 bits")]
    Overflow(String),
}

/// Comparison operator, applied as `observed <op> expected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Op {
    /// Split a leading operator off `input`. No operator means equality.
    pub fn split(input: &str) -> (Op, &str) {
        // two-character operators first
        if let Some(rest) = input.strip_prefix("<=") {
            (Op::Le, rest)
        } else if let Some(rest) = input.strip_prefix(">=") {
            (Op::Ge, rest)
        } else if let Some(rest) = input.strip_prefix('!') {
            (Op::Ne, rest)
        } else if let Some(rest) = input.strip_prefix('<') {
            (Op::Lt, rest)
        } else if let Some(rest) = input.strip_prefix('>') {
            (Op::Gt, rest)
        } else {
            (Op::Eq, input)
        }
    }

    pub fn apply(self, observed: u64, expected: u64) -> bool {
        match self {
            Op::Eq => observed == expected,
            Op::Ne => observed != expected,
            Op::Lt => observed < expected,
            Op::Gt => observed > expected,
            Op::Le => observed <= expected,
            Op::Ge => observed >= expected,
        }
    }

    fn from_symbol(symbol: Option<&str>) -> Op {
        match symbol {
            Some(symbol) => Op::split(symbol).0,
            None => Op::Eq,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Op::Eq => "",
            Op::Ne => "!",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Le => "<=",
            Op::Ge => ">=",
        };
        f.write_str(symbol)
    }
}

/// A parsed filter comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComparisonValue {
    Scalar {
        op: Op,
        value: u64,
    },
    MaskedHex {
        op: Op,
        value: u64,
        mask: Option<u64>,
    },
    DualHex {
        op1: Op,
        value1: u64,
        op2: Op,
        value2: u64,
    },
}

/// A value found in a listing, parsed with the same payload grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedValue {
    Scalar(u64),
    MaskedHex { value: u64, mask: Option<u64> },
    DualHex(u64, u64),
}

/// Payload shapes shared by filters and observed values
enum Payload {
    Scalar(u64),
    Masked(u64, Option<u64>),
    Dual(u64, Op, u64),
}

fn parse_radix(digits: &str, radix: u32, raw: &str) -> Result<u64, CompareError> {
    u64::from_str_radix(digits, radix).map_err(|_| CompareError::Overflow(raw.to_string()))
}

fn parse_payload(payload: &str) -> Result<Payload, CompareError> {
    if payload.is_empty() {
        return Err(CompareError::Empty);
    }

    if DECIMAL_RE.is_match(payload) {
        return parse_radix(payload, 10, payload).map(Payload::Scalar);
    }
    if let Some(caps) = PREFIXED_HEX_RE.captures(payload) {
        return parse_radix(&caps[1], 16, payload).map(Payload::Scalar);
    }
    if let Some(caps) = MASKED_RE.captures(payload) {
        let value = parse_radix(&caps[1], 16, payload)?;
        let mask = caps
            .get(2)
            .map(|m| parse_radix(m.as_str(), 16, payload))
            .transpose()?;
        return Ok(Payload::Masked(value, mask));
    }
    if let Some(caps) = DUAL_RE.captures(payload) {
        let first = parse_radix(&caps[1], 16, payload)?;
        let op2 = Op::from_symbol(caps.get(2).map(|m| m.as_str()));
        let second = parse_radix(&caps[3], 16, payload)?;
        return Ok(Payload::Dual(first, op2, second));
    }

    Err(CompareError::Malformed(payload.to_string()))
}

/// Resolve the two sides of a masked comparison.
///
/// A single mask applies to both values; when both sides carry one, each
/// value is masked with its own.
fn apply_masks(
    observed: u64,
    observed_mask: Option<u64>,
    expected: u64,
    expected_mask: Option<u64>,
) -> (u64, u64) {
    match (observed_mask, expected_mask) {
        (Some(om), Some(em)) => (observed & om, expected & em),
        (Some(mask), None) | (None, Some(mask)) => (observed & mask, expected & mask),
        (None, None) => (observed, expected),
    }
}

impl ComparisonValue {
    pub fn parse(input: &str) -> Result<Self, CompareError> {
        let input = input.trim();
        let (op, payload) = Op::split(input);

        Ok(match parse_payload(payload)? {
            Payload::Scalar(value) => ComparisonValue::Scalar { op, value },
            Payload::Masked(value, mask) => ComparisonValue::MaskedHex { op, value, mask },
            Payload::Dual(value1, op2, value2) => ComparisonValue::DualHex {
                op1: op,
                value1,
                op2,
                value2,
            },
        })
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, ComparisonValue::Scalar { .. })
    }

    /// Compare against an observed value.
    ///
    /// Returns `None` when the shapes cannot be compared (dual against
    /// single, or the reverse).
    pub fn matches(&self, observed: &ObservedValue) -> Option<bool> {
        let (op, expected, expected_mask) = match *self {
            ComparisonValue::DualHex {
                op1,
                value1,
                op2,
                value2,
            } => {
                return match *observed {
                    ObservedValue::DualHex(first, second) => {
                        Some(op1.apply(first, value1) && op2.apply(second, value2))
                    }
                    _ => None,
                };
            }
            ComparisonValue::Scalar { op, value } => (op, value, None),
            ComparisonValue::MaskedHex { op, value, mask } => (op, value, mask),
        };

        let (observed, observed_mask) = match *observed {
            ObservedValue::Scalar(value) => (value, None),
            ObservedValue::MaskedHex { value, mask } => (value, mask),
            ObservedValue::DualHex(..) => return None,
        };

        let (lhs, rhs) = apply_masks(observed, observed_mask, expected, expected_mask);
        Some(op.apply(lhs, rhs))
    }

    /// Parse `raw` as an observed value and compare. `None` when `raw` is
    /// not numeric or not comparable.
    pub fn matches_str(&self, raw: &str) -> Option<bool> {
        ObservedValue::parse(raw).and_then(|observed| self.matches(&observed))
    }
}

impl FromStr for ComparisonValue {
    type Err = CompareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComparisonValue::parse(s)
    }
}

impl fmt::Display for ComparisonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonValue::Scalar { op, value } => write!(f, "{op}{value}"),
            // without a mask, a `0x` prefix would read back as a scalar
            ComparisonValue::MaskedHex { op, value, mask } => match mask {
                Some(mask) => write!(f, "{op}{value:#x}/{mask:#x}"),
                None => write!(f, "{op}{value:x}"),
            },
            ComparisonValue::DualHex {
                op1,
                value1,
                op2,
                value2,
            } => write!(f, "{op1}{value1:x}:{op2}{value2:x}"),
        }
    }
}

impl ObservedValue {
    pub fn parse(raw: &str) -> Option<Self> {
        match parse_payload(raw.trim()).ok()? {
            Payload::Scalar(value) => Some(ObservedValue::Scalar(value)),
            Payload::Masked(value, mask) => Some(ObservedValue::MaskedHex { value, mask }),
            Payload::Dual(first, Op::Eq, second) => Some(ObservedValue::DualHex(first, second)),
            // listings never carry operators
            Payload::Dual(..) => None,
        }
    }

    /// The plain integer, if this is a scalar
    pub fn as_scalar(&self) -> Option<u64> {
        match self {
            ObservedValue::Scalar(value) => Some(*value),
            _ => None,
        }
    }
}
