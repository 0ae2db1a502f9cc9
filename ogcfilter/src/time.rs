//! Time values in `During` predicates and the filter text built from them.

use crate::error::ParseError;
use crate::grammar::{Rule, TimeParser};
use pest::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeResolution {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

/// Resolution of the first known format `text` starts with.
pub fn resolution(text: &str) -> Result<TimeResolution, ParseError> {
    let pair = TimeParser::parse(Rule::TimeValue, text)?.next().ok_or_else(|| ParseError::InvalidTime(text.to_string()))?;
    let resolution = match pair.as_rule() {
        Rule::CompactDate | Rule::Date => TimeResolution::Day,
        Rule::UtcDateTime
        | Rule::DateTime
        | Rule::SpacedDateTime
        | Rule::UtcTimeOfDay
        | Rule::TimeOfDay
        | Rule::BareUtcTimeOfDay
        | Rule::BareTimeOfDay => TimeResolution::Second,
        Rule::DateHourMinute | Rule::SpacedHourMinute => TimeResolution::Minute,
        Rule::DateHour | Rule::SpacedDateHour => TimeResolution::Hour,
        Rule::YearMonth => TimeResolution::Month,
        Rule::Year => TimeResolution::Year,
        _ => return Err(ParseError::InvalidTime(text.to_string())),
    };
    Ok(resolution)
}

/// How a layer quotes time fields and values in its filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeSyntax {
    /// `` `[field]` = `value` ``, understood by the built-in expression evaluator
    #[default]
    Backticks,
    /// `field = 'value'`, for SQL backed layers
    Plain,
}

impl TimeSyntax {
    fn field(&self, field: &str, buffer: &mut String) {
        match self {
            TimeSyntax::Backticks => {
                buffer.push_str("`[");
                buffer.push_str(field);
                buffer.push_str("]`");
            }
            TimeSyntax::Plain => buffer.push_str(field),
        }
    }

    fn value(&self, value: &str, buffer: &mut String) {
        let quote = match self {
            TimeSyntax::Backticks => '`',
            TimeSyntax::Plain => '\'',
        };
        buffer.push(quote);
        buffer.push_str(value);
        buffer.push(quote);
    }

    fn term(&self, field: &str, operator: &str, value: &str, buffer: &mut String) {
        self.field(field, buffer);
        buffer.push(' ');
        buffer.push_str(operator);
        buffer.push(' ');
        self.value(value, buffer);
    }
}

/// Builds the filter selecting `times` on `field`.
///
/// `times` is a single instant, a comma separated list of instants, or a comma
/// separated list of `begin/end` ranges. Returns `None` when the list cannot be
/// interpreted.
pub fn time_filter(field: &str, times: &str, syntax: TimeSyntax) -> Option<String> {
    let mut buffer = String::new();

    if !times.contains(',') && !times.contains('/') {
        buffer.push('(');
        syntax.term(field, "=", times, &mut buffer);
        buffer.push(')');
        return Some(buffer);
    }

    let entries: Vec<&str> = times.split(',').collect();
    match entries[0].split('/').count() {
        2 => {
            for entry in &entries {
                let bounds: Vec<&str> = entry.split('/').collect();
                if bounds.len() != 2 {
                    continue;
                }
                buffer.push_str(if buffer.is_empty() { "(" } else { " OR " });
                buffer.push('(');
                syntax.term(field, ">=", bounds[0], &mut buffer);
                buffer.push_str(" AND ");
                syntax.term(field, "<=", bounds[1], &mut buffer);
                buffer.push(')');
            }
            buffer.push(')');
        }
        1 => {
            buffer.push('(');
            for (i, entry) in entries.iter().enumerate() {
                if i > 0 {
                    buffer.push_str(" OR ");
                }
                buffer.push('(');
                syntax.term(field, "=", entry, &mut buffer);
                buffer.push(')');
            }
            buffer.push(')');
        }
        _ => return None,
    }
    Some(buffer)
}
