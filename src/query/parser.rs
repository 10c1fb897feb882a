//! Query surface language parser.
//!
//! Walks tokens left to right, accumulating into whichever clause is
//! currently active until a new clause keyword is seen. Uses a `Peekable`
//! token cursor so unexpected end-of-input is a value, not a panic.

use crate::error::{LsmError, Result};
use std::iter::Peekable;
use std::str::SplitWhitespace;

#[derive(Debug, Clone, PartialEq)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub select: Vec<String>,
    pub from: String,
    pub where_clauses: Vec<String>,
    pub group_by: Vec<String>,
    pub time_range: Option<TimeRange>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

const CLAUSE_KEYWORDS: &[&str] = &["FROM", "WHERE", "GROUP", "TIME", "LIMIT", "OFFSET", "SELECT"];

fn is_keyword(tok: &str) -> bool {
    CLAUSE_KEYWORDS.contains(&tok.to_uppercase().as_str())
}

/// Parse the surface query language. Missing `FROM` is the one hard
/// error; everything else best-effort accumulates into whichever clause
/// is active, silently tolerating unknown tokens.
pub fn parse_query(query: &str) -> Result<Plan> {
    let mut tokens: Peekable<SplitWhitespace> = query.split_whitespace().peekable();
    let mut plan = Plan::default();
    let mut saw_from = false;

    while let Some(tok) = tokens.next() {
        match tok.to_uppercase().as_str() {
            "SELECT" => {
                while let Some(&next) = tokens.peek() {
                    if is_keyword(next) {
                        break;
                    }
                    plan.select.push(tokens.next().unwrap().trim_matches(',').to_string());
                }
            }
            "FROM" => {
                plan.from = tokens
                    .next()
                    .ok_or_else(|| LsmError::MalformedQuery("FROM with no measurement".into()))?
                    .to_string();
                saw_from = true;
            }
            "WHERE" => {
                while let Some(&next) = tokens.peek() {
                    if is_keyword(next) {
                        break;
                    }
                    plan.where_clauses.push(tokens.next().unwrap().to_string());
                }
            }
            "GROUP" => {
                consume_literal(&mut tokens, "BY")?;
                while let Some(&next) = tokens.peek() {
                    if is_keyword(next) {
                        break;
                    }
                    plan.group_by.push(tokens.next().unwrap().trim_matches(',').to_string());
                }
            }
            "TIME" => {
                consume_literal(&mut tokens, "RANGE")?;
                let start = tokens
                    .next()
                    .ok_or_else(|| LsmError::MalformedQuery("TIME RANGE missing start".into()))?
                    .to_string();
                consume_literal(&mut tokens, "TO")?;
                let end = tokens
                    .next()
                    .ok_or_else(|| LsmError::MalformedQuery("TIME RANGE missing end".into()))?
                    .to_string();
                plan.time_range = Some(TimeRange { start, end });
            }
            "LIMIT" => {
                plan.limit = Some(parse_non_negative(&mut tokens, "LIMIT")?);
            }
            "OFFSET" => {
                plan.offset = Some(parse_non_negative(&mut tokens, "OFFSET")?);
            }
            _ => {
                // Unrecognized clause keyword: tolerated, no error surfaced.
            }
        }
    }

    if !saw_from {
        return Err(LsmError::MalformedQuery("missing FROM clause".into()));
    }

    Ok(plan)
}

fn consume_literal(tokens: &mut Peekable<SplitWhitespace>, expected: &str) -> Result<()> {
    match tokens.next() {
        Some(tok) if tok.eq_ignore_ascii_case(expected) => Ok(()),
        _ => Err(LsmError::MalformedQuery(format!("expected {expected}"))),
    }
}

fn parse_non_negative(tokens: &mut Peekable<SplitWhitespace>, clause: &str) -> Result<usize> {
    tokens
        .next()
        .ok_or_else(|| LsmError::MalformedQuery(format!("{clause} missing value")))?
        .parse::<usize>()
        .map_err(|_| LsmError::MalformedQuery(format!("{clause} requires a non-negative integer")))
}

/// An item in the SELECT list: a bare field, `*`, or `FN(field)`.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Star,
    Field(String),
    Aggregate { func: AggFunc, field: String, text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "COUNT" => Some(Self::Count),
            "SUM" => Some(Self::Sum),
            "AVG" => Some(Self::Avg),
            "MIN" => Some(Self::Min),
            "MAX" => Some(Self::Max),
            _ => None,
        }
    }
}

impl SelectItem {
    pub fn parse(item: &str) -> Self {
        if item == "*" {
            return Self::Star;
        }
        if let Some(open) = item.find('(') {
            if let Some(close) = item.find(')') {
                if close > open {
                    let func_name = &item[..open];
                    let field = item[open + 1..close].to_string();
                    if let Some(func) = AggFunc::from_str(func_name) {
                        return Self::Aggregate {
                            func,
                            field,
                            text: item.to_string(),
                        };
                    }
                }
            }
        }
        Self::Field(item.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_from_is_malformed() {
        assert!(parse_query("SELECT * WHERE x=1").is_err());
    }

    #[test]
    fn parses_full_clause_set() {
        let plan = parse_query(
            "SELECT AVG(value) FROM cpu WHERE host=a GROUP BY host TIME RANGE 2020-01-01T00:00:00Z TO 2020-01-02T00:00:00Z LIMIT 10 OFFSET 5",
        )
        .unwrap();
        assert_eq!(plan.select, vec!["AVG(value)"]);
        assert_eq!(plan.from, "cpu");
        assert_eq!(plan.where_clauses, vec!["host=a"]);
        assert_eq!(plan.group_by, vec!["host"]);
        assert_eq!(
            plan.time_range,
            Some(TimeRange {
                start: "2020-01-01T00:00:00Z".to_string(),
                end: "2020-01-02T00:00:00Z".to_string(),
            })
        );
        assert_eq!(plan.limit, Some(10));
        assert_eq!(plan.offset, Some(5));
    }

    #[test]
    fn select_star_and_bare_fields() {
        let plan = parse_query("SELECT * FROM cpu").unwrap();
        assert_eq!(plan.select, vec!["*"]);

        let plan2 = parse_query("SELECT value,host FROM cpu").unwrap();
        assert_eq!(plan2.select, vec!["value,host".to_string()]);
    }

    #[test]
    fn select_item_classifies_aggregates() {
        assert_eq!(SelectItem::parse("*"), SelectItem::Star);
        assert_eq!(SelectItem::parse("value"), SelectItem::Field("value".into()));
        assert_eq!(
            SelectItem::parse("AVG(value)"),
            SelectItem::Aggregate {
                func: AggFunc::Avg,
                field: "value".into(),
                text: "AVG(value)".into(),
            }
        );
    }

    #[test]
    fn unknown_tokens_are_tolerated() {
        let plan = parse_query("SELECT * FROM cpu FOOBAR BAZ").unwrap();
        assert_eq!(plan.from, "cpu");
    }
}
