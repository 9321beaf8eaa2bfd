/// Command Parser - plain-language command text → verb + clause tokens
///
/// Pipeline:
/// 1. Normalize: lower-case, strip punctuation, isolate operator symbols
/// 2. Recognize the leading verb (with synonyms)
/// 3. Verb-specific heads: sort column/direction, chart metric/columns
/// 4. Match operator phrases greedily (longest first) so that
///    "greater than or equal to" and "is not" are never split on `or`/`not`
/// 5. Split the remaining words on connectives into clauses of
///    `<column phrase> <operator> <value>`
///
/// Parsing never drops a clause: a clause without an operator is a ParseError
/// carrying the clause text.
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::token::{CommandToken, Connective, Operator, Verb};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::execution::AggregateMetric;
use crate::quality::IssueKind;

/// Result of parsing one command
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedCommand {
    pub verb: Verb,
    /// Command text as received
    pub text: String,
    /// Clause tokens: `[Not]* ColumnRef Operator [Literal]` groups joined by And/Or
    pub clauses: Vec<CommandToken>,
    /// Source text of each clause, in clause order
    pub fragments: Vec<String>,
    /// Data-quality scan requested instead of explicit clauses
    pub scan: Option<ScanRequest>,
    pub sort: Option<SortSpec>,
    pub chart: Option<ChartSpec>,
    /// Column phrases a summary is limited to ("summarize revenue and units")
    #[serde(default)]
    pub focus: Vec<String>,
}

impl ParsedCommand {
    /// Full token stream, verb first
    pub fn tokens(&self) -> Vec<CommandToken> {
        std::iter::once(CommandToken::Verb(self.verb))
            .chain(self.clauses.iter().cloned())
            .collect()
    }

    pub fn has_clauses(&self) -> bool {
        !self.clauses.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub kinds: Vec<IssueKind>,
    /// Restrict the scan to one column phrase
    pub column: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    pub descending: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Pie,
    /// Points in category order, for dates and other ordered x values
    Line,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    /// Explicit metric; None lets the engine pick from the value column's type
    pub metric: Option<AggregateMetric>,
    /// Column being measured; None for row counts and frequency charts
    pub value_column: Option<String>,
    /// Column providing the categories
    pub group_column: String,
}

#[derive(Clone, Debug, PartialEq)]
enum Item {
    Word(String),
    Op(Operator, String),
    Conn(Connective, String),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Last {
    Start,
    Clause,
    Join,
    Not,
}

const SYMBOL_CHARS: &[char] = &['<', '>', '=', '!'];
const CREATE_WORDS: &[&str] = &["create", "make", "draw", "generate", "build", "give"];
const ARTICLES: &[&str] = &["a", "an", "the", "me"];
const CHART_WORDS: &[&str] = &["chart", "plot", "graph"];
const NULL_CHECK_TRAILERS: &[&str] = &["value", "values", "cell", "cells", "entries"];
const SUMMARY_LEAD_WORDS: &[&str] = &["of", "on", "for", "about"];
const WHOLE_SHEET_WORDS: &[&str] = &["data", "dataset", "sheet", "table", "spreadsheet", "everything", "it", "this"];
const SCAN_STOP_WORDS: &[&str] = &[
    "value", "values", "cell", "cells", "data", "entries", "type", "types", "in", "of", "rows", "row",
    "with", "the", "any", "all", "for", "column",
];

pub struct CommandParser {
    filler_words: Vec<String>,
    operator_phrases: Vec<(Vec<String>, Operator)>,
}

impl CommandParser {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            filler_words: config.filler_words.clone(),
            operator_phrases: operator_phrases(),
        }
    }

    pub fn parse(&self, raw: &str) -> EngineResult<ParsedCommand> {
        let words = normalize(raw);
        if words.is_empty() {
            return Err(EngineError::parse("empty command", raw));
        }

        let (verb, chart_kind, consumed) = recognize_verb(&words)?;
        let rest = &words[consumed..];

        let mut command = ParsedCommand {
            verb,
            text: raw.to_string(),
            clauses: Vec::new(),
            fragments: Vec::new(),
            scan: None,
            sort: None,
            chart: None,
            focus: Vec::new(),
        };

        let clause_words: Vec<String> = match verb {
            Verb::Sort => {
                let (head, tail) = split_on_where(rest);
                command.sort = Some(self.parse_sort(head, raw)?);
                tail.to_vec()
            }
            Verb::Chart => {
                let (head, tail) = split_on_where(rest);
                command.chart = Some(self.parse_chart(head, chart_kind.unwrap_or(ChartKind::Bar), raw)?);
                tail.to_vec()
            }
            Verb::Summarize => {
                let (head, tail) = split_on_where(rest);
                let head_has_operator = self.classify(head).iter().any(|i| matches!(i, Item::Op(..)));
                if tail.is_empty() && head_has_operator {
                    // "summarize region is west": a condition without 'where'
                    rest.to_vec()
                } else {
                    command.focus = self.parse_focus(head, raw)?;
                    tail.to_vec()
                }
            }
            _ => rest.to_vec(),
        };

        let clause_words = self.strip_leading_fillers(&clause_words);
        let items = self.classify(&clause_words);

        let has_operator = items.iter().any(|i| matches!(i, Item::Op(..)));
        if !has_operator && !clause_words.is_empty() && verb != Verb::Sort && verb != Verb::Chart {
            if let Some(scan) = detect_scan(&clause_words) {
                debug!(verb = %verb, kinds = ?scan.kinds, "parsed data-quality scan command");
                command.scan = Some(scan);
                return Ok(command);
            }
        }

        let (clauses, fragments) = self.build_clauses(items)?;
        command.clauses = clauses;
        command.fragments = fragments;

        debug!(
            verb = %verb,
            clauses = command.fragments.len(),
            "parsed command"
        );
        Ok(command)
    }

    /// Column phrases named before a summary's where-clause, split on 'and'.
    /// Words naming the whole sheet ("summarize the data") mean no focus.
    fn parse_focus(&self, head: &[String], raw: &str) -> EngineResult<Vec<String>> {
        let words: Vec<&String> = head
            .iter()
            .skip_while(|w| self.is_filler(w) || SUMMARY_LEAD_WORDS.contains(&w.as_str()))
            .collect();
        if words.iter().all(|w| WHOLE_SHEET_WORDS.contains(&w.as_str()) || self.is_filler(w)) {
            return Ok(Vec::new());
        }

        let mut phrases = Vec::new();
        for group in words.split(|w| w.as_str() == "and") {
            let phrase: Vec<&str> = group
                .iter()
                .map(|w| w.as_str())
                .skip_while(|w| self.is_filler(w))
                .collect();
            if phrase.is_empty() {
                return Err(EngineError::parse("missing column name in summary", raw));
            }
            if let Some(conn) = phrase.iter().find(|w| Connective::from_word(w).is_some()) {
                return Err(EngineError::parse(
                    format!("'{}' is not allowed between summary columns; use 'and'", conn),
                    raw,
                ));
            }
            phrases.push(phrase.join(" "));
        }
        Ok(phrases)
    }

    fn is_filler(&self, word: &str) -> bool {
        self.filler_words.iter().any(|w| w == word)
    }

    fn strip_leading_fillers(&self, words: &[String]) -> Vec<String> {
        words
            .iter()
            .skip_while(|w| self.is_filler(w))
            .cloned()
            .collect()
    }

    /// Tag each word as operator phrase, connective or plain word
    fn classify(&self, words: &[String]) -> Vec<Item> {
        let mut items = Vec::new();
        let mut i = 0;
        while i < words.len() {
            let matched = self.operator_phrases.iter().find(|(phrase, _)| {
                i + phrase.len() <= words.len() && words[i..i + phrase.len()] == phrase[..]
            });
            if let Some((phrase, op)) = matched {
                items.push(Item::Op(*op, phrase.join(" ")));
                i += phrase.len();
                continue;
            }
            let word = &words[i];
            match Connective::from_word(word) {
                Some(conn) => items.push(Item::Conn(conn, word.clone())),
                None => items.push(Item::Word(word.clone())),
            }
            i += 1;
        }
        items
    }

    fn build_clauses(&self, items: Vec<Item>) -> EngineResult<(Vec<CommandToken>, Vec<String>)> {
        let mut tokens = Vec::new();
        let mut fragments = Vec::new();
        let mut current: Vec<Item> = Vec::new();
        let mut last = Last::Start;
        let mut last_word = String::new();

        for item in items {
            match item {
                Item::Conn(conn, word) => {
                    if !current.is_empty() {
                        let (clause, text) = self.finish_clause(std::mem::take(&mut current))?;
                        tokens.extend(clause);
                        fragments.push(text);
                        last = Last::Clause;
                    }
                    match conn {
                        Connective::And | Connective::Or => {
                            if last != Last::Clause {
                                return Err(EngineError::parse(
                                    format!("'{}' must join two conditions", word),
                                    word,
                                ));
                            }
                            last = Last::Join;
                        }
                        Connective::Not => {
                            if last == Last::Clause {
                                return Err(EngineError::parse(
                                    "use 'and not' or 'or not' between conditions",
                                    word,
                                ));
                            }
                            last = Last::Not;
                        }
                    }
                    tokens.push(CommandToken::Connective(conn));
                    last_word = word;
                }
                other => current.push(other),
            }
        }

        if !current.is_empty() {
            let (clause, text) = self.finish_clause(current)?;
            tokens.extend(clause);
            fragments.push(text);
            last = Last::Clause;
        }

        if matches!(last, Last::Join | Last::Not) {
            return Err(EngineError::parse(
                format!("missing condition after '{}'", last_word),
                last_word,
            ));
        }
        Ok((tokens, fragments))
    }

    /// Split one clause group into column phrase, operator and value
    fn finish_clause(&self, items: Vec<Item>) -> EngineResult<(Vec<CommandToken>, String)> {
        let text = items
            .iter()
            .map(|item| match item {
                Item::Word(w) | Item::Op(_, w) | Item::Conn(_, w) => w.as_str(),
            })
            .collect::<Vec<_>>()
            .join(" ");

        let op_pos = items.iter().position(|i| matches!(i, Item::Op(..)));
        let Some(op_pos) = op_pos else {
            return Err(EngineError::parse("no comparison operator found", text));
        };

        let column_words: Vec<String> = items[..op_pos]
            .iter()
            .map(item_text)
            .skip_while(|w| self.is_filler(w))
            .collect();
        // Later operator words belong to the value ("title contains under the sea")
        let value_words: Vec<String> = items[op_pos + 1..].iter().map(item_text).collect();

        let (op, op_text) = match &items[op_pos] {
            Item::Op(op, phrase) => (*op, phrase.clone()),
            _ => return Err(EngineError::internal("operator position holds a non-operator item")),
        };

        if column_words.is_empty() {
            return Err(EngineError::parse(
                format!("missing column name before '{}'", op_text),
                text,
            ));
        }

        let mut tokens = vec![
            CommandToken::ColumnRef(column_words.join(" ")),
            CommandToken::Operator(op),
        ];

        if op.takes_value() {
            if value_words.is_empty() {
                return Err(EngineError::parse(format!("missing value after '{}'", op_text), text));
            }
            tokens.push(CommandToken::Literal(value_words.join(" ")));
        } else if value_words
            .iter()
            .any(|w| !NULL_CHECK_TRAILERS.contains(&w.as_str()))
        {
            return Err(EngineError::parse(
                format!("unexpected text after '{}'", op_text),
                text,
            ));
        }

        Ok((tokens, text))
    }

    fn parse_sort(&self, head: &[String], raw: &str) -> EngineResult<SortSpec> {
        let mut words: Vec<String> = head
            .iter()
            .skip_while(|w| matches!(w.as_str(), "by" | "on") || self.is_filler(w))
            .cloned()
            .collect();
        // "the" can survive between "by" and the column ("sort by the revenue")
        while words.first().map_or(false, |w| w == "by" || w == "on" || self.is_filler(w)) {
            words.remove(0);
        }

        let mut descending = false;
        if words.last().map_or(false, |w| w == "order") {
            words.pop();
        }
        let trailing: [(&[&str], bool); 10] = [
            (&["high", "to", "low"], true),
            (&["highest", "first"], true),
            (&["largest", "first"], true),
            (&["low", "to", "high"], false),
            (&["lowest", "first"], false),
            (&["smallest", "first"], false),
            (&["descending"], true),
            (&["desc"], true),
            (&["ascending"], false),
            (&["asc"], false),
        ];
        for (phrase, desc) in trailing.iter() {
            if words.len() >= phrase.len() && words[words.len() - phrase.len()..] == phrase[..] {
                words.truncate(words.len() - phrase.len());
                descending = *desc;
                break;
            }
        }
        if words.last().map_or(false, |w| w == "in" || w == "from") {
            words.pop();
        }

        if words.is_empty() {
            return Err(EngineError::parse("sort needs a column name", raw));
        }
        Ok(SortSpec {
            column: words.join(" "),
            descending,
        })
    }

    fn parse_chart(&self, head: &[String], kind: ChartKind, raw: &str) -> EngineResult<ChartSpec> {
        let mut words: Vec<&str> = head
            .iter()
            .map(String::as_str)
            .skip_while(|w| matches!(*w, "for" | "of" | "on" | "a" | "an" | "the" | "column"))
            .collect();

        let metric = words.first().and_then(|w| AggregateMetric::from_word(w));
        if metric.is_some() {
            words.remove(0);
            while words.first().map_or(false, |w| matches!(*w, "of" | "the")) {
                words.remove(0);
            }
        }

        let by_pos = words.iter().position(|w| matches!(*w, "by" | "per" | "across"));
        let (value_part, group_part): (Vec<&str>, Vec<&str>) = match by_pos {
            Some(pos) => (
                words[..pos].to_vec(),
                words[pos + 1..]
                    .iter()
                    .copied()
                    .skip_while(|w| matches!(*w, "each" | "the"))
                    .collect(),
            ),
            None => (words.clone(), Vec::new()),
        };

        if by_pos.is_some() {
            if group_part.is_empty() {
                return Err(EngineError::parse("chart needs a column after 'by'", raw));
            }
            let value_column = if value_part.is_empty() {
                if metric != Some(AggregateMetric::Count) && metric.is_some() {
                    return Err(EngineError::parse("chart metric needs a column to measure", raw));
                }
                None
            } else {
                Some(value_part.join(" "))
            };
            return Ok(ChartSpec {
                kind,
                metric,
                value_column,
                group_column: group_part.join(" "),
            });
        }

        if value_part.is_empty() {
            return Err(EngineError::parse("chart needs a column name", raw));
        }
        if metric.is_some() && metric != Some(AggregateMetric::Count) {
            return Err(EngineError::parse(
                "use 'by <column>' to group a metric chart",
                raw,
            ));
        }
        Ok(ChartSpec {
            kind,
            metric: Some(AggregateMetric::Count),
            value_column: None,
            group_column: value_part.join(" "),
        })
    }
}

fn item_text(item: &Item) -> String {
    match item {
        Item::Word(w) | Item::Op(_, w) | Item::Conn(_, w) => w.clone(),
    }
}

/// Lower-case, isolate operator symbols and strip punctuation.
/// Characters that belong to numbers and dates (`. - / $ ,` between digits) survive.
pub fn normalize(raw: &str) -> Vec<String> {
    let lowered = raw.to_lowercase();
    let chars: Vec<char> = lowered.chars().collect();
    let mut cleaned = String::with_capacity(lowered.len() + 8);

    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if SYMBOL_CHARS.contains(&ch) {
            cleaned.push(' ');
            while i < chars.len() && SYMBOL_CHARS.contains(&chars[i]) {
                cleaned.push(chars[i]);
                i += 1;
            }
            cleaned.push(' ');
            continue;
        }
        let digit_before = i > 0 && chars[i - 1].is_ascii_digit();
        let digit_after = i + 1 < chars.len() && chars[i + 1].is_ascii_digit();
        match ch {
            '\'' | '\u{2019}' => {}
            c if c.is_alphanumeric() || c.is_whitespace() => cleaned.push(c),
            '.' | '-' | '/' | '_' | '$' | '&' | '|' | '#' => cleaned.push(ch),
            ',' if digit_before && digit_after => cleaned.push(ch),
            _ => cleaned.push(' '),
        }
        i += 1;
    }

    cleaned
        .split_whitespace()
        .map(|w| w.trim_end_matches(['.', '-']).to_string())
        .filter(|w| !w.is_empty() && w.chars().any(|c| c.is_alphanumeric() || SYMBOL_CHARS.contains(&c) || c == '&' || c == '|'))
        .filter(|w| w != "!")
        .collect()
}

fn recognize_verb(words: &[String]) -> EngineResult<(Verb, Option<ChartKind>, usize)> {
    let mut i = 0;
    let prefixed = CREATE_WORDS.contains(&words[0].as_str());
    if prefixed {
        i = 1;
        while i < words.len() && ARTICLES.contains(&words[i].as_str()) {
            i += 1;
        }
    }

    if i + 1 < words.len() && CHART_WORDS.contains(&words[i + 1].as_str()) {
        let kind = match words[i].as_str() {
            "bar" | "column" => Some(ChartKind::Bar),
            "pie" => Some(ChartKind::Pie),
            "line" | "trend" => Some(ChartKind::Line),
            _ => None,
        };
        if let Some(kind) = kind {
            return Ok((Verb::Chart, Some(kind), i + 2));
        }
    }

    match words.get(i).and_then(|w| Verb::from_word(w)) {
        Some(verb) if !prefixed || matches!(verb, Verb::Chart | Verb::Summarize) => Ok((verb, None, i + 1)),
        _ => Err(EngineError::parse(
            "unrecognized command verb; start with show, filter, highlight, sort, remove, chart or summarize",
            words[0].clone(),
        )),
    }
}

fn split_on_where(words: &[String]) -> (&[String], &[String]) {
    match words.iter().position(|w| w == "where") {
        Some(pos) => (&words[..pos], &words[pos + 1..]),
        None => (words, &[]),
    }
}

fn detect_scan(words: &[String]) -> Option<ScanRequest> {
    let mut kinds = Vec::new();
    let mut keyword_positions = Vec::new();
    for (idx, word) in words.iter().enumerate() {
        let kind: &[IssueKind] = match word.as_str() {
            "missing" | "empty" | "blank" | "blanks" | "null" | "nulls" | "gaps" => &[IssueKind::Missing],
            "duplicate" | "duplicates" | "duplicated" | "repeated" => &[IssueKind::Duplicate],
            "invalid" | "mismatched" | "mismatch" | "mismatches" | "wrong" | "inconsistent" | "bad" => {
                &[IssueKind::TypeMismatch]
            }
            "error" | "errors" => &[IssueKind::TypeMismatch, IssueKind::ErrorValue],
            "outlier" | "outliers" | "unusual" | "extreme" | "anomalies" | "anomalous" => &[IssueKind::OutOfRange],
            _ => continue,
        };
        keyword_positions.push(idx);
        for k in kind {
            if !kinds.contains(k) {
                kinds.push(*k);
            }
        }
    }
    if kinds.is_empty() {
        return None;
    }
    let column: Vec<&str> = words
        .iter()
        .enumerate()
        .filter(|(idx, w)| !keyword_positions.contains(idx) && !SCAN_STOP_WORDS.contains(&w.as_str()))
        .map(|(_, w)| w.as_str())
        .collect();
    Some(ScanRequest {
        kinds,
        column: if column.is_empty() { None } else { Some(column.join(" ")) },
    })
}

/// Operator phrase table, longest phrases first
fn operator_phrases() -> Vec<(Vec<String>, Operator)> {
    let base: &[(&str, Operator)] = &[
        (">", Operator::Gt),
        ("greater than", Operator::Gt),
        ("more than", Operator::Gt),
        ("bigger than", Operator::Gt),
        ("larger than", Operator::Gt),
        ("higher than", Operator::Gt),
        ("above", Operator::Gt),
        ("over", Operator::Gt),
        ("exceeds", Operator::Gt),
        (">=", Operator::Ge),
        ("=>", Operator::Ge),
        ("greater than or equal to", Operator::Ge),
        ("more than or equal to", Operator::Ge),
        ("at least", Operator::Ge),
        ("no less than", Operator::Ge),
        ("<", Operator::Lt),
        ("less than", Operator::Lt),
        ("smaller than", Operator::Lt),
        ("lower than", Operator::Lt),
        ("fewer than", Operator::Lt),
        ("below", Operator::Lt),
        ("under", Operator::Lt),
        ("<=", Operator::Le),
        ("=<", Operator::Le),
        ("less than or equal to", Operator::Le),
        ("smaller than or equal to", Operator::Le),
        ("at most", Operator::Le),
        ("no more than", Operator::Le),
        ("=", Operator::Eq),
        ("==", Operator::Eq),
        ("equals", Operator::Eq),
        ("equal to", Operator::Eq),
        ("is", Operator::Eq),
        ("are", Operator::Eq),
        ("!=", Operator::Ne),
        ("<>", Operator::Ne),
        ("not equal to", Operator::Ne),
        ("does not equal", Operator::Ne),
        ("doesnt equal", Operator::Ne),
        ("is not equal to", Operator::Ne),
        ("are not equal to", Operator::Ne),
        ("is not", Operator::Ne),
        ("isnt", Operator::Ne),
        ("are not", Operator::Ne),
        ("arent", Operator::Ne),
        ("contains", Operator::Contains),
        ("contain", Operator::Contains),
        ("containing", Operator::Contains),
        ("includes", Operator::Contains),
        ("including", Operator::Contains),
        ("like", Operator::Contains),
        ("does not contain", Operator::NotContains),
        ("doesnt contain", Operator::NotContains),
        ("do not contain", Operator::NotContains),
        ("dont contain", Operator::NotContains),
        ("not containing", Operator::NotContains),
        ("before", Operator::Before),
        ("earlier than", Operator::Before),
        ("prior to", Operator::Before),
        ("after", Operator::After),
        ("later than", Operator::After),
        ("is empty", Operator::IsEmpty),
        ("is missing", Operator::IsEmpty),
        ("is blank", Operator::IsEmpty),
        ("is null", Operator::IsEmpty),
        ("are empty", Operator::IsEmpty),
        ("are missing", Operator::IsEmpty),
        ("are blank", Operator::IsEmpty),
        ("is not empty", Operator::IsNotEmpty),
        ("is not missing", Operator::IsNotEmpty),
        ("is not blank", Operator::IsNotEmpty),
        ("is not null", Operator::IsNotEmpty),
        ("isnt empty", Operator::IsNotEmpty),
        ("isnt missing", Operator::IsNotEmpty),
        ("are not empty", Operator::IsNotEmpty),
        ("are not missing", Operator::IsNotEmpty),
        ("is present", Operator::IsNotEmpty),
    ];

    let mut phrases: Vec<(Vec<String>, Operator)> = Vec::new();
    for (phrase, op) in base {
        let words: Vec<String> = phrase.split(' ').map(str::to_string).collect();
        let is_word_phrase = words[0].chars().all(char::is_alphabetic);
        let prefixable = is_word_phrase
            && !matches!(words[0].as_str(), "is" | "are" | "isnt" | "arent" | "does" | "doesnt" | "do" | "dont" | "not" | "equals" | "contains" | "includes" | "exceeds");
        if prefixable {
            for copula in ["is", "are"] {
                let mut prefixed = vec![copula.to_string()];
                prefixed.extend(words.iter().cloned());
                phrases.push((prefixed, *op));
            }
        }
        phrases.push((words, *op));
    }
    // Stable sort keeps table order among equal lengths
    phrases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    phrases
}
