use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit_log::{AuditLog, AuditLogEntry};
use crate::automation::{low_marks, low_stock, ActionSpec, RuleOutcome, RuleSet};
use crate::command::{ChartKind, CommandParser, ParsedCommand, ScanRequest, Verb};
use crate::config::EngineConfig;
use crate::dataset::{Dataset, TypeTag};
use crate::error::{EngineError, EngineResult};
use crate::execution::{AggregateMetric, ChartPoint, Executor, RowSelection};
use crate::insights::{InsightGenerator, InsightRecord};
use crate::metadata::{inspect, Schema};
use crate::quality::{QualityDetector, QualityFlag, QualityReport};
use crate::query::{serialize_predicate, CompilerExplanation, Predicate, PredicateCompiler};

/// Aggregated series behind a chart command
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub kind: ChartKind,
    pub metric: AggregateMetric,
    pub value_column: Option<String>,
    pub group_column: String,
    pub points: Vec<ChartPoint>,
}

/// Result of one command
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome {
    /// show / filter / sort / remove: a new snapshot.
    /// `rows` are source row indices: the kept rows for show and filter,
    /// the new order for sort and the deleted rows for remove.
    Rows {
        dataset: Dataset,
        predicate: Option<Predicate>,
        rows: Vec<usize>,
    },
    /// highlight: row indices plus any data-quality flags behind them
    Highlight {
        rows: Vec<usize>,
        predicate: Option<Predicate>,
        flags: Vec<QualityFlag>,
    },
    Chart(ChartSeries),
    Insights(Vec<InsightRecord>),
}

impl CommandOutcome {
    pub fn predicate(&self) -> Option<&Predicate> {
        match self {
            CommandOutcome::Rows { predicate, .. } | CommandOutcome::Highlight { predicate, .. } => predicate.as_ref(),
            CommandOutcome::Chart(_) | CommandOutcome::Insights(_) => None,
        }
    }

    /// Rows produced or matched, for logging and the audit trail
    pub fn row_count(&self) -> usize {
        match self {
            CommandOutcome::Rows { rows, .. } | CommandOutcome::Highlight { rows, .. } => rows.len(),
            CommandOutcome::Chart(series) => series.points.iter().map(|p| p.rows).sum(),
            CommandOutcome::Insights(records) => records.first().map_or(0, |r| r.evidence_row_count),
        }
    }
}

/// Main engine interface: command text in, outcome out.
///
/// The engine holds no dataset. Every call receives the current snapshot and
/// derives its schema from it, so a reshaped dataset is always seen fresh.
pub struct SheetEngine {
    config: EngineConfig,
    parser: CommandParser,
    compiler: PredicateCompiler,
    executor: Executor,
    detector: QualityDetector,
    insights: InsightGenerator,
    rules: RuleSet,
    audit: AuditLog,
}

impl SheetEngine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            parser: CommandParser::new(&config),
            compiler: PredicateCompiler::new(&config),
            executor: Executor::new(&config),
            detector: QualityDetector::new(&config),
            insights: InsightGenerator::new(&config),
            rules: RuleSet::new(&config),
            audit: AuditLog::new(config.audit_capacity),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn schema(&self, dataset: &Dataset) -> Schema {
        inspect(dataset, &self.config)
    }

    /// Run one command against `dataset`. Every call is audited, failures included.
    pub fn execute(&mut self, text: &str, dataset: &Dataset) -> EngineResult<CommandOutcome> {
        let parsed = match self.parser.parse(text) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(error = %error, "command rejected");
                self.audit.log_failure(text, None, &error.to_string());
                return Err(error);
            }
        };

        match self.run(&parsed, dataset) {
            Ok(outcome) => {
                info!(
                    verb = %parsed.verb,
                    rows = outcome.row_count(),
                    "command executed"
                );
                self.audit.log_success(
                    text,
                    parsed.verb.as_str(),
                    outcome.predicate().map(serialize_predicate),
                    Some(outcome.row_count()),
                );
                Ok(outcome)
            }
            Err(error) => {
                if error.is_user_error() {
                    warn!(verb = %parsed.verb, error = %error, "command failed");
                } else {
                    tracing::error!(verb = %parsed.verb, error = %error, "internal error while executing command");
                }
                self.audit.log_failure(text, Some(parsed.verb.as_str()), &error.to_string());
                Err(error)
            }
        }
    }

    /// Parse and compile without executing; shows how each column phrase was resolved
    pub fn explain(&self, text: &str, dataset: &Dataset) -> EngineResult<Vec<CompilerExplanation>> {
        let parsed = self.parser.parse(text)?;
        let schema = self.schema(dataset);
        Ok(self.compiler.compile_explained(&parsed, &schema)?.explanations)
    }

    fn run(&self, parsed: &ParsedCommand, dataset: &Dataset) -> EngineResult<CommandOutcome> {
        let schema = self.schema(dataset);

        if let Some(scan) = &parsed.scan {
            return self.run_scan(parsed.verb, scan, dataset, &schema);
        }

        let predicate = self.compiler.compile(parsed, &schema)?;
        let selection = self.executor.select_rows(predicate.as_ref(), dataset)?;

        match parsed.verb {
            Verb::Show | Verb::Filter => Ok(CommandOutcome::Rows {
                dataset: self.executor.select(dataset, &selection)?,
                predicate,
                rows: selection.indices(),
            }),
            Verb::Highlight => Ok(CommandOutcome::Highlight {
                rows: selection.indices(),
                predicate,
                flags: Vec::new(),
            }),
            Verb::Remove => {
                if predicate.is_none() {
                    return Err(EngineError::parse(
                        "remove needs a condition, e.g. 'remove rows where status is closed'",
                        parsed.text.clone(),
                    ));
                }
                Ok(CommandOutcome::Rows {
                    dataset: self.executor.remove(dataset, &selection)?,
                    predicate,
                    rows: selection.indices(),
                })
            }
            Verb::Sort => {
                let spec = parsed
                    .sort
                    .as_ref()
                    .ok_or_else(|| EngineError::internal("sort command without a sort column"))?;
                let column = self.compiler.resolve_column(&spec.column, &schema)?;
                let order = self.executor.sort_order(
                    dataset,
                    &column.name,
                    column.inferred_type,
                    spec.descending,
                    Some(&selection),
                )?;
                Ok(CommandOutcome::Rows {
                    dataset: dataset.take_rows(&order)?,
                    predicate,
                    rows: order,
                })
            }
            Verb::Chart => self.run_chart(parsed, dataset, &schema, predicate.as_ref()),
            Verb::Summarize => {
                let columns = parsed
                    .focus
                    .iter()
                    .map(|phrase| Ok(self.compiler.resolve_column(phrase, &schema)?.name.clone()))
                    .collect::<EngineResult<Vec<String>>>()?;
                Ok(CommandOutcome::Insights(self.insights.generate_for_columns(
                    dataset,
                    &schema,
                    predicate.as_ref(),
                    &columns,
                )?))
            }
        }
    }

    fn run_scan(&self, verb: Verb, scan: &ScanRequest, dataset: &Dataset, schema: &Schema) -> EngineResult<CommandOutcome> {
        let column = match &scan.column {
            Some(phrase) => Some(self.compiler.resolve_column(phrase, schema)?.name.clone()),
            None => None,
        };
        let report = self
            .detector
            .scan_kinds(dataset, schema, &scan.kinds, column.as_deref())?;
        let rows = report.flagged_rows();

        match verb {
            Verb::Highlight => Ok(CommandOutcome::Highlight {
                rows,
                predicate: None,
                flags: report.flags,
            }),
            Verb::Remove => {
                let selection = RowSelection::from_indices(dataset.row_count(), &rows);
                Ok(CommandOutcome::Rows {
                    dataset: self.executor.remove(dataset, &selection)?,
                    predicate: None,
                    rows,
                })
            }
            Verb::Show | Verb::Filter => {
                let selection = RowSelection::from_indices(dataset.row_count(), &rows);
                Ok(CommandOutcome::Rows {
                    dataset: self.executor.select(dataset, &selection)?,
                    predicate: None,
                    rows,
                })
            }
            Verb::Sort | Verb::Chart | Verb::Summarize => Err(EngineError::parse(
                format!("'{}' cannot be combined with a data-quality scan", verb),
                verb.as_str(),
            )),
        }
    }

    fn run_chart(
        &self,
        parsed: &ParsedCommand,
        dataset: &Dataset,
        schema: &Schema,
        predicate: Option<&Predicate>,
    ) -> EngineResult<CommandOutcome> {
        let spec = parsed
            .chart
            .as_ref()
            .ok_or_else(|| EngineError::internal("chart command without a chart spec"))?;
        let group = self.compiler.resolve_column(&spec.group_column, schema)?;
        let value = spec
            .value_column
            .as_deref()
            .map(|phrase| self.compiler.resolve_column(phrase, schema))
            .transpose()?;

        let metric = match (spec.metric, value) {
            (Some(metric), _) => metric,
            (None, Some(column)) if column.inferred_type == TypeTag::Numeric => AggregateMetric::Sum,
            (None, _) => AggregateMetric::Count,
        };
        if let Some(column) = value {
            if metric.needs_numeric() && column.inferred_type != TypeTag::Numeric {
                return Err(EngineError::type_mismatch(&column.name, TypeTag::Numeric.as_str(), metric.as_str()));
            }
        }

        let mut points = self.executor.group_aggregate(
            &group.name,
            value.map(|c| c.name.as_str()),
            metric,
            dataset,
            predicate,
        )?;
        if spec.kind == ChartKind::Line {
            points = self.executor.order_by_category(points, group.inferred_type);
        }
        Ok(CommandOutcome::Chart(ChartSeries {
            kind: spec.kind,
            metric,
            value_column: value.map(|c| c.name.clone()),
            group_column: group.name.clone(),
            points: self.executor.limit_series(spec.kind, points),
        }))
    }

    /// Full data-quality report, optionally with matches of an ad-hoc condition
    /// ("revenue < 0") flagged alongside the fixed scans
    pub fn quality_report(&self, dataset: &Dataset, condition: Option<&str>) -> EngineResult<QualityReport> {
        let schema = self.schema(dataset);
        let predicate = match condition {
            Some(text) => self.compile_condition(text, &schema)?,
            None => None,
        };
        self.detector.scan(dataset, &schema, predicate.as_ref())
    }

    /// Compile a bare condition, with or without a leading verb
    fn compile_condition(&self, text: &str, schema: &Schema) -> EngineResult<Option<Predicate>> {
        let parsed = match self.parser.parse(text) {
            Ok(parsed) => parsed,
            Err(EngineError::Parse { .. }) => self.parser.parse(&format!("show {}", text))?,
            Err(other) => return Err(other),
        };
        self.compiler.compile(&parsed, schema)
    }

    /// Create an automation rule from a condition such as "stock below 10"
    pub fn create_rule(&mut self, name: &str, condition: &str, action: ActionSpec, dataset: &Dataset) -> EngineResult<Uuid> {
        let schema = self.schema(dataset);
        let trigger = self
            .compile_condition(condition, &schema)?
            .ok_or_else(|| EngineError::parse("a rule needs a condition", condition))?;
        self.rules.add(name, trigger, action)
    }

    /// Add the keyword presets that fit this dataset. A preset already
    /// registered with the same name and trigger is skipped; returns the ids
    /// actually added.
    pub fn add_presets(&mut self, dataset: &Dataset) -> Vec<Uuid> {
        let schema = self.schema(dataset);
        let presets = [
            low_marks(&schema, crate::automation::LOW_MARKS_THRESHOLD),
            low_stock(&schema, crate::automation::LOW_STOCK_THRESHOLD),
        ];
        let mut added = Vec::new();
        for rule in presets.into_iter().flatten() {
            if self.rules.contains_equivalent(&rule.name, &rule.trigger) {
                debug!(name = %rule.name, "automation preset already present");
                continue;
            }
            info!(name = %rule.name, "automation preset added");
            added.push(self.rules.insert(rule));
        }
        added
    }

    /// Re-evaluate every active rule; call whenever the dataset changes
    pub fn refresh_rules(&mut self, dataset: &Dataset) -> Vec<RuleOutcome> {
        let schema = self.schema(dataset);
        self.rules.refresh(dataset, &schema)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut RuleSet {
        &mut self.rules
    }

    /// Plain-JSON export of every rule for an external store
    pub fn export_rules(&self) -> EngineResult<Value> {
        self.rules.export()
    }

    /// Load exported rules; stale ones come back deactivated and are reported
    pub fn restore_rules(&mut self, exported: &Value, dataset: &Dataset) -> EngineResult<Vec<EngineError>> {
        let schema = self.schema(dataset);
        self.rules.restore(exported, &schema)
    }

    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.audit.get_entries()
    }

    pub fn help() -> &'static str {
        HELP_TEXT
    }
}

const HELP_TEXT: &str = "\
Commands start with a verb:
  show | filter     show rows where revenue is greater than 1000 and region is west
  highlight         highlight rows where stock is below 10
                    highlight rows with missing values
  sort              sort by revenue descending where region is west
  remove            remove rows where status is closed
                    remove duplicates
  chart             chart average revenue by region
                    pie chart of region
                    line chart of sum of revenue by day
  summarize         summarize where region is west

Operators: =, !=, >, >=, <, <=, equals, is, is not, greater than, less than,
at least, at most, contains, does not contain, before, after, is empty, is not empty

Combining conditions: 'and', 'or' and 'not' are applied strictly left to right.
'and' and 'or' have the SAME precedence, so
  a or b and c   means   (a or b) and c
'not' applies only to the condition right after it.
";
