//! # IntelliSheet
//!
//! Plain-language commands over spreadsheet-like datasets.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use intellisheet::{CellValue, CommandOutcome, Dataset, EngineConfig, SheetEngine};
//!
//! let dataset = Dataset::from_rows(
//!     &["region", "revenue"],
//!     vec![
//!         vec!["west".into(), 1200.0.into()],
//!         vec!["east".into(), 800.0.into()],
//!         vec!["west".into(), CellValue::Null],
//!     ],
//! )
//! .unwrap();
//!
//! let mut engine = SheetEngine::new(EngineConfig::default()).unwrap();
//! let outcome = engine
//!     .execute("show rows where revenue is greater than 1000 and region is west", &dataset)
//!     .unwrap();
//!
//! if let CommandOutcome::Rows { rows, .. } = outcome {
//!     println!("matched rows {:?}", rows);
//! }
//! ```
//!
//! ## Pipeline
//!
//! - **Schema inspection**: column types and null counts (`metadata`)
//! - **Parsing**: verb plus clause tokens (`command`)
//! - **Compilation**: typed predicate trees with fuzzy column resolution (`query`)
//! - **Execution**: bitset row selections, aggregates, new snapshots (`execution`)
//! - **Data quality, insights and automation rules** built on the same executor

// Internal modules
pub mod error;
pub mod config;
pub mod dataset;
pub mod metadata;
pub mod command;
pub mod query;
pub mod execution;
pub mod quality;
pub mod insights;
pub mod automation;
pub mod audit_log;
pub mod engine;

// Public API - Main types users need
pub use engine::{ChartSeries, CommandOutcome, SheetEngine};
pub use config::EngineConfig;
pub use dataset::{CellValue, Column, Dataset, TypeTag};
pub use error::{EngineError, EngineResult};
pub use metadata::{inspect, ColumnSchema, Schema};
pub use query::{deserialize_predicate, serialize_predicate, Predicate};
