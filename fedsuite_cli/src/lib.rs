//! fedsuite harness - presets, run monitoring and export on top of the core.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐    apply     ┌──────────────────────┐
//! │  SuitePreset  │ ───────────► │   fedsuite_core::    │
//! └───────────────┘              │        Store         │
//!                                └──────────┬───────────┘
//!                                           │ export
//!                   ┌───────────────────────┼────────────────────┐
//!                   ▼                                            ▼
//!          ┌────────────────┐                         ┌────────────────────┐
//!          │    exporter    │                         │     RunMonitor     │
//!          │  (suite JSON)  │                         │ submit + poll loop │
//!          └────────────────┘                         └─────────┬──────────┘
//!                                                               ▼
//!                                                 impl SimulationRunner
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use fedsuite_cli::{SuitePreset, PresetOptions, RunMonitor, MonitorConfig};
//! use fedsuite_core::Store;
//! use fedsuite_env::LocalRunner;
//!
//! let mut store = Store::new();
//! let name = SuitePreset::Stragglers.apply(&mut store, &PresetOptions::default())?;
//!
//! let mut monitor = RunMonitor::new(LocalRunner::new(), MonitorConfig::default());
//! let report = monitor.run(&store.export_test(&name)?).await?;
//! ```

mod error;
pub mod exporter;
pub mod monitor;
pub mod presets;

pub use error::CliError;
pub use exporter::{suite_json, write_suite, SuiteSummary, TestSummary};
pub use monitor::{MonitorConfig, RunMonitor, RunReport};
pub use presets::{PresetOptions, SuitePreset};
