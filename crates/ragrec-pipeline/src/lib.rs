//! Batch flows for ragrec.
//!
//! Two independent pipelines that share nothing but the persisted index:
//!
//! - [`Ingestor`]: source table → chunks → embeddings → index → artifacts
//! - [`Evaluator`]: question table → recommendations → generator → result table

pub mod evaluate;
pub mod ingest;
pub mod table;

#[cfg(test)]
mod testing;

pub use evaluate::{Evaluator, NO_ANSWER, NO_CONTEXT, PromptTemplate};
pub use ingest::{IngestConfig, IngestReport, Ingestor};
pub use table::{EvalRow, SourceRow, read_questions, read_sources, write_eval_rows};
