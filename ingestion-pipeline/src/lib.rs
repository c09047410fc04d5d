#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

//! Ingestion pipeline: queued extraction of text from documents, PII
//! tokenisation and vaulting, entity recognition, skill normalisation,
//! consultant deduplication via identity signatures, and requirement
//! parsing.

pub mod extraction;
pub mod intake;
pub mod mailbox;
pub mod ner;
pub mod pii;
pub mod pipeline;
pub mod requirement;
pub mod resolve;
pub mod skills;

pub use intake::{IngestionService, RequirementIntakeOutcome, ResumeIntakeOutcome, ResumeUpload};
pub use pipeline::{
    RequirementIngestionPipeline, RequirementJobPayload, ResumeIngestionPipeline, ResumeJobPayload,
};
