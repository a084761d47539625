//! # workshopctl Library
//!
//! This library provides the core functionality for provisioning
//! per-participant copies of multi-branch template repositories against a
//! remote hosting API, and for tearing them down afterwards. It is
//! designed to be used by the `workshopctl` command-line tool but can also
//! be embedded in other applications.
//!
//! ## Quick Example
//!
//! ```
//! use workshopctl::config::Manifest;
//! use workshopctl::roster;
//!
//! let manifest = Manifest::parse(r#"
//! repositories:
//!   demo:
//!     main_branch_dir: demo/main
//!     extra_branch_dirs: [demo/feature-x]
//!     templated_files: [README.md]
//! "#).unwrap();
//! assert_eq!(manifest.repositories.len(), 1);
//!
//! let participants = roster::parse("username,email\nalice,alice@example.com\n");
//! assert_eq!(participants[0].username, "alice");
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: the workshop manifest (template
//!   repositories, their branch directories and templated files) and the
//!   immutably-constructed run `Settings`.
//! - **Remote Host (`remote`)**: the hosting API behind the `RemoteHost`
//!   trait, with a GitHub implementation and error classification that
//!   separates the hard rate limit from secondary throttling.
//! - **Rate Budget (`rate_limit`)**: the shared, mutex-guarded view of the
//!   remaining API call budget, consulted before batches and refreshed
//!   opportunistically.
//! - **Retry (`retry`)**: a combinator wrapping each remote operation with
//!   classified backoff - reset waits for hard limits, capped exponential
//!   for secondary throttling, linear for anything else.
//! - **Materialization (`materialize`, `template`, `git`)**: turning a
//!   branch-partitioned template tree into committed branches with
//!   placeholder substitution, pushed in a single `--all` push.
//! - **Provisioning (`provision`, `batch`)**: the per-item state machine
//!   and the nested bounded batcher that drives it across the
//!   participants × templates cross product.
//! - **Results (`ledger`)**: the append-only succeeded/skipped/failed
//!   record, persisted once per run.
//! - **Teardown (`teardown`)**: convention-based discovery and
//!   confirmation-gated deletion.
//!
//! ## Execution Flow
//!
//! A provisioning run loads the manifest and roster, then the batcher
//! partitions participants into batches, and repositories within each
//! participant into inner batches. Each work item runs the state machine:
//! existence probe (skip if provisioned), create, materialize and push,
//! grant collaborator access, seed issues (dynamic repositories), request
//! a prebuild (best effort). Failures are contained per item; the run
//! aborts only on configuration errors. The ledger is the sole durable
//! output besides the remote side effects.

pub mod batch;
pub mod config;
pub mod error;
pub mod git;
pub mod ledger;
pub mod materialize;
pub mod output;
pub mod provision;
pub mod rate_limit;
pub mod remote;
pub mod retry;
pub mod roster;
pub mod teardown;
pub mod template;
