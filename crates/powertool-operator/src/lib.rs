//! PowerTool Kubernetes operator

#![deny(missing_docs)]

/// Command-line interface
pub mod cli;
/// Controller construction and logging of reconcile results
pub mod controller_runner;
/// CRD generation and installation
pub mod crds;
