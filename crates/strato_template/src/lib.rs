//! # strato_template
//!
//! Generic `${namespace:path[:default]}` placeholder resolution for strato
//! descriptors.
//!
//! The engine is stateless aside from an explicit [`ExtensionRegistry`] and
//! a request-scoped [`DataBag`]; extensions are resolver functions for one
//! namespace each. Resolution is a single left-to-right pass and never
//! recurses into substituted values.
//!
//! # Built-in namespaces
//!
//! - `env` — process environment variables
//! - `git` — repository metadata (root, commit short/full, branch raw/clean)
//! - `date` — current UTC time in several formats
//! - `project` — git-aware project root
//!
//! The `secret`, `resource`, `dependency` and `auth` namespaces are
//! implemented by the crates owning their backing state (`strato_secrets`,
//! `strato_compute`, `strato_stack`) and registered into the same registry.
//!
//! # Example
//!
//! ```rust
//! use strato_template::{resolve, register_builtins, DataBag, ExtensionRegistry};
//!
//! let mut registry = ExtensionRegistry::new();
//! register_builtins(&mut registry);
//!
//! std::env::set_var("REGION", "eu-west-1");
//! let out = resolve("region=${env:REGION}", &DataBag::new(), &registry).unwrap();
//! assert_eq!(out, "region=eu-west-1");
//! ```

pub mod builtins;
pub mod engine;
pub mod error;
pub mod registry;
pub mod token;

pub use builtins::{register_builtins, DateExtension, EnvExtension, GitExtension, ProjectExtension};
pub use engine::resolve;
pub use error::{TemplateError, TemplateResult};
pub use registry::{bag_keys, bag_str, DataBag, Extension, ExtensionRegistry};
pub use token::Token;
