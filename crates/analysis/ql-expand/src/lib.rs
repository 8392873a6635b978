//! Macro expansion for the front end
//!
//! This crate turns `(macro name (params ...) template)` forms into macro
//! symbols and expands calls to them. Expansion is hygienic: every template
//! atom that is not a parameter is renamed with a fresh mark, and the mark
//! is bound in the [`Resolver`](ql_resolve::Resolver) to the definition-site
//! scope. Expanded nodes carry an expansion source so diagnostics can report
//! the chain of calls that produced them.
//!
//! Settings come from [`FrontendConfig`], which is read from TOML.

pub mod config;
pub mod error;
pub mod expand;

pub use config::{DiagnosticsConfig, ExpansionConfig, FrontendConfig};
pub use error::ExpandError;
pub use expand::{MACRO_FORM, MacroDef, MacroExpander};
