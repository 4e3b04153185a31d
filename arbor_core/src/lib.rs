//! `arbor_core` is the engine behind [arbor](https://github.com/arbor-template/arbor),
//! a small text template engine with two interchangeable surface dialects.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Template source file
//!   → Tokenizer (dialect-specific lexer, shared token stream)
//!   → Builder (matches open/close tags, parses comparisons eagerly)
//!   → Node tree (arena of text, variable, section, and condition nodes)
//!   → Variable injection (set_value / set_value_at, dynamic scope chain)
//!   → Render (depth-first concatenation, loose typed comparisons)
//! ```
//!
//! Parsed trees are cached next to their sources as versioned JSON
//! snapshots, keyed off the source modification time, with an optional
//! pluggable [`CacheStore`] consulted first.
//!
//! ## Dialects
//!
//! | construct | classic | handlebars |
//! |---|---|---|
//! | variable | `{name}` | `{{name}}` |
//! | condition | `[if status == "active"]…[/if]` | `{{#if status == "active"}}…{{/if}}` |
//! | section | `[section footer]…[/section]` | `{{#section footer}}…{{/section}}` |
//!
//! Both dialects feed the same builder, tree, and engine; a dialect is
//! picked per factory call, not baked into the types.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arbor_core::TemplateOptions;
//!
//! let options = TemplateOptions::default();
//! let mut template = arbor_core::create("greeting.tpl", &options).unwrap();
//! template.set_value("name", "Ada");
//! println!("{}", template.render().unwrap());
//! ```

pub use cache::*;
pub use config::*;
pub use error::*;
pub use factory::*;
pub use position::*;
pub use tokens::*;
pub use tree::*;

mod cache;
pub mod config;
mod engine;
mod error;
mod factory;
pub(crate) mod lexer;
mod parser;
mod position;
mod tokens;
mod tree;

#[cfg(test)]
mod __fixtures;
