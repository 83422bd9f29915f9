//! Storygen is a procedural text-generation engine.
//!
//! A grammar is a dictionary of named symbols, each bound to one or more
//! textual expansion rules. Expanding a piece of text recursively replaces
//! `{symbol}` references (optionally filtered by a `#regex#` literal and
//! post-processed by `.modifier` chains) and evaluates `[key:rule,...]`
//! actions that mutate the symbol table mid-expansion, until no tags
//! remain.
//!
//! # Example
//!
//! ```rust
//! use storygen::GrammarBuilder;
//!
//! let mut grammar = GrammarBuilder::new()
//!     .symbol("origin", &["Hello {subject}"])
//!     .symbol("subject", &["world", "Rust"])
//!     .build();
//!
//! let text = grammar.flatten().unwrap();
//! assert!(text == "Hello world" || text == "Hello Rust");
//! ```
//!
//! Grammars can also be loaded from JSON, where each key maps to an array
//! of rule texts:
//!
//! ```rust
//! use storygen::Grammar;
//!
//! let json = r#"{ "origin": ["{color.capitalize} skies"],
//!                 "color": ["violet"] }"#;
//!
//! let mut grammar = Grammar::from_json(json).unwrap();
//! assert_eq!(grammar.flatten().unwrap(), "Violet skies");
//! ```

pub mod grammar;
pub mod modifiers;
pub mod symbol;
pub mod utils;

pub use grammar::{Grammar, GrammarBuilder, GrammarConfig, ORIGIN_KEY};
pub use modifiers::Modifier;
pub use symbol::{Rule, Symbol};
pub use utils::{GrammarError, Result};
