//! # xmlpp: a macro preprocessor for XML documents.
//!
//! This crate transforms XML documents driven by processing instruction directives
//!     in the style of the C preprocessor:
//!
//! ```xml
//! <Product>
//!   <?define Version = 1.2?>
//!   <?if $(sys.BUILDARCH) = x64?>
//!     <Folder Name="Program Files (x64)"/>
//!   <?else?>
//!     <Folder Name="Program Files"/>
//!   <?endif?>
//!   <?foreach Lang in en;fr?>
//!     <Resource Lang="$(var.Lang)" Version="$(var.Version)"/>
//!   <?endforeach?>
//!   <?include common.xml?>
//! </Product>
//! ```
//!
//! The supported directives are `if`, `ifdef`, `ifndef`, `elseif`, `else`, `endif`,
//!     `define`, `undef`, `include`, `foreach`, `endforeach`, `pragma`, `error` and `warning`.
//! Text and attribute values may contain `$(prefix.name)` variable references
//!     and `$(prefix.name(args))` function calls; `$$` is a literal dollar sign.
//! See the [variable] module for the available prefixes.
//!
//! The entry point is the [Preprocessor]:
//!
//! ```
//! let mut preprocessor = xmlpp::Preprocessor::default();
//! let output = preprocessor
//!     .process_str("input.xml", "<a><?define X = 1?>$(var.X)</a>")
//!     .unwrap();
//! assert_eq!(output, "<a>1</a>");
//! ```

pub mod conditional;
pub mod directive;
pub mod error;
pub mod expression;
pub mod extension;
pub mod foreach;
pub mod include;
pub mod node;
pub mod observer;
mod preprocessor;
pub mod substitute;
pub mod testing;
pub mod time;
pub mod variable;

pub use error::{Error, Result};
pub use extension::Extension;
pub use observer::{IfDefEvent, Observer, Warning};
pub use preprocessor::{Options, Preprocessor};
pub use variable::Platform;
