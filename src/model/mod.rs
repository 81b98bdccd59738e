//! Core data types for targets, findings, and per-target outcomes.
//!
//! - [`Target`] - A normalized URL submitted for analysis
//! - [`Finding`] - One detected technology
//! - [`Visit`] - One hop of the visited-URL trail
//! - [`Analysis`] - Everything an analyzer reported for one target
//! - [`Outcome`] - The success or failure of analyzing one target
//!
//! # Example
//!
//! ```
//! use techsweep::{Analysis, Finding, Outcome, Target};
//!
//! let target = Target::parse("example.com").unwrap();
//! let finding = Finding::new("jQuery", Some("3.5.1"), target.clone());
//! let outcome = Outcome::success(target, Analysis::new(vec![finding]));
//!
//! assert!(outcome.is_success());
//! ```

mod finding;
mod target;

pub use finding::*;
pub use target::*;
