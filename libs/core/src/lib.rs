//! Glimpse Core - Value canonicalization
//!
//! Turns in-memory values into canonical, type-tagged trees ready to be
//! shipped to a viewer.
//!
//! # Example
//!
//! ```
//! use glimpse_core::{canonicalize, Inspect, Kind};
//!
//! #[derive(Inspect)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! let node = canonicalize(&Point { x: 1, y: 2 });
//! assert_eq!(node.kind(), Some(&Kind::Record("Point".into())));
//! ```

// Allow the derive macro to refer to this crate as ::glimpse_core from inside it
extern crate self as glimpse_core;

pub mod canonical;
pub mod envelope;
pub mod error;
pub mod inspect;
pub mod node;
pub mod value;

// Re-exports for convenience
pub use canonical::{canonicalize, canonicalize_value};
pub use envelope::{ContainerValue, DumpContainer};
pub use error::{Error, Result};
pub use inspect::{snapshot, Inspect};
pub use node::{Fields, Kind, Node, Primitive, Tagged};
pub use value::{type_name_of, Token, Value};

#[doc(inline)]
pub use glimpse_core_derive::Inspect;
