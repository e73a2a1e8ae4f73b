//! Value layer: classify, compare, and encode JSON-encoded values.
//!
//! A value is a byte slice holding the text of one JSON value, or the empty
//! slice meaning MISSING. Cross-type ordering follows the fixed ladder
//! `MISSING < NULL < BOOLEAN < NUMBER < STRING < ARRAY < OBJECT < UNKNOWN`.
//!
//! Input contract:
//! - callers hand in raw bytes; nothing here assumes prior validation.
//!
//! Output contract:
//! - [`sortkey`] encodings compare bytewise exactly as [`ValComparer`]
//!   compares the source values;
//! - [`vals`] encodings are reversible.

pub mod compare;
pub mod kind;
pub mod sortkey;
pub mod vals;

pub use compare::ValComparer;
pub use kind::{classify, is_true, ValKind};
pub use sortkey::Direction;
