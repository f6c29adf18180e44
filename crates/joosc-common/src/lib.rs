//! Shared types used across every stage of the compiler pipeline: source
//! spans, the file set, string interning, diagnostics, and the handful of
//! numeric limits the language imposes.

pub mod diagnostics;
pub mod files;
pub mod interner;
pub mod limits;
pub mod position;
pub mod span;

pub use diagnostics::{Diagnostic, DiagnosticKind, Note};
pub use files::{FileLoadError, FileSet, SourceFile};
pub use interner::{Atom, ConstStringMap, Interner, StringId};
pub use position::{LineMap, Position};
pub use span::{FileId, FileSpan, Span};
