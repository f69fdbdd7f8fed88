//! Checklist loading, validation and meeting-type overrides.
//!
//! Checklists are structured data loaded from YAML or JSON. The raw document
//! is validated before deserialization so schema errors name the offending
//! field and element.

mod overrides;
mod parser;
mod schema;
mod source;

pub use overrides::{EffectiveChecklist, ElementOverride, MeetingTypeOverride};
pub use parser::{Checklist, ChecklistError, Element, INLINE_ORIGIN};
pub use source::{builtin_checklist, builtin_ids, is_file_reference, resolve_checklist};
