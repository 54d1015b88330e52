//! Domain types and DTOs
//!
//! Projects, trade assignments, questions, answers and line-item lists (LV)
//! as they flow through the specification pipeline and the Fact Store.

pub mod lv;
pub mod project;
pub mod question;
pub mod trade;

// Re-export commonly used types
pub use lv::*;
pub use project::*;
pub use question::*;
pub use trade::*;
