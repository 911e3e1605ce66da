//! Skill registry and built-in skills.
//!
//! A skill is a named, versioned handler identified by a `skill_id`. The
//! worker dispatches incoming tasks through the process-wide
//! [`SkillRegistry`]; the manager uses the registered payload factories to
//! build request payloads. Payload encodings are private to each skill -
//! the core only ever sees opaque bytes.
//!
//! Registration must complete before the first accept or outbound connect:
//! call [`register_builtin_skills`] (plus any application skills) during
//! startup. Registration is idempotent by id; the last registration wins
//! and replacements are logged.

pub mod builtins;
mod descriptor;
mod handler;
mod registry;

pub use builtins::register_builtin_skills;
pub use descriptor::SkillDescriptor;
pub use handler::{PayloadFactory, SkillHandler};
pub use registry::{DispatchError, SkillRegistry};

/// Well-known ids for the built-in skills.
///
/// Kept in one place so manager and worker agree; add new ids here when
/// implementing new handlers.
pub mod skill_ids {
    /// Reverses the request payload as a byte string.
    pub const STRING_REVERSE: u32 = 1;
    /// Scalar arithmetic on two f64 operands.
    pub const MATH_OP: u32 = 2;
    /// Element-wise arithmetic on two f64 vectors.
    pub const VECTOR_MATH: u32 = 3;
    /// Element-wise fused multiply-add over three f64 vectors.
    pub const FUSED_MULTIPLY_ADD: u32 = 4;

    /// Total number of built-in skills.
    pub const BUILTIN_COUNT: u32 = 4;
}
