//! Built-in skills shipped with TaskMesh.
//!
//! Each skill module is self-contained: payload encoding, worker-side
//! handler, manager-side payload factory, and a `descriptor()` constructor.
//! Payload encodings are raw little-endian structures private to the skill;
//! the core never interprets them.

mod fused_multiply_add;
mod math_op;
mod string_reverse;
mod vector_math;

pub use fused_multiply_add::FusedMultiplyAddSkill;
pub use math_op::{MathOp, MathOpSkill};
pub use string_reverse::StringReverseSkill;
pub use vector_math::{VectorMathSkill, VectorOp};

use super::registry::SkillRegistry;

/// Register every built-in skill with the process-wide registry.
///
/// Must run before the first accept or outbound connect. Safe to call more
/// than once: registration is idempotent by skill id.
pub fn register_builtin_skills() {
    let registry = SkillRegistry::global();
    registry.register(string_reverse::descriptor());
    registry.register(math_op::descriptor());
    registry.register(vector_math::descriptor());
    registry.register(fused_multiply_add::descriptor());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::skill_ids;

    #[test]
    fn test_register_builtin_skills() {
        register_builtin_skills();
        let registry = SkillRegistry::global();
        for id in [
            skill_ids::STRING_REVERSE,
            skill_ids::MATH_OP,
            skill_ids::VECTOR_MATH,
            skill_ids::FUSED_MULTIPLY_ADD,
        ] {
            assert!(registry.has_skill(id), "skill {id} not registered");
            assert!(registry.payload_factory(id).is_some());
        }
        // Idempotent.
        register_builtin_skills();
        assert!(registry.skill_count() >= skill_ids::BUILTIN_COUNT as usize);
    }
}
