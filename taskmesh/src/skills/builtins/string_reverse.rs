//! String reversal skill.
//!
//! Request: the raw byte string. Response: the same bytes reversed. Doubles
//! as the echo-style workload for end-to-end testing, since the response is
//! a pure function of the request with the same length.

use crate::skills::descriptor::SkillDescriptor;
use crate::skills::handler::{PayloadFactory, SkillHandler};
use crate::skills::skill_ids;
use bytes::Bytes;
use std::sync::Arc;

/// Handler and factory for the string reversal skill.
pub struct StringReverseSkill;

impl SkillHandler for StringReverseSkill {
    fn skill_id(&self) -> u32 {
        skill_ids::STRING_REVERSE
    }

    fn name(&self) -> &'static str {
        "string-reverse"
    }

    fn process(&self, payload: &[u8]) -> Option<Bytes> {
        let mut reversed = payload.to_vec();
        reversed.reverse();
        Some(Bytes::from(reversed))
    }
}

impl PayloadFactory for StringReverseSkill {
    fn skill_id(&self) -> u32 {
        skill_ids::STRING_REVERSE
    }

    fn sample_request(&self, task_id: u32) -> Bytes {
        Bytes::from(format!("task data {task_id}"))
    }
}

/// Registry descriptor for this skill.
pub(super) fn descriptor() -> SkillDescriptor {
    SkillDescriptor::new(
        skill_ids::STRING_REVERSE,
        "string-reverse",
        "Reverses the request bytes",
        Arc::new(StringReverseSkill),
        Some(Arc::new(StringReverseSkill)),
    )
}
