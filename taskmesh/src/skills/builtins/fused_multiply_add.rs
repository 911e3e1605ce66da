//! Fused multiply-add skill.
//!
//! Request: `len: u32` little-endian, then three f64 vectors `a`, `b`, `c`
//! of `len` elements each. Response: one f64 vector where each element is
//! `a[i] * b[i] + c[i]`, computed with a single rounding.

use crate::skills::descriptor::SkillDescriptor;
use crate::skills::handler::{PayloadFactory, SkillHandler};
use crate::skills::skill_ids;
use bytes::Bytes;
use std::sync::Arc;

/// Handler and factory for the fused multiply-add skill.
pub struct FusedMultiplyAddSkill;

impl FusedMultiplyAddSkill {
    /// Build a request payload. Returns `None` when the vectors differ in
    /// length or the length does not fit the wire format.
    pub fn encode_request(a: &[f64], b: &[f64], c: &[f64]) -> Option<Bytes> {
        if a.len() != b.len() || b.len() != c.len() || a.len() > u32::MAX as usize {
            return None;
        }
        let mut buf = Vec::with_capacity(4 + a.len() * 24);
        buf.extend_from_slice(&(a.len() as u32).to_le_bytes());
        for value in a.iter().chain(b.iter()).chain(c.iter()) {
            buf.extend_from_slice(&value.to_le_bytes());
        }
        Some(Bytes::from(buf))
    }

    /// Decode a response payload into the result vector.
    pub fn decode_response(payload: &[u8]) -> Option<Vec<f64>> {
        if payload.len() % 8 != 0 {
            return None;
        }
        Some(
            payload
                .chunks_exact(8)
                .map(|chunk| {
                    f64::from_le_bytes([
                        chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6],
                        chunk[7],
                    ])
                })
                .collect(),
        )
    }
}

impl SkillHandler for FusedMultiplyAddSkill {
    fn skill_id(&self) -> u32 {
        skill_ids::FUSED_MULTIPLY_ADD
    }

    fn name(&self) -> &'static str {
        "fused-multiply-add"
    }

    fn process(&self, payload: &[u8]) -> Option<Bytes> {
        if payload.len() < 4 {
            return None;
        }
        let len = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
        if payload.len() != 4 + len * 24 {
            return None;
        }

        let values = &payload[4..];
        let element = |index: usize| {
            let offset = index * 8;
            f64::from_le_bytes([
                values[offset],
                values[offset + 1],
                values[offset + 2],
                values[offset + 3],
                values[offset + 4],
                values[offset + 5],
                values[offset + 6],
                values[offset + 7],
            ])
        };

        let mut out = Vec::with_capacity(len * 8);
        for i in 0..len {
            let a = element(i);
            let b = element(len + i);
            let c = element(2 * len + i);
            out.extend_from_slice(&a.mul_add(b, c).to_le_bytes());
        }
        Some(Bytes::from(out))
    }
}

impl PayloadFactory for FusedMultiplyAddSkill {
    fn skill_id(&self) -> u32 {
        skill_ids::FUSED_MULTIPLY_ADD
    }

    fn sample_request(&self, task_id: u32) -> Bytes {
        let base = task_id as f64;
        let a = [base, base, base, base];
        let b = [1.0, 2.0, 3.0, 4.0];
        let c = [0.5, 0.5, 0.5, 0.5];
        FusedMultiplyAddSkill::encode_request(&a, &b, &c).unwrap_or_default()
    }
}

/// Registry descriptor for this skill.
pub(super) fn descriptor() -> SkillDescriptor {
    SkillDescriptor::new(
        skill_ids::FUSED_MULTIPLY_ADD,
        "fused-multiply-add",
        "Element-wise a*b+c over three f64 vectors",
        Arc::new(FusedMultiplyAddSkill),
        Some(Arc::new(FusedMultiplyAddSkill)),
    )
    .with_typical_sizes(4 + 4 * 24, 4 * 8)
}
