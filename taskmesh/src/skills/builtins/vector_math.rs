//! Element-wise vector math skill.
//!
//! Request: `op: u8`, `len: u32` little-endian, then two f64 vectors of
//! `len` elements each. Response: one f64 vector of `len` elements.
//! Division by a zero element produces NaN for that element only.

use crate::skills::descriptor::SkillDescriptor;
use crate::skills::handler::{PayloadFactory, SkillHandler};
use crate::skills::skill_ids;
use bytes::Bytes;
use std::sync::Arc;

/// Supported element-wise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl VectorOp {
    fn from_wire(op: u8) -> Option<Self> {
        match op {
            b'+' => Some(VectorOp::Add),
            b'-' => Some(VectorOp::Subtract),
            b'*' => Some(VectorOp::Multiply),
            b'/' => Some(VectorOp::Divide),
            _ => None,
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            VectorOp::Add => b'+',
            VectorOp::Subtract => b'-',
            VectorOp::Multiply => b'*',
            VectorOp::Divide => b'/',
        }
    }

    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            VectorOp::Add => a + b,
            VectorOp::Subtract => a - b,
            VectorOp::Multiply => a * b,
            // Zero divisors yield NaN in that element rather than failing
            // the whole vector.
            VectorOp::Divide => {
                if b != 0.0 {
                    a / b
                } else {
                    f64::NAN
                }
            }
        }
    }
}

/// Handler and factory for the vector math skill.
pub struct VectorMathSkill;

impl VectorMathSkill {
    /// Build a request payload. Returns `None` when the vectors differ in
    /// length or the length does not fit the wire format.
    pub fn encode_request(op: VectorOp, a: &[f64], b: &[f64]) -> Option<Bytes> {
        if a.len() != b.len() || a.len() > u32::MAX as usize {
            return None;
        }
        let mut buf = Vec::with_capacity(5 + a.len() * 16);
        buf.push(op.to_wire());
        buf.extend_from_slice(&(a.len() as u32).to_le_bytes());
        for value in a.iter().chain(b.iter()) {
            buf.extend_from_slice(&value.to_le_bytes());
        }
        Some(Bytes::from(buf))
    }

    /// Decode a response payload into the result vector.
    pub fn decode_response(payload: &[u8]) -> Option<Vec<f64>> {
        if payload.len() % 8 != 0 {
            return None;
        }
        Some(read_f64s(payload, payload.len() / 8))
    }
}

fn read_f64s(bytes: &[u8], count: usize) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .take(count)
        .map(|chunk| {
            f64::from_le_bytes([
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ])
        })
        .collect()
}

impl SkillHandler for VectorMathSkill {
    fn skill_id(&self) -> u32 {
        skill_ids::VECTOR_MATH
    }

    fn name(&self) -> &'static str {
        "vector-math"
    }

    fn process(&self, payload: &[u8]) -> Option<Bytes> {
        if payload.len() < 5 {
            return None;
        }
        let op = VectorOp::from_wire(payload[0])?;
        let len = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]) as usize;
        if payload.len() != 5 + len * 16 {
            return None;
        }

        let values = &payload[5..];
        let a = read_f64s(&values[..len * 8], len);
        let b = read_f64s(&values[len * 8..], len);

        let mut out = Vec::with_capacity(len * 8);
        for (x, y) in a.iter().zip(b.iter()) {
            out.extend_from_slice(&op.apply(*x, *y).to_le_bytes());
        }
        Some(Bytes::from(out))
    }
}

impl PayloadFactory for VectorMathSkill {
    fn skill_id(&self) -> u32 {
        skill_ids::VECTOR_MATH
    }

    fn sample_request(&self, task_id: u32) -> Bytes {
        let base = task_id as f64;
        let a = [base, base + 1.0, base + 2.0, base + 3.0];
        let b = [2.0, 2.0, 2.0, 2.0];
        // Lengths match by construction.
        VectorMathSkill::encode_request(VectorOp::Multiply, &a, &b).unwrap_or_default()
    }
}

/// Registry descriptor for this skill.
pub(super) fn descriptor() -> SkillDescriptor {
    SkillDescriptor::new(
        skill_ids::VECTOR_MATH,
        "vector-math",
        "Element-wise arithmetic on two f64 vectors",
        Arc::new(VectorMathSkill),
        Some(Arc::new(VectorMathSkill)),
    )
    .with_typical_sizes(5 + 4 * 16, 4 * 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(op: VectorOp, a: &[f64], b: &[f64]) -> Vec<f64> {
        let request = VectorMathSkill::encode_request(op, a, b).unwrap();
        let response = VectorMathSkill.process(&request).unwrap();
        VectorMathSkill::decode_response(&response).unwrap()
    }

    #[test]
    fn test_elementwise_operations() {
        assert_eq!(
            run(VectorOp::Add, &[1.0, 2.0], &[10.0, 20.0]),
            vec![11.0, 22.0]
        );
        assert_eq!(
            run(VectorOp::Subtract, &[5.0, 5.0], &[1.0, 2.0]),
            vec![4.0, 3.0]
        );
        assert_eq!(
            run(VectorOp::Multiply, &[3.0, 4.0], &[2.0, 2.0]),
            vec![6.0, 8.0]
        );
        assert_eq!(
            run(VectorOp::Divide, &[9.0, 8.0], &[2.0, 4.0]),
            vec![4.5, 2.0]
        );
    }

    #[test]
    fn test_divide_by_zero_element_is_nan() {
        let values = run(VectorOp::Divide, &[1.0, 6.0, 3.0], &[0.0, 2.0, 0.0]);
        assert!(values[0].is_nan());
        assert_eq!(values[1], 3.0);
        assert!(values[2].is_nan());
    }

    #[test]
    fn test_empty_vectors() {
        assert_eq!(run(VectorOp::Add, &[], &[]), Vec::<f64>::new());
    }

    #[test]
    fn test_mismatched_lengths_rejected_at_encode() {
        assert!(VectorMathSkill::encode_request(VectorOp::Add, &[1.0], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_truncated_request_fails() {
        let request = VectorMathSkill::encode_request(VectorOp::Add, &[1.0, 2.0], &[3.0, 4.0])
            .unwrap();
        assert!(VectorMathSkill.process(&request[..request.len() - 1]).is_none());
        assert!(VectorMathSkill.process(&[]).is_none());
    }

    #[test]
    fn test_length_mismatch_in_header_fails() {
        // Claims 3 elements but carries 2.
        let mut request = VectorMathSkill::encode_request(VectorOp::Add, &[1.0, 2.0], &[3.0, 4.0])
            .unwrap()
            .to_vec();
        request[1..5].copy_from_slice(&3u32.to_le_bytes());
        assert!(VectorMathSkill.process(&request).is_none());
    }

    #[test]
    fn test_sample_request_is_decodable() {
        let request = VectorMathSkill.sample_request(12);
        let response = VectorMathSkill.process(&request).unwrap();
        let values = VectorMathSkill::decode_response(&response).unwrap();
        assert_eq!(values, vec![24.0, 26.0, 28.0, 30.0]);
    }
}
