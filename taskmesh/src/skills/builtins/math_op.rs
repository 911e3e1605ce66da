//! Scalar math skill.
//!
//! Request: 17 bytes, `op: u8` followed by two little-endian f64 operands.
//! Response: 9 bytes, the little-endian f64 result followed by an
//! `overflow: u8` flag. Divide-by-zero reports NaN with the flag set; the
//! other operations set it when the result is infinite.

use crate::skills::descriptor::SkillDescriptor;
use crate::skills::handler::{PayloadFactory, SkillHandler};
use crate::skills::skill_ids;
use bytes::Bytes;
use std::sync::Arc;

const REQUEST_SIZE: usize = 1 + 8 + 8;
const RESPONSE_SIZE: usize = 8 + 1;

/// Supported scalar operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl MathOp {
    fn from_wire(op: u8) -> Option<Self> {
        match op {
            b'+' => Some(MathOp::Add),
            b'-' => Some(MathOp::Subtract),
            b'*' => Some(MathOp::Multiply),
            b'/' => Some(MathOp::Divide),
            _ => None,
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            MathOp::Add => b'+',
            MathOp::Subtract => b'-',
            MathOp::Multiply => b'*',
            MathOp::Divide => b'/',
        }
    }

    /// Apply the operation, returning `(result, overflow)`.
    fn apply(self, a: f64, b: f64) -> (f64, bool) {
        match self {
            MathOp::Add => {
                let result = a + b;
                (result, result.is_infinite())
            }
            MathOp::Subtract => {
                let result = a - b;
                (result, result.is_infinite())
            }
            MathOp::Multiply => {
                let result = a * b;
                (result, result.is_infinite())
            }
            MathOp::Divide => {
                if b == 0.0 {
                    (f64::NAN, true)
                } else {
                    let result = a / b;
                    (result, result.is_infinite())
                }
            }
        }
    }
}

/// Handler and factory for the scalar math skill.
pub struct MathOpSkill;

impl MathOpSkill {
    /// Build a request payload for the given operation and operands.
    pub fn encode_request(op: MathOp, a: f64, b: f64) -> Bytes {
        let mut buf = Vec::with_capacity(REQUEST_SIZE);
        buf.push(op.to_wire());
        buf.extend_from_slice(&a.to_le_bytes());
        buf.extend_from_slice(&b.to_le_bytes());
        Bytes::from(buf)
    }

    /// Decode a response payload into `(result, overflow)`.
    pub fn decode_response(payload: &[u8]) -> Option<(f64, bool)> {
        if payload.len() != RESPONSE_SIZE {
            return None;
        }
        let raw: [u8; 8] = payload[..8].try_into().ok()?;
        Some((f64::from_le_bytes(raw), payload[8] != 0))
    }
}

impl SkillHandler for MathOpSkill {
    fn skill_id(&self) -> u32 {
        skill_ids::MATH_OP
    }

    fn name(&self) -> &'static str {
        "math-op"
    }

    fn process(&self, payload: &[u8]) -> Option<Bytes> {
        if payload.len() != REQUEST_SIZE {
            return None;
        }
        let op = MathOp::from_wire(payload[0])?;
        let a = f64::from_le_bytes([
            payload[1], payload[2], payload[3], payload[4], payload[5], payload[6], payload[7],
            payload[8],
        ]);
        let b = f64::from_le_bytes([
            payload[9], payload[10], payload[11], payload[12], payload[13], payload[14],
            payload[15], payload[16],
        ]);

        let (result, overflow) = op.apply(a, b);
        let mut out = Vec::with_capacity(RESPONSE_SIZE);
        out.extend_from_slice(&result.to_le_bytes());
        out.push(overflow as u8);
        Some(Bytes::from(out))
    }
}

impl PayloadFactory for MathOpSkill {
    fn skill_id(&self) -> u32 {
        skill_ids::MATH_OP
    }

    fn sample_request(&self, task_id: u32) -> Bytes {
        let ops = [MathOp::Add, MathOp::Subtract, MathOp::Multiply, MathOp::Divide];
        let op = ops[(task_id % 4) as usize];
        Self::encode_request(op, task_id as f64, 2.0)
    }
}

/// Registry descriptor for this skill.
pub(super) fn descriptor() -> SkillDescriptor {
    SkillDescriptor::new(
        skill_ids::MATH_OP,
        "math-op",
        "Scalar arithmetic on two f64 operands",
        Arc::new(MathOpSkill),
        Some(Arc::new(MathOpSkill)),
    )
    .with_typical_sizes(REQUEST_SIZE, RESPONSE_SIZE)
}
