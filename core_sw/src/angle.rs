//! Canonical heading math
//!
//! Every heading stored or passed between components lives in `[0, 2π)`. Raw encoder
//! readings enter through [`normalize`]; angles produced by arithmetic (kinematics, `+ π`
//! flips) re-enter through [`wrap_angle`].

use crate::error::SensorFault;
use core::f32::consts::{PI, TAU};

/// Bring any finite angle into `[0, 2π)` through an explicit modulo
///
/// Non-finite input is returned unchanged; callers that may see one should check first.
pub fn wrap_angle(angle: f32) -> f32 {
    let mut wrapped = libm::fmodf(angle, TAU);
    if wrapped < 0.0 {
        wrapped += TAU;
    }
    // f32 rounding can land a tiny negative remainder exactly on 2π
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Signed shortest distance on the circle from `from` to `to`, in `(-π, π]`
///
/// Commanding from 0.1 rad to 6.2 rad is a move of about -0.18 rad, not +6.1.
pub fn shortest_delta(from: f32, to: f32) -> f32 {
    let delta = wrap_angle(to - from);
    if delta > PI {
        delta - TAU
    } else {
        delta
    }
}

fn in_domain(angle: f32) -> bool {
    (0.0..TAU).contains(&angle)
}

/// Convert a raw absolute-encoder angle into a calibrated heading in `[0, 2π)`
///
/// # Arguments
///
/// - raw: the reading as reported by the encoder, expected in `[0, 2π)`
/// - offset: the raw reading when the wheel points forwards, in `[0, 2π)`
/// - reversed: whether the encoder counts clockwise; fixed by the module's calibration
///
/// # Returns
///
/// The heading, or a [`SensorFault`] when the reading must not be used. An out-of-domain
/// reading still carries its wrapped value in [`SensorFault::OutOfDomain`].
pub fn normalize(raw: f32, offset: f32, reversed: bool) -> Result<f32, SensorFault> {
    if !raw.is_finite() {
        return Err(SensorFault::NotFinite);
    }

    if !in_domain(raw) {
        let measured = if reversed { -raw } else { raw };
        return Err(SensorFault::OutOfDomain {
            raw,
            wrapped: wrap_angle(measured - offset),
        });
    }

    // mirror inside the domain so that a single wraparound still suffices
    let measured = if reversed && raw != 0.0 {
        TAU - raw
    } else {
        raw
    };
    let mut heading = measured - offset;
    if heading < 0.0 {
        heading += TAU;
    }
    if heading >= TAU {
        heading -= TAU;
    }
    Ok(heading)
}
