use crate::error::{ChromError, Result};

/// Volume eluted up to `retention_time` at a constant `flow_rate`.
///
/// Units follow the inputs: minutes × mL/min gives mL.
pub fn elution_volume(retention_time: f64, flow_rate: f64) -> Result<f64> {
    if !(flow_rate.is_finite() && flow_rate > 0.0) {
        return Err(ChromError::parameter(format!(
            "flow_rate must be positive, got {flow_rate}"
        )));
    }
    Ok(retention_time * flow_rate)
}
