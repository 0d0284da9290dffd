use crate::error::{AssignmentError, Result};

/// A directed edge with BPR volume-delay parameters and its aggregate flow.
///
/// `beta` is an integer exponent, so the powers below use `powi`.
#[derive(Debug, Clone)]
pub struct Link {
    pub link_id: usize,
    pub t0: f64,
    pub alfa: f64,
    pub beta: i32,
    pub capacity: f64,
    pub from_node: u32,
    pub to_node: u32,
}

impl Link {
    pub fn new(
        link_id: usize,
        t0: f64,
        alfa: f64,
        beta: i32,
        capacity: f64,
        from_node: u32,
        to_node: u32,
    ) -> Result<Self> {
        let invalid = |name: &'static str, value: f64| AssignmentError::InvalidLinkParameter {
            link_id,
            name,
            value,
        };

        if !t0.is_finite() || t0 < 0.0 {
            return Err(invalid("t0", t0));
        }
        if !alfa.is_finite() || alfa < 0.0 {
            return Err(invalid("alfa", alfa));
        }
        if beta < 1 {
            return Err(invalid("beta", beta as f64));
        }
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(invalid("capacity", capacity));
        }

        Ok(Self {
            link_id,
            t0,
            alfa,
            beta,
            capacity,
            from_node,
            to_node,
        })
    }

    /// BPR travel time `t0 * (1 + alfa * (flow/capacity)^beta)`.
    pub fn travel_time(&self, flow: f64) -> f64 {
        self.t0 * (1.0 + self.alfa * (flow / self.capacity).powi(self.beta))
    }

    /// Derivative of the travel time with respect to flow.
    ///
    /// Zero at `flow = 0` whenever `beta > 1` (0^0 = 1 keeps the
    /// `beta = 1` case exact).
    pub fn travel_time_derivative(&self, flow: f64) -> f64 {
        self.alfa * self.t0 * f64::from(self.beta) * flow.powi(self.beta - 1)
            / self.capacity.powi(self.beta)
    }

    /// Contribution of this link to the Beckmann objective:
    /// the travel-time integral from zero to `flow`.
    pub fn objective_term(&self, flow: f64) -> f64 {
        self.t0 * flow * self.alfa * (flow / self.capacity).powi(self.beta)
            / f64::from(self.beta + 1)
            + self.t0 * flow
    }
}
