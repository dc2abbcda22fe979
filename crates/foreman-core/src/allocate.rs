//! Splitting one producer's output among the links that want it.
//!
//! Allocation is a two-tier weighted water-fill. Tier 1 serves driven
//! demand (and greedy consumers); tier 2 serves passive demand from what is
//! left. Within a tier each claim receives `min(claim, level * weight)` for
//! the single `level` that exhausts the supply, so shares are proportional
//! to weight among everyone who cannot be fully served.

/// One consumer link's request on a shared output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Claim {
    /// Demand that scales upstream production. Always finite.
    pub driven: f64,
    /// Opportunistic demand on top of `driven`. May be infinite.
    pub passive: f64,
    /// Compete for `passive` in the first tier instead of the second.
    pub greedy: bool,
    /// Relative share; must be positive.
    pub weight: f64,
}

impl Claim {
    fn first_tier(&self) -> f64 {
        if self.greedy {
            self.driven + self.passive
        } else {
            self.driven
        }
    }

    fn second_tier(&self) -> f64 {
        if self.greedy { 0.0 } else { self.passive }
    }
}

/// Divide `supply` among `claims`. The result is index-aligned with
/// `claims`, never exceeds any claim, and never sums above `supply`.
pub fn allocate(supply: f64, claims: &[Claim]) -> Vec<f64> {
    let weights: Vec<f64> = claims.iter().map(|c| c.weight.max(f64::MIN_POSITIVE)).collect();

    let first: Vec<f64> = claims.iter().map(Claim::first_tier).collect();
    let (mut out, left) = water_fill(supply.max(0.0), &first, &weights);

    let second: Vec<f64> = claims.iter().map(Claim::second_tier).collect();
    let (extra, _) = water_fill(left, &second, &weights);
    for (o, e) in out.iter_mut().zip(extra) {
        *o += e;
    }
    out
}

/// Weighted max-min fair split. Returns the allocations and what is left.
fn water_fill(supply: f64, demands: &[f64], weights: &[f64]) -> (Vec<f64>, f64) {
    let mut out = vec![0.0; demands.len()];
    let mut active: Vec<usize> = (0..demands.len()).filter(|&i| demands[i] > 0.0).collect();
    if active.is_empty() || supply <= 0.0 {
        return (out, supply.max(0.0));
    }

    active.sort_by(|&a, &b| {
        let ra = demands[a] / weights[a];
        let rb = demands[b] / weights[b];
        ra.total_cmp(&rb).then(a.cmp(&b))
    });

    let mut remaining = supply;
    let mut weight_left: f64 = active.iter().map(|&i| weights[i]).sum();
    for (pos, &i) in active.iter().enumerate() {
        let fair = remaining * weights[i] / weight_left;
        if demands[i] <= fair {
            out[i] = demands[i];
            remaining -= demands[i];
            weight_left -= weights[i];
            continue;
        }
        // Everyone from here on wants more than an equal-level share.
        for &j in &active[pos..] {
            out[j] = remaining * weights[j] / weight_left;
        }
        return (out, 0.0);
    }
    (out, remaining.max(0.0))
}
