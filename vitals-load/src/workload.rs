use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Ingest,
    Query,
}

/// Workload profiles controlling the mix of operations the workers issue.
///
/// | Profile     | POST % | GET % |
/// |-------------|--------|-------|
/// | IngestHeavy |   90   |  10   |
/// | Balanced    |   50   |  50   |
/// | QueryHeavy  |   10   |  90   |
/// | IngestOnly  |  100   |   0   |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadProfile {
    IngestHeavy,
    Balanced,
    QueryHeavy,
    IngestOnly,
}

impl WorkloadProfile {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ingest-heavy" => Some(WorkloadProfile::IngestHeavy),
            "balanced" => Some(WorkloadProfile::Balanced),
            "query-heavy" => Some(WorkloadProfile::QueryHeavy),
            "ingest-only" => Some(WorkloadProfile::IngestOnly),
            _ => None,
        }
    }

    pub fn as_name(&self) -> &'static str {
        match self {
            WorkloadProfile::IngestHeavy => "ingest-heavy",
            WorkloadProfile::Balanced => "balanced",
            WorkloadProfile::QueryHeavy => "query-heavy",
            WorkloadProfile::IngestOnly => "ingest-only",
        }
    }

    /// Draw a random operation using `rng`.
    pub fn sample(&self, rng: &mut impl Rng) -> Op {
        let roll: u32 = rng.gen_range(0..100);
        self.op_for_roll(roll)
    }

    /// Map a roll in `0..100` to an `Op` according to the profile's percentages.
    /// Exposed for deterministic testing.
    pub fn op_for_roll(&self, roll: u32) -> Op {
        let ingest_share = match self {
            WorkloadProfile::IngestHeavy => 90,
            WorkloadProfile::Balanced => 50,
            WorkloadProfile::QueryHeavy => 10,
            WorkloadProfile::IngestOnly => 100,
        };
        if roll < ingest_share { Op::Ingest } else { Op::Query }
    }
}
