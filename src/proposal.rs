//! Multiple independent plans for the same batch.

use rand::Rng;
use tracing::debug;

use crate::allocator::{AllocationEngine, PlanningResult};
use crate::error::{PlanningError, Result};
use crate::layout::YardLayout;
use crate::metrics::timestamp_now;
use crate::model::Container;
use crate::types::OperationType;
use crate::yard::{YardModel, ZoneConfiguration};

/// One materialized plan.
#[derive(Clone, Debug)]
pub struct Proposal {
    /// Sequence number, starting at 1.
    pub id: usize,
    pub strategy: String,
    /// Efficiency rounded to a whole percentage.
    pub score: u32,
    pub result: PlanningResult,
    pub timestamp: String,
}

/// Runs the engine several times, each against a freshly built yard.
///
/// The generator adds no variation of its own. Proposals differ only where
/// unknown weights were drawn from `rng`.
#[derive(Clone, Debug)]
pub struct ProposalGenerator {
    layout: YardLayout,
    engine: AllocationEngine,
    max_proposals: usize,
}

impl ProposalGenerator {
    pub const DEFAULT_MAX_PROPOSALS: usize = 5;

    pub fn new(layout: YardLayout, engine: AllocationEngine) -> Self {
        Self {
            layout,
            engine,
            max_proposals: Self::DEFAULT_MAX_PROPOSALS,
        }
    }

    pub fn with_max_proposals(mut self, max_proposals: usize) -> Self {
        self.max_proposals = max_proposals;
        self
    }

    pub fn max_proposals(&self) -> usize {
        self.max_proposals
    }

    /// Produces `count` proposals.
    ///
    /// # Errors
    /// `InvalidProposalCount` when `count` is 0 or above the configured maximum;
    /// any error of the underlying run.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        containers: &[Container],
        operation: OperationType,
        zone_config: &ZoneConfiguration,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Proposal>> {
        if count == 0 || count > self.max_proposals {
            return Err(PlanningError::InvalidProposalCount {
                requested: count,
                max: self.max_proposals,
            });
        }

        (1..=count)
            .map(|id| {
                let mut yard = YardModel::from_layout(&self.layout);
                let result = self
                    .engine
                    .plan(containers, operation, zone_config, &mut yard, &mut *rng)?;
                let score = result.metrics.efficiency.round() as u32;
                debug!(proposal = id, score, "proposal generated");
                Ok(Proposal {
                    id,
                    strategy: format!("Proposal {id}"),
                    score,
                    result,
                    timestamp: timestamp_now(),
                })
            })
            .collect()
    }
}
