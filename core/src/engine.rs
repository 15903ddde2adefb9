//! The generation engine.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   0. Compile calibration into DistributionTables   (once, sequential)
//!   1. Build the merchant population                 (once, sequential)
//!   Then for every transaction, in its chunk's stream:
//!   2. Attribute sampler   — merchant, geography, method, amount
//!   3. Temporal assigner   — timestamp and derived fields
//!   4. Risk scorer         — pre-authorization score
//!   5. Outcome simulator   — boundary draw, failure code, retry draw
//!   6. Record assembler    — output row
//!
//! RULES:
//!   - Tables and population are read-only once built.
//!   - Transactions share no state; each chunk of
//!     TRANSACTIONS_PER_STREAM rows owns one random stream.
//!   - Chunks run in parallel; output is always in index order.

use crate::{
    attribute_sampler::AttributeSampler,
    config::{Calibration, GenerationConfig},
    error::GenResult,
    merchant_population::MerchantPopulation,
    outcome::{FailureBoundary, LogisticBoundary, OutcomeSimulator},
    record::{OutputTable, RecordAssembler, TransactionRecord},
    risk_scorer::RiskScorer,
    rng::{RngBank, StreamRng, StreamSlot, TRANSACTIONS_PER_STREAM},
    tables::DistributionTables,
    temporal::TemporalAssigner,
    types::TxnIndex,
};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Chunks synthesized per streamed batch.
pub const CHUNKS_PER_BATCH: u64 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed { transactions: u64 },
    /// Stopped on request; `transactions` rows were delivered before the
    /// stop, the in-flight batch was discarded.
    Aborted { transactions: u64 },
}

pub struct Generator {
    rng_bank: RngBank,
    tables: DistributionTables,
    population: MerchantPopulation,
    temporal: TemporalAssigner,
    scorer: RiskScorer,
    boundary: Box<dyn FailureBoundary>,
}

impl Generator {
    /// Validate and compile the calibration, then build the merchant pool.
    /// Any calibration problem surfaces here, before a single row exists.
    pub fn build(calibration: Calibration, seed: u64) -> GenResult<Self> {
        let rng_bank = RngBank::new(seed);
        let tables = DistributionTables::compile(calibration)?;

        let mut pop_rng = rng_bank.for_slot(StreamSlot::Population);
        let population = MerchantPopulation::generate(&tables, &mut pop_rng)?;
        let temporal = TemporalAssigner::new(&tables)?;
        let scorer = RiskScorer::new(&tables)?;
        let boundary = Box::new(LogisticBoundary::from(&tables.calibration().boundary));

        log::info!(
            "generator ready: seed={seed}, {} merchants, window {} .. {}",
            population.len(),
            temporal.window_start(),
            temporal.window_end(),
        );

        Ok(Self {
            rng_bank,
            tables,
            population,
            temporal,
            scorer,
            boundary,
        })
    }

    pub fn from_config(calibration: Calibration, config: &GenerationConfig) -> GenResult<Self> {
        Self::build(calibration, config.seed)
    }

    /// Replace the score → failure-probability boundary.
    pub fn with_boundary(mut self, boundary: Box<dyn FailureBoundary>) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn seed(&self) -> u64 {
        self.rng_bank.master_seed()
    }

    pub fn tables(&self) -> &DistributionTables {
        &self.tables
    }

    pub fn population(&self) -> &MerchantPopulation {
        &self.population
    }

    pub fn temporal(&self) -> &TemporalAssigner {
        &self.temporal
    }

    /// Synthesize `count` rows in parallel, in transaction-index order.
    pub fn generate(&self, count: u64) -> OutputTable<'_> {
        let mut table = OutputTable::with_capacity(count as usize);
        let chunks: Vec<Vec<TransactionRecord<'_>>> = (0..chunk_count(count))
            .into_par_iter()
            .map(|chunk| self.generate_chunk(chunk, count))
            .collect();
        for chunk in chunks {
            table.extend(chunk);
        }
        log::info!("generated {} transactions", table.len());
        table
    }

    /// Synthesize in parallel batches and hand each batch to `sink` in
    /// order. Setting `abort` stops new work; the batch in flight is
    /// dropped.
    pub fn stream<F>(&self, count: u64, abort: &AtomicBool, mut sink: F) -> GenResult<RunStatus>
    where
        F: FnMut(&[TransactionRecord<'_>]) -> GenResult<()>,
    {
        let total_chunks = chunk_count(count);
        let mut delivered = 0u64;
        let mut next_chunk = 0u64;

        while next_chunk < total_chunks {
            if abort.load(Ordering::Relaxed) {
                log::info!("run aborted after {delivered} of {count} transactions");
                return Ok(RunStatus::Aborted { transactions: delivered });
            }

            let batch_end = (next_chunk + CHUNKS_PER_BATCH).min(total_chunks);
            let chunks: Vec<Vec<TransactionRecord<'_>>> = (next_chunk..batch_end)
                .into_par_iter()
                .map(|chunk| {
                    if abort.load(Ordering::Relaxed) {
                        Vec::new()
                    } else {
                        self.generate_chunk(chunk, count)
                    }
                })
                .collect();

            if abort.load(Ordering::Relaxed) {
                log::info!("run aborted after {delivered} of {count} transactions");
                return Ok(RunStatus::Aborted { transactions: delivered });
            }

            let batch: Vec<TransactionRecord<'_>> = chunks.into_iter().flatten().collect();
            sink(&batch)?;
            delivered += batch.len() as u64;
            next_chunk = batch_end;

            log::debug!("batch done: {delivered}/{count} transactions");
        }

        log::info!("generated {delivered} transactions");
        Ok(RunStatus::Completed { transactions: delivered })
    }

    /// Rows of one chunk, capped at `count`.
    pub fn generate_chunk(&self, chunk: u64, count: u64) -> Vec<TransactionRecord<'_>> {
        let start = chunk * TRANSACTIONS_PER_STREAM;
        let end = (start + TRANSACTIONS_PER_STREAM).min(count);
        if start >= end {
            return Vec::new();
        }

        let mut rng = self.rng_bank.for_chunk(chunk);
        let pipeline = Pipeline {
            attributes: AttributeSampler::new(&self.tables, &self.population),
            outcomes: OutcomeSimulator::new(&self.tables, self.boundary.as_ref()),
            assembler: RecordAssembler::new(&self.tables),
            generator: self,
        };

        (start..end)
            .map(|index| pipeline.synthesize(index, &mut rng))
            .collect()
    }
}

/// Per-chunk view over the generator's components.
struct Pipeline<'g> {
    attributes: AttributeSampler<'g>,
    outcomes: OutcomeSimulator<'g>,
    assembler: RecordAssembler<'g>,
    generator: &'g Generator,
}

impl<'g> Pipeline<'g> {
    fn synthesize(&self, index: TxnIndex, rng: &mut StreamRng) -> TransactionRecord<'g> {
        let g = self.generator;
        let attrs = self.attributes.sample(rng);
        let temporal = g.temporal.assign(attrs.category, rng);
        let score = g.scorer.score(&g.tables, &attrs, rng);
        let outcome = self.outcomes.decide(&attrs, score, rng);
        self.assembler.assemble(index, &attrs, &temporal, score, outcome)
    }
}

fn chunk_count(count: u64) -> u64 {
    count.div_ceil(TRANSACTIONS_PER_STREAM)
}
