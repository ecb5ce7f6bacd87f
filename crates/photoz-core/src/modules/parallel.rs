//! Contiguous catalog partitions evaluated on a worker pool and gathered back
//! into catalog order.
//!
//! Each worker job sends exactly one [`PartitionOutput`] over a channel. The
//! coordinator waits for all of them, checks them against the partition plan
//! and scatters their rows into the global tables.

use crate::domain::{PhotozError, PhotozResult};
use crossbeam_channel::bounded;
use std::collections::BTreeMap;
use tracing::{debug, info, info_span, warn};

/// Lines `[start, end)` of the catalog handled by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub worker: usize,
    pub start: usize,
    pub end: usize,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// `[⌊k·N/W⌋, ⌊(k+1)·N/W⌋)` for `k = 0..W`, with `W` clamped to at least one.
pub fn partition_ranges(num_objects: usize, num_workers: usize) -> Vec<Partition> {
    let num_workers = num_workers.max(1);
    let boundary = |k: usize| ((k as u128 * num_objects as u128) / num_workers as u128) as usize;
    (0..num_workers)
        .map(|worker| Partition {
            worker,
            start: boundary(worker),
            end: boundary(worker + 1),
        })
        .collect()
}

/// Objects evaluated and skip counts keyed by error code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatingTally {
    pub evaluated: usize,
    pub skipped: BTreeMap<&'static str, usize>,
}

impl GatingTally {
    pub fn record_evaluated(&mut self) {
        self.evaluated += 1;
    }

    pub fn record_skip(&mut self, code: &'static str) {
        *self.skipped.entry(code).or_default() += 1;
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn merge(&mut self, other: &GatingTally) {
        self.evaluated += other.evaluated;
        for (code, count) in &other.skipped {
            *self.skipped.entry(code).or_default() += count;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionOutput {
    pub partition: Partition,
    /// Row-major, `partition.len()` rows.
    pub pdfs: Vec<f64>,
    /// Row-major, `partition.len()` rows.
    pub metrics: Vec<f64>,
    pub tally: GatingTally,
}

/// Computes one partition's rows. Implementations only read shared state.
pub trait PartitionWorker: Sync {
    fn run(&self, partition: Partition) -> PhotozResult<PartitionOutput>;
}

/// Global tables in catalog order.
#[derive(Debug, Clone, PartialEq)]
pub struct GatheredResults {
    pub num_objects: usize,
    pub pdf_width: usize,
    pub metrics_width: usize,
    pub pdfs: Vec<f64>,
    pub metrics: Vec<f64>,
    pub tally: GatingTally,
}

impl GatheredResults {
    pub fn pdf_row(&self, object_index: usize) -> &[f64] {
        let start = object_index * self.pdf_width;
        &self.pdfs[start..start + self.pdf_width]
    }

    pub fn metrics_row(&self, object_index: usize) -> &[f64] {
        let start = object_index * self.metrics_width;
        &self.metrics[start..start + self.metrics_width]
    }
}

pub struct ParallelCoordinator {
    num_workers: usize,
}

impl ParallelCoordinator {
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn run<W: PartitionWorker>(
        &self,
        worker: &W,
        num_objects: usize,
        pdf_width: usize,
        metrics_width: usize,
    ) -> PhotozResult<GatheredResults> {
        let partitions = partition_ranges(num_objects, self.num_workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(partitions.len())
            .thread_name(|index| format!("photoz-worker-{index}"))
            .build()
            .map_err(|error| {
                PhotozError::internal(
                    "SYS.THREAD_POOL",
                    format!("failed to start {} worker threads: {}", partitions.len(), error),
                )
            })?;

        let (sender, receiver) = bounded(partitions.len());
        pool.scope(|scope| {
            for partition in partitions.iter().copied() {
                let sender = sender.clone();
                scope.spawn(move |_| {
                    let span = info_span!("partition", worker = partition.worker);
                    let _entered = span.enter();
                    info!(
                        start = partition.start,
                        end = partition.end,
                        "worker analyzes catalog lines"
                    );
                    let result = worker.run(partition);
                    if sender.send((partition.worker, result)).is_err() {
                        warn!("result channel closed before partition output was delivered");
                    }
                });
            }
        });
        drop(sender);

        let mut received: Vec<Option<PhotozResult<PartitionOutput>>> =
            (0..partitions.len()).map(|_| None).collect();
        for _ in 0..partitions.len() {
            let (worker_index, result) = receiver.recv().map_err(|_| {
                PhotozError::parallel_consistency(
                    "PARALLEL.MISSING_OUTPUT",
                    "result channel closed before every partition reported",
                )
            })?;
            let slot = received.get_mut(worker_index).ok_or_else(|| {
                PhotozError::parallel_consistency(
                    "PARALLEL.UNKNOWN_WORKER",
                    format!("output from unknown worker {worker_index}"),
                )
            })?;
            if slot.replace(result).is_some() {
                return Err(PhotozError::parallel_consistency(
                    "PARALLEL.DUPLICATE_OUTPUT",
                    format!("worker {worker_index} reported twice"),
                ));
            }
        }

        let mut gathered = GatheredResults {
            num_objects,
            pdf_width,
            metrics_width,
            pdfs: vec![0.0; num_objects * pdf_width],
            metrics: vec![0.0; num_objects * metrics_width],
            tally: GatingTally::default(),
        };

        for (expected, result) in partitions.iter().zip(received) {
            let output = result.ok_or_else(|| {
                PhotozError::parallel_consistency(
                    "PARALLEL.MISSING_OUTPUT",
                    format!("worker {} never reported", expected.worker),
                )
            })??;
            check_output(expected, &output, pdf_width, metrics_width)?;

            gathered.pdfs[expected.start * pdf_width..expected.end * pdf_width]
                .copy_from_slice(&output.pdfs);
            gathered.metrics[expected.start * metrics_width..expected.end * metrics_width]
                .copy_from_slice(&output.metrics);
            gathered.tally.merge(&output.tally);
            debug!(worker = expected.worker, rows = expected.len(), "partition gathered");
        }

        Ok(gathered)
    }
}

fn check_output(
    expected: &Partition,
    output: &PartitionOutput,
    pdf_width: usize,
    metrics_width: usize,
) -> PhotozResult<()> {
    if output.partition != *expected {
        return Err(PhotozError::parallel_consistency(
            "PARALLEL.PARTITION_MISMATCH",
            format!(
                "worker {} reported lines {}..{}, expected {}..{}",
                expected.worker,
                output.partition.start,
                output.partition.end,
                expected.start,
                expected.end
            ),
        ));
    }

    if output.pdfs.len() != expected.len() * pdf_width
        || output.metrics.len() != expected.len() * metrics_width
    {
        return Err(PhotozError::parallel_consistency(
            "PARALLEL.ROW_COUNT",
            format!(
                "worker {} returned {} PDF and {} metrics values for {} rows",
                expected.worker,
                output.pdfs.len(),
                output.metrics.len(),
                expected.len()
            ),
        ));
    }

    let rows = output.tally.evaluated + output.tally.total_skipped();
    if rows != expected.len() {
        return Err(PhotozError::parallel_consistency(
            "PARALLEL.ROW_COUNT",
            format!(
                "worker {} accounted for {} objects in a partition of {}",
                expected.worker,
                rows,
                expected.len()
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        GatingTally, ParallelCoordinator, Partition, PartitionOutput, PartitionWorker,
        partition_ranges,
    };
    use crate::domain::{PhotozError, PhotozErrorCategory, PhotozResult};

    struct IndexWorker;

    impl PartitionWorker for IndexWorker {
        fn run(&self, partition: Partition) -> PhotozResult<PartitionOutput> {
            let mut output = PartitionOutput {
                partition,
                pdfs: Vec::new(),
                metrics: Vec::new(),
                tally: GatingTally::default(),
            };
            for index in partition.start..partition.end {
                output.pdfs.extend([index as f64, 10.0 * index as f64]);
                output.metrics.push(-(index as f64));
                if index % 5 == 0 {
                    output.tally.record_skip("DATA.TEST");
                } else {
                    output.tally.record_evaluated();
                }
            }
            Ok(output)
        }
    }

    struct ShiftedWorker;

    impl PartitionWorker for ShiftedWorker {
        fn run(&self, partition: Partition) -> PhotozResult<PartitionOutput> {
            let mut output = IndexWorker.run(partition)?;
            if partition.worker == 1 {
                output.partition.start += 1;
            }
            Ok(output)
        }
    }

    struct ShortWorker;

    impl PartitionWorker for ShortWorker {
        fn run(&self, partition: Partition) -> PhotozResult<PartitionOutput> {
            let mut output = IndexWorker.run(partition)?;
            if partition.worker == 2 {
                output.pdfs.pop();
            }
            Ok(output)
        }
    }

    struct FailingWorker;

    impl PartitionWorker for FailingWorker {
        fn run(&self, partition: Partition) -> PhotozResult<PartitionOutput> {
            if partition.worker == 3 {
                return Err(PhotozError::domain("DOMAIN.TEST", "worker 3 failed"));
            }
            IndexWorker.run(partition)
        }
    }

    #[test]
    fn seventeen_objects_over_four_workers() {
        let partitions = partition_ranges(17, 4);
        let bounds: Vec<(usize, usize)> = partitions
            .iter()
            .map(|partition| (partition.start, partition.end))
            .collect();
        assert_eq!(bounds, vec![(0, 4), (4, 8), (8, 12), (12, 17)]);

        let mut seen = vec![0; 17];
        for partition in &partitions {
            for index in partition.start..partition.end {
                seen[index] += 1;
            }
        }
        assert!(seen.iter().all(|count| *count == 1));
    }

    #[test]
    fn more_workers_than_objects_leaves_empty_partitions() {
        let partitions = partition_ranges(2, 4);
        assert_eq!(partitions.iter().map(Partition::len).sum::<usize>(), 2);
        assert!(partitions[0].is_empty());
        assert_eq!(partition_ranges(5, 0).len(), 1);
    }

    #[test]
    fn gather_restores_catalog_order_and_merges_tallies() {
        let gathered = ParallelCoordinator::new(4)
            .run(&IndexWorker, 17, 2, 1)
            .expect("gather should succeed");

        for index in 0..17 {
            assert_eq!(gathered.pdf_row(index), &[index as f64, 10.0 * index as f64]);
            assert_eq!(gathered.metrics_row(index), &[-(index as f64)]);
        }
        assert_eq!(gathered.tally.evaluated, 13);
        assert_eq!(gathered.tally.skipped.get("DATA.TEST"), Some(&4));
    }

    #[test]
    fn single_worker_matches_many_workers() {
        let one = ParallelCoordinator::new(1)
            .run(&IndexWorker, 11, 2, 1)
            .expect("one worker");
        let many = ParallelCoordinator::new(6)
            .run(&IndexWorker, 11, 2, 1)
            .expect("six workers");
        assert_eq!(one, many);
    }

    #[test]
    fn mismatched_boundaries_are_consistency_errors() {
        let error = ParallelCoordinator::new(4)
            .run(&ShiftedWorker, 17, 2, 1)
            .expect_err("shifted partition");
        assert_eq!(error.category(), PhotozErrorCategory::ParallelConsistencyError);
        assert_eq!(error.code(), "PARALLEL.PARTITION_MISMATCH");

        let error = ParallelCoordinator::new(4)
            .run(&ShortWorker, 17, 2, 1)
            .expect_err("short output");
        assert_eq!(error.code(), "PARALLEL.ROW_COUNT");
    }

    #[test]
    fn worker_errors_abort_the_run() {
        let error = ParallelCoordinator::new(4)
            .run(&FailingWorker, 17, 2, 1)
            .expect_err("worker failure");
        assert_eq!(error.category(), PhotozErrorCategory::DomainError);
        assert_eq!(error.code(), "DOMAIN.TEST");
    }
}
