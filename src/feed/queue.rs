//! Bounded-queue feed
//!
//! Producers claim positions from a shared cursor over the epoch order of
//! example indices, decode their example and push it into a bounded channel
//! in claim order. Epochs repeat until the producers are stopped, so a final
//! partial batch is filled with examples from the start of the next epoch.
//! Every example of one epoch reaches the queue before any of the next.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ndarray::Array2;
use parking_lot::{Condvar, Mutex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{Example, ExampleSource, Feed, FeedBatch, Producer};
use crate::config::FeedConfig;
use crate::engine::Coordinator;
use crate::error::{PredictError, Result};

/// Wait between attempts to push into a full queue
const BACKOFF: Duration = Duration::from_millis(1);

/// Example order shared by all producers of a feed
#[derive(Debug, Clone)]
struct EpochOrder {
    len: usize,
    shuffle_seed: Option<u64>,
}

impl EpochOrder {
    fn for_epoch(&self, epoch: u64) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len).collect();
        if let Some(seed) = self.shuffle_seed {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(epoch));
            order.shuffle(&mut rng);
        }
        order
    }
}

/// Positions claimed by producers, and the next one allowed into the queue
#[derive(Default)]
struct Cursor {
    claimed: AtomicUsize,
    next_push: Mutex<usize>,
    turn: Condvar,
}

impl Cursor {
    fn claim(&self) -> usize {
        self.claimed.fetch_add(1, Ordering::Relaxed)
    }

    /// Block until `position` is next in line; `false` means stop
    fn wait_turn(&self, position: usize, coord: &Coordinator) -> bool {
        let mut next = self.next_push.lock();
        while *next != position {
            if coord.should_stop() {
                return false;
            }
            self.turn.wait_for(&mut next, BACKOFF);
        }
        true
    }

    fn advance(&self) {
        *self.next_push.lock() += 1;
        self.turn.notify_all();
    }
}

struct QueueProducer<S: ExampleSource> {
    id: usize,
    subset: String,
    source: Arc<S>,
    order: EpochOrder,
    cursor: Arc<Cursor>,
    sender: SyncSender<Example>,
}

impl<S: ExampleSource> QueueProducer<S> {
    /// Push one example, waiting out backpressure; `false` means stop
    fn push(&self, mut example: Example, coord: &Coordinator) -> bool {
        loop {
            match self.sender.try_send(example) {
                Ok(()) => return true,
                Err(TrySendError::Full(returned)) => {
                    if coord.should_stop() {
                        return false;
                    }
                    example = returned;
                    thread::sleep(BACKOFF);
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }
}

impl<S: ExampleSource> Producer for QueueProducer<S> {
    fn name(&self) -> String {
        format!("feed-{}-{}", self.subset, self.id)
    }

    fn run(self: Box<Self>, coord: &Coordinator) {
        let len = self.source.len();
        if len == 0 {
            return;
        }

        let mut epoch = 0;
        let mut order = self.order.for_epoch(0);

        while !coord.should_stop() {
            let position = self.cursor.claim();
            if position / len != epoch {
                epoch = position / len;
                order = self.order.for_epoch(epoch as u64);
            }
            let index = order[position % len];

            let example = match self.source.load(index) {
                Ok(example) => example,
                Err(e) => {
                    tracing::warn!("{} failed on example {}: {}", self.name(), index, e);
                    coord.request_stop_with(e);
                    return;
                }
            };

            if !self.cursor.wait_turn(position, coord) {
                return;
            }
            if !self.push(example, coord) {
                // Consumer gone; release producers waiting for their turn
                coord.request_stop();
                return;
            }
            self.cursor.advance();
        }
    }
}

/// Feed backed by producer threads and a bounded queue
pub struct QueueFeed<S: ExampleSource> {
    source: Arc<S>,
    subset: String,
    batch_size: usize,
    receiver: Receiver<Example>,
    producers: Vec<Box<dyn Producer>>,
}

impl<S: ExampleSource> QueueFeed<S> {
    /// Create a feed and register its producers
    pub fn new(source: S, subset: impl Into<String>, config: &FeedConfig) -> Result<Self> {
        if config.batch_size == 0 || config.num_producers == 0 || config.queue_capacity == 0 {
            return Err(PredictError::Config(
                "batch_size, num_producers and queue_capacity must be positive".into(),
            ));
        }

        let source = Arc::new(source);
        let subset = subset.into();
        let (sender, receiver) = sync_channel(config.queue_capacity);

        let shuffle_seed = config
            .shuffle
            .then(|| config.seed.unwrap_or_else(|| rand::thread_rng().gen()));
        let order = EpochOrder {
            len: source.len(),
            shuffle_seed,
        };
        let cursor = Arc::new(Cursor::default());

        let producers = (0..config.num_producers)
            .map(|id| {
                Box::new(QueueProducer {
                    id,
                    subset: subset.clone(),
                    source: Arc::clone(&source),
                    order: order.clone(),
                    cursor: Arc::clone(&cursor),
                    sender: sender.clone(),
                }) as Box<dyn Producer>
            })
            .collect();

        Ok(Self {
            source,
            subset,
            batch_size: config.batch_size,
            receiver,
            producers,
        })
    }
}

impl<S: ExampleSource> Feed for QueueFeed<S> {
    fn total_example_count(&self) -> usize {
        self.source.len()
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn subset_name(&self) -> &str {
        &self.subset
    }

    fn producers(&mut self) -> Vec<Box<dyn Producer>> {
        std::mem::take(&mut self.producers)
    }

    fn next_batch(&mut self) -> Result<FeedBatch> {
        if !self.producers.is_empty() {
            return Err(PredictError::Feed("feed workers were never started".into()));
        }

        let dim = self.source.feature_dim();
        let mut identities = Vec::with_capacity(self.batch_size);
        let mut features = Vec::with_capacity(self.batch_size * dim);

        for _ in 0..self.batch_size {
            let example = self.receiver.recv().map_err(|_| {
                PredictError::Feed(format!(
                    "feed workers exited after {} of {} examples in the batch",
                    identities.len(),
                    self.batch_size
                ))
            })?;

            if example.features.len() != dim {
                return Err(PredictError::Feed(format!(
                    "example {} has {} features, expected {}",
                    example.identity,
                    example.features.len(),
                    dim
                )));
            }

            identities.push(example.identity);
            features.extend(example.features);
        }

        let inputs = Array2::from_shape_vec((self.batch_size, dim), features)?;
        Ok(FeedBatch { inputs, identities })
    }
}
