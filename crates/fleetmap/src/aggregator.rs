//! Streaming statistics and weight normalization.
//!
//! Aggregators fold a stream of `f64` samples into a single statistic;
//! normalizers map a raw weight into `[0, 1]`. Together they produce the
//! default weight function: sigmoid-normalized capacity times
//! reverse-min-normalized price.

use crate::bucket::Bucket;
use crate::node::{Node, NodeSet};

/// A streaming statistic over `f64` samples.
pub trait Aggregator {
    /// Feed one sample.
    fn add(&mut self, value: f64);
    /// The statistic over everything fed so far.
    fn compute(&self) -> f64;
}

/// Maps a raw weight into `[0, 1]`.
pub trait Normalizer {
    /// Normalize one weight.
    fn normalize(&self, w: f64) -> f64;
}

/// Computes a node's raw weight.
pub type WeightFunc = Box<dyn Fn(&Node) -> f64 + Send + Sync>;

/// Arithmetic mean kept as a running sum. Returns 0 for an empty stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSumAgg {
    sum: f64,
    count: usize,
}

impl Aggregator for MeanSumAgg {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn compute(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }
}

/// Arithmetic mean maintained incrementally, avoiding an unbounded sum.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanAgg {
    mean: f64,
    count: usize,
}

impl Aggregator for MeanAgg {
    fn add(&mut self, value: f64) {
        let c = self.count + 1;
        self.mean = self.mean * (self.count as f64 / c as f64) + value / c as f64;
        self.count = c;
    }

    fn compute(&self) -> f64 {
        self.mean
    }
}

/// Smallest non-zero sample. Zero is treated as "unset": a caller for whom
/// a zero sample is meaningful must pre-filter the stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinAgg {
    min: f64,
}

impl Aggregator for MinAgg {
    fn add(&mut self, value: f64) {
        if self.min == 0.0 || value < self.min {
            self.min = value;
        }
    }

    fn compute(&self) -> f64 {
        self.min
    }
}

/// Largest sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxAgg {
    max: f64,
}

impl Aggregator for MaxAgg {
    fn add(&mut self, value: f64) {
        if value > self.max {
            self.max = value;
        }
    }

    fn compute(&self) -> f64 {
        self.max
    }
}

/// Mean of the samples inside `[Q1 - k*IQR, Q3 + k*IQR]`.
///
/// With fewer than four samples the bounds collapse to `[min, max]`.
#[derive(Debug, Clone, Default)]
pub struct MeanIqrAgg {
    k: f64,
    samples: Vec<f64>,
}

impl MeanIqrAgg {
    /// Create the aggregator with the given IQR multiplier.
    #[must_use]
    pub fn new(k: f64) -> Self {
        Self { k, samples: Vec::new() }
    }
}

impl Aggregator for MeanIqrAgg {
    fn add(&mut self, value: f64) {
        self.samples.push(value);
    }

    fn compute(&self) -> f64 {
        let l = self.samples.len();
        if l == 0 {
            return 0.0;
        }

        let mut arr = self.samples.clone();
        arr.sort_by(f64::total_cmp);

        let (lo, hi) = if l < 4 {
            (arr[0], arr[l - 1])
        } else {
            let (start, end) = (l / 4, l * 3 / 4 - 1);
            let iqr = self.k * (arr[end] - arr[start]);
            (arr[start] - iqr, arr[end] + iqr)
        };

        let mut sum = 0.0;
        let mut count = 0usize;
        for &v in &arr {
            if v >= lo && v <= hi {
                sum += v;
                count += 1;
            }
        }
        sum / count as f64
    }
}

/// `min / w`, so the cheapest sample normalizes to 1.
#[derive(Debug, Clone, Copy)]
pub struct ReverseMinNorm {
    min: f64,
}

impl ReverseMinNorm {
    /// Create the normalizer around the given minimum.
    #[must_use]
    pub fn new(min: f64) -> Self {
        Self { min }
    }
}

impl Normalizer for ReverseMinNorm {
    fn normalize(&self, w: f64) -> f64 {
        if w == 0.0 {
            return 0.0;
        }
        self.min / w
    }
}

/// `w / max`.
#[derive(Debug, Clone, Copy)]
pub struct MaxNorm {
    max: f64,
}

impl MaxNorm {
    /// Create the normalizer around the given maximum.
    #[must_use]
    pub fn new(max: f64) -> Self {
        Self { max }
    }
}

impl Normalizer for MaxNorm {
    fn normalize(&self, w: f64) -> f64 {
        if self.max == 0.0 {
            return 0.0;
        }
        w / self.max
    }
}

/// `(w/s) / (1 + w/s)`: monotonic, bounded by 1, and exactly 0.5 at the
/// scale point.
#[derive(Debug, Clone, Copy)]
pub struct SigmoidNorm {
    scale: f64,
}

impl SigmoidNorm {
    /// Create the normalizer with the given scale.
    #[must_use]
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }
}

impl Normalizer for SigmoidNorm {
    fn normalize(&self, w: f64) -> f64 {
        if self.scale == 0.0 {
            return 0.0;
        }
        let x = w / self.scale;
        x / (1.0 + x)
    }
}

/// A constant, ignoring the input.
#[derive(Debug, Clone, Copy)]
pub struct ConstNorm {
    value: f64,
}

impl ConstNorm {
    /// Create the normalizer returning `value`.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl Normalizer for ConstNorm {
    fn normalize(&self, _w: f64) -> f64 {
        self.value
    }
}

/// Weight equal to the node's capacity.
#[must_use]
pub fn cap_weight(n: &Node) -> f64 {
    n.capacity as f64
}

/// Weight equal to the node's price.
#[must_use]
pub fn price_weight(n: &Node) -> f64 {
    n.price as f64
}

/// A weight function multiplying normalized capacity and normalized price.
#[must_use]
pub fn new_weight_func(
    cap_norm: impl Normalizer + Send + Sync + 'static,
    price_norm: impl Normalizer + Send + Sync + 'static,
) -> WeightFunc {
    Box::new(move |n: &Node| {
        cap_norm.normalize(n.capacity as f64) * price_norm.normalize(n.price as f64)
    })
}

/// The default weight function for a fleet: sigmoid of capacity at the
/// fleet's mean capacity, times reverse-min of price at the fleet's
/// cheapest price.
#[must_use]
pub fn default_weight_func(nodes: &NodeSet) -> WeightFunc {
    let mut mean_cap = MeanAgg::default();
    let mut min_price = MinAgg::default();
    for n in nodes {
        mean_cap.add(n.capacity as f64);
        min_price.add(n.price as f64);
    }
    new_weight_func(SigmoidNorm::new(mean_cap.compute()), ReverseMinNorm::new(min_price.compute()))
}

impl Bucket {
    /// Feed every cached node's weight into `agg`.
    pub fn traverse<A: Aggregator>(&self, agg: &mut A, wf: &impl Fn(&Node) -> f64) {
        for n in &self.nodes {
            agg.add(wf(n));
        }
    }

    /// Stamp every bucket in the tree with the aggregate of its own
    /// sub-tree's node weights, enabling weighted bucket ranking.
    pub fn traverse_tree<A, F>(&mut self, factory: &F, wf: &impl Fn(&Node) -> f64)
    where
        A: Aggregator,
        F: Fn() -> A,
    {
        let mut agg = factory();
        for n in &self.nodes {
            agg.add(wf(n));
        }
        self.weight = agg.compute();

        for c in &mut self.children {
            c.traverse_tree(factory, wf);
        }
    }
}
