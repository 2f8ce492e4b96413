/// One tick's reading: frame time in seconds plus two 2D vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub vector_a: (f64, f64),
    pub vector_b: (f64, f64),
}

impl Sample {
    pub fn new(timestamp: f64, reading: Reading) -> Self {
        let (ax, ay, bx, by) = reading;
        Self {
            timestamp,
            vector_a: (ax, ay),
            vector_b: (bx, by),
        }
    }
}

/// Raw sensor output: `(a.x, a.y, b.x, b.y)`.
pub type Reading = (f64, f64, f64, f64);

/// Sensor capability polled once per recorded tick.
///
/// Implementations must be cheap and non-blocking; they run on the tick thread.
pub trait SampleSource {
    fn sample(&mut self) -> Reading;
}

impl<F> SampleSource for F
where
    F: FnMut() -> Reading,
{
    fn sample(&mut self) -> Reading {
        self()
    }
}

/// Append-only run of samples in tick order.
///
/// Not synchronised; whoever owns the value owns the buffer's role.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    samples: Vec<Sample>,
}

impl SampleBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Drop the newest samples so at most `len` remain.
    pub fn truncate(&mut self, len: usize) {
        self.samples.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }
}

impl<'a> IntoIterator for &'a SampleBuffer {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
