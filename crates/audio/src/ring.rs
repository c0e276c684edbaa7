/// Fixed-capacity circular buffer over mono f32 samples.
///
/// Writes past capacity overwrite the oldest samples; that is the normal
/// steady state during a long utterance, not an error. Snapshots copy out
/// in chronological order and never alias the internal storage, so readers
/// hold no lock while the capture callback keeps writing.
#[derive(Debug)]
pub struct RingBuffer {
    buf: Box<[f32]>,
    sample_rate: u32,
    /// Next write position, modulo capacity.
    head: usize,
    /// Valid samples currently stored, up to capacity.
    len: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize, sample_rate: u32) -> Self {
        Self {
            buf: vec![0.0; capacity.max(1)].into_boxed_slice(),
            sample_rate,
            head: 0,
            len: 0,
        }
    }

    /// Buffer sized to hold `secs` of audio at `sample_rate`.
    pub fn with_seconds(secs: f32, sample_rate: u32) -> Self {
        let capacity = (secs * sample_rate as f32) as usize;
        Self::new(capacity, sample_rate)
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f32 {
        self.len as f32 / self.sample_rate as f32
    }

    /// Append samples, overwriting the oldest content once full.
    pub fn write(&mut self, samples: &[f32]) {
        let cap = self.buf.len();
        if samples.len() >= cap {
            // Only the newest `cap` samples survive; lay them out flat.
            self.buf.copy_from_slice(&samples[samples.len() - cap..]);
            self.head = 0;
            self.len = cap;
            return;
        }
        let first = (cap - self.head).min(samples.len());
        self.buf[self.head..self.head + first].copy_from_slice(&samples[..first]);
        let rest = samples.len() - first;
        if rest > 0 {
            self.buf[..rest].copy_from_slice(&samples[first..]);
        }
        self.head = (self.head + samples.len()) % cap;
        self.len = (self.len + samples.len()).min(cap);
    }

    /// Copy out up to the newest `max_samples`, oldest first.
    ///
    /// Asking for more than is stored returns everything stored.
    pub fn snapshot_last(&self, max_samples: usize) -> Vec<f32> {
        let take = max_samples.min(self.len);
        let cap = self.buf.len();
        let start = (self.head + cap - take) % cap;
        let mut out = Vec::with_capacity(take);
        if start + take <= cap {
            out.extend_from_slice(&self.buf[start..start + take]);
        } else {
            out.extend_from_slice(&self.buf[start..]);
            out.extend_from_slice(&self.buf[..take - (cap - start)]);
        }
        out
    }

    /// Copy out the entire stored content, oldest first.
    pub fn snapshot(&self) -> Vec<f32> {
        self.snapshot_last(self.len)
    }

    /// Copy out up to the newest `ms` milliseconds of audio.
    pub fn snapshot_ms(&self, ms: u64) -> Vec<f32> {
        let samples = (ms as usize * self.sample_rate as usize) / 1000;
        self.snapshot_last(samples)
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
