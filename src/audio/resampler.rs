/*!
Variable-rate read cursor over a mono speech buffer.

The output callback pulls one output frame at a time. Each pull advances
the cursor by `speed * src_rate / dst_rate` source frames and linearly
interpolates between the two neighbouring source samples, so the same
cursor handles both device-rate conversion and playback speed.

```ignore
use crate::audio::resampler::SpeedCursor;

let mut cursor = SpeedCursor::new(24_000, 48_000, 1.25);
while let Some(sample) = cursor.next_sample(&buffer.samples) {
    // write `sample` to every output channel
}
```

Speed is fixed for the lifetime of a cursor: a new speed applies to the
next buffer only.
*/

#[derive(Debug, Clone)]
pub struct SpeedCursor {
    step: f64,
    pos: f64,
}

impl SpeedCursor {
    pub fn new(src_rate: u32, dst_rate: u32, speed: f32) -> Self {
        let speed = if speed.is_finite() && speed > 0.0 { speed as f64 } else { 1.0 };
        let step = if dst_rate == 0 { 0.0 } else { speed * src_rate as f64 / dst_rate as f64 };
        Self { step, pos: 0.0 }
    }

    pub fn is_finished(&self, input: &[f32]) -> bool {
        self.step == 0.0 || self.pos >= input.len() as f64
    }

    /// Next interpolated sample, or `None` once the buffer is exhausted
    pub fn next_sample(&mut self, input: &[f32]) -> Option<f32> {
        if self.is_finished(input) {
            return None;
        }

        let i = self.pos.floor() as usize;
        let frac = (self.pos - i as f64) as f32;
        let s0 = input[i];
        let s1 = input.get(i + 1).copied().unwrap_or(s0);

        self.pos += self.step;
        Some(s0 + (s1 - s0) * frac)
    }
}
