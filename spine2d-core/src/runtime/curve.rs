/// Floats per Bezier segment table: 9 `(time, value)` points sampled after the segment start.
pub const BEZIER_SIZE: usize = 18;

/// Interpolation from one key to the next.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Curve {
    Linear,
    Stepped,
    /// Offset of the first value's segment table in [`CurveFrames`]' Bezier storage. Further
    /// values of the same key follow at `BEZIER_SIZE` strides.
    Bezier(usize),
}

/// Keyframes stored flat as `[time, value0, value1, ...]` per key, plus a curve per key and the
/// sampled Bezier tables.
///
/// Bezier curves are flattened into short polylines when set, so evaluation only walks a fixed
/// table instead of solving the cubic.
#[derive(Clone, Debug, PartialEq)]
pub struct CurveFrames {
    entries: usize,
    frames: Vec<f32>,
    curves: Vec<Curve>,
    bezier: Vec<f32>,
}

impl CurveFrames {
    /// Allocates `frame_count` keys of `value_count` values each and room for `bezier_count`
    /// Bezier tables. Every key starts linear except the last, which is stepped.
    pub fn new(frame_count: usize, bezier_count: usize, value_count: usize) -> Self {
        let mut curves = vec![Curve::Linear; frame_count];
        if let Some(last) = curves.last_mut() {
            *last = Curve::Stepped;
        }
        Self {
            entries: value_count + 1,
            frames: vec![0.0; frame_count * (value_count + 1)],
            curves,
            bezier: vec![0.0; bezier_count * BEZIER_SIZE],
        }
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn value_count(&self) -> usize {
        self.entries - 1
    }

    pub fn frame_count(&self) -> usize {
        self.curves.len()
    }

    pub fn frames(&self) -> &[f32] {
        &self.frames
    }

    pub fn curve(&self, frame: usize) -> Option<Curve> {
        self.curves.get(frame).copied()
    }

    /// Time of the last key.
    pub fn duration(&self) -> f32 {
        self.frames
            .len()
            .checked_sub(self.entries)
            .map(|i| self.frames[i])
            .unwrap_or(0.0)
    }

    pub fn start_time(&self) -> f32 {
        self.frames.first().copied().unwrap_or(0.0)
    }

    /// Sets a key's time and values. Missing values stay as they were; extra values are ignored.
    pub fn set_frame(&mut self, frame: usize, time: f32, values: &[f32]) {
        let base = frame * self.entries;
        let Some(slot) = self.frames.get_mut(base..base + self.entries) else {
            return;
        };
        slot[0] = time;
        for (dst, &src) in slot[1..].iter_mut().zip(values) {
            *dst = src;
        }
    }

    pub fn set_linear(&mut self, frame: usize) {
        if let Some(curve) = self.curves.get_mut(frame) {
            *curve = Curve::Linear;
        }
    }

    pub fn set_stepped(&mut self, frame: usize) {
        if let Some(curve) = self.curves.get_mut(frame) {
            *curve = Curve::Stepped;
        }
    }

    /// Samples the cubic Bezier from `(time1, value1)` to `(time2, value2)` with handles
    /// `(cx1, cy1)`, `(cx2, cy2)` into table `bezier`. `value` is the index of the value the
    /// curve drives; tables for one key must be consecutive, starting with value 0.
    #[allow(clippy::too_many_arguments)]
    pub fn set_bezier(
        &mut self,
        bezier: usize,
        frame: usize,
        value: usize,
        time1: f32,
        value1: f32,
        cx1: f32,
        cy1: f32,
        cx2: f32,
        cy2: f32,
        time2: f32,
        value2: f32,
    ) {
        let start = bezier * BEZIER_SIZE;
        if start + BEZIER_SIZE > self.bezier.len() {
            self.bezier.resize(start + BEZIER_SIZE, 0.0);
        }
        if value == 0 {
            if let Some(curve) = self.curves.get_mut(frame) {
                *curve = Curve::Bezier(start);
            }
        }
        let tmpx = (time1 - cx1 * 2.0 + cx2) * 0.03;
        let tmpy = (value1 - cy1 * 2.0 + cy2) * 0.03;
        let dddx = ((cx1 - cx2) * 3.0 - time1 + time2) * 0.006;
        let dddy = ((cy1 - cy2) * 3.0 - value1 + value2) * 0.006;
        let mut ddx = tmpx * 2.0 + dddx;
        let mut ddy = tmpy * 2.0 + dddy;
        let mut dx = (cx1 - time1) * 0.3 + tmpx + dddx * 0.166_666_67;
        let mut dy = (cy1 - value1) * 0.3 + tmpy + dddy * 0.166_666_67;
        let mut x = time1 + dx;
        let mut y = value1 + dy;
        for point in self.bezier[start..start + BEZIER_SIZE].chunks_exact_mut(2) {
            point[0] = x;
            point[1] = y;
            dx += ddx;
            dy += ddy;
            ddx += dddx;
            ddy += dddy;
            x += dx;
            y += dy;
        }
    }

    /// Like [`CurveFrames::set_bezier`] for a curve that maps time onto a `0..1` percent.
    #[allow(clippy::too_many_arguments)]
    pub fn set_bezier_percent(
        &mut self,
        bezier: usize,
        frame: usize,
        time1: f32,
        cx1: f32,
        cy1: f32,
        cx2: f32,
        cy2: f32,
        time2: f32,
    ) {
        self.set_bezier(bezier, frame, 0, time1, 0.0, cx1, cy1, cx2, cy2, time2, 1.0);
    }

    /// Index into [`CurveFrames::frames`] of the last key at or before `time`, or of the first
    /// key when `time` precedes it.
    pub fn search(&self, time: f32) -> usize {
        search(&self.frames, time, self.entries)
    }

    /// Interpolated `value` at `time`. Callers handle `time` before the first key themselves.
    pub fn value_at(&self, time: f32, value: usize) -> f32 {
        let i = self.search(time);
        self.value_from(i, time, value)
    }

    /// Interpolated `value` at `time` within the interval starting at frame index `i`.
    pub fn value_from(&self, i: usize, time: f32, value: usize) -> f32 {
        let offset = value + 1;
        let next = i + self.entries;
        match self.curves[i / self.entries] {
            Curve::Linear if next < self.frames.len() => {
                let before = self.frames[i];
                let v = self.frames[i + offset];
                let t = (time - before) / (self.frames[next] - before);
                v + (self.frames[next + offset] - v) * t
            }
            Curve::Linear | Curve::Stepped => self.frames[i + offset],
            Curve::Bezier(start) => self.bezier_value(time, i, offset, start + value * BEZIER_SIZE),
        }
    }

    fn bezier_value(&self, time: f32, frame_index: usize, value_offset: usize, start: usize) -> f32 {
        let curves = &self.bezier;
        if start + BEZIER_SIZE > curves.len() {
            return self.frames[frame_index + value_offset];
        }
        if curves[start] > time {
            let x = self.frames[frame_index];
            let y = self.frames[frame_index + value_offset];
            return y + (time - x) / (curves[start] - x) * (curves[start + 1] - y);
        }
        let end = start + BEZIER_SIZE;
        let mut i = start + 2;
        while i < end {
            if curves[i] >= time {
                let x = curves[i - 2];
                let y = curves[i - 1];
                return y + (time - x) / (curves[i] - x) * (curves[i + 1] - y);
            }
            i += 2;
        }
        let x = curves[end - 2];
        let y = curves[end - 1];
        let next = frame_index + self.entries;
        if next >= self.frames.len() {
            return y;
        }
        y + (time - x) / (self.frames[next] - x) * (self.frames[next + value_offset] - y)
    }

    /// Eased `0..1` progress through the interval starting at key `frame`, for timelines whose
    /// keys hold no interpolated values.
    pub fn percent(&self, time: f32, frame: usize) -> f32 {
        let i = frame * self.entries;
        let next = i + self.entries;
        if next >= self.frames.len() {
            return 0.0;
        }
        match self.curves[frame] {
            Curve::Linear => {
                let x = self.frames[i];
                (time - x) / (self.frames[next] - x)
            }
            Curve::Stepped => 0.0,
            Curve::Bezier(start) => {
                let curves = &self.bezier;
                if start + BEZIER_SIZE > curves.len() {
                    return 0.0;
                }
                if curves[start] > time {
                    let x = self.frames[i];
                    return curves[start + 1] * (time - x) / (curves[start] - x);
                }
                let end = start + BEZIER_SIZE;
                let mut j = start + 2;
                while j < end {
                    if curves[j] >= time {
                        let x = curves[j - 2];
                        let y = curves[j - 1];
                        return y + (time - x) / (curves[j] - x) * (curves[j + 1] - y);
                    }
                    j += 2;
                }
                let x = curves[end - 2];
                let y = curves[end - 1];
                y + (1.0 - y) * (time - x) / (self.frames[next] - x)
            }
        }
    }
}

/// Index of the last entry in `frames` (a plain list of key times) at or before `time`.
pub(crate) fn search1(frames: &[f32], time: f32) -> usize {
    search(frames, time, 1)
}

pub(crate) fn search(frames: &[f32], time: f32, step: usize) -> usize {
    let count = frames.len() / step;
    if count == 0 {
        return 0;
    }
    // Binary search for the first key after `time`, skipping key 0.
    let (mut lo, mut hi) = (1, count);
    while lo < hi {
        let mid = (lo + hi) / 2;
        if frames[mid * step] > time {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    (lo - 1) * step
}
