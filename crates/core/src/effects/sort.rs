use std::str::FromStr;

use rand::seq::SliceRandom;

use crate::{
    config::{AppConfig, SortConfig},
    effect::{sanitize_dt, seeded_rng, Effect, EffectFamily, SegmentPosition, Step},
    error::LedMatrixError,
    render::{Canvas, Rgb},
    timeline::Segment,
    Result,
};

use super::{text::TextBlock, Choreography};

pub const ID: &str = "sort";
pub const NATIVE_FPS: u32 = 20;

const DEFAULT: Rgb = Rgb::new(0, 150, 255);
const COMPARING: Rgb = Rgb::new(255, 255, 0);
const SWAPPING: Rgb = Rgb::new(255, 0, 0);
const SORTED: Rgb = Rgb::new(0, 255, 0);
const PIVOT: Rgb = Rgb::new(255, 0, 255);
const TITLE_GLOW: Rgb = Rgb::new(0, 50, 100);
const TITLE_MAIN: Rgb = Rgb::new(0, 200, 255);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortAlgorithm {
    Bubble,
    Quick,
    Insertion,
    Selection,
}

impl SortAlgorithm {
    pub const ALL: [SortAlgorithm; 4] = [Self::Bubble, Self::Quick, Self::Insertion, Self::Selection];

    pub fn name(self) -> &'static str {
        match self {
            Self::Bubble => "bubble",
            Self::Quick => "quick",
            Self::Insertion => "insertion",
            Self::Selection => "selection",
        }
    }

    /// Two-line caption shown before the run.
    pub fn title(self) -> &'static str {
        match self {
            Self::Bubble => "BUBBLE\nSORT",
            Self::Quick => "QUICK\nSORT",
            Self::Insertion => "INSERT\nSORT",
            Self::Selection => "SELECT\nSORT",
        }
    }
}

impl FromStr for SortAlgorithm {
    type Err = LedMatrixError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| LedMatrixError::config(format!("unknown sort algorithm {s:?}")))
    }
}

/// One recorded step of a sort run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOp {
    Compare(usize, usize),
    Swap(usize, usize),
    /// Overwrites one slot; insertion sort shifts with these.
    Write(usize, u32),
    /// Sets or clears the highlighted pivot.
    Pivot(Option<usize>),
    MarkSorted(usize),
}

/// Runs `algorithm` over a copy of `values`, returning every operation it
/// performed in order. The run always ends with every index marked sorted.
pub fn record(algorithm: SortAlgorithm, values: &[u32]) -> Vec<SortOp> {
    let mut v = values.to_vec();
    let mut ops = Vec::new();
    match algorithm {
        SortAlgorithm::Bubble => bubble(&mut v, &mut ops),
        SortAlgorithm::Quick => {
            if !v.is_empty() {
                let high = v.len() - 1;
                quick(&mut v, 0, high, &mut ops);
            }
        }
        SortAlgorithm::Insertion => insertion(&mut v, &mut ops),
        SortAlgorithm::Selection => selection(&mut v, &mut ops),
    }
    ops.extend((0..v.len()).map(SortOp::MarkSorted));
    ops
}

fn bubble(v: &mut [u32], ops: &mut Vec<SortOp>) {
    let n = v.len();
    for i in 0..n {
        let mut swapped = false;
        for j in 0..n - i - 1 {
            ops.push(SortOp::Compare(j, j + 1));
            if v[j] > v[j + 1] {
                v.swap(j, j + 1);
                ops.push(SortOp::Swap(j, j + 1));
                swapped = true;
            }
        }
        ops.push(SortOp::MarkSorted(n - i - 1));
        if !swapped {
            break;
        }
    }
}

fn quick(v: &mut [u32], low: usize, high: usize, ops: &mut Vec<SortOp>) {
    if low >= high {
        if low == high {
            ops.push(SortOp::MarkSorted(low));
        }
        return;
    }
    ops.push(SortOp::Pivot(Some(high)));
    let pivot = v[high];
    let mut store = low;
    for j in low..high {
        ops.push(SortOp::Compare(j, high));
        if v[j] < pivot {
            if store != j {
                v.swap(store, j);
                ops.push(SortOp::Swap(store, j));
            }
            store += 1;
        }
    }
    if store != high {
        v.swap(store, high);
        ops.push(SortOp::Swap(store, high));
    }
    ops.push(SortOp::Pivot(None));
    ops.push(SortOp::MarkSorted(store));
    if store > low {
        quick(v, low, store - 1, ops);
    }
    quick(v, store + 1, high, ops);
}

fn insertion(v: &mut [u32], ops: &mut Vec<SortOp>) {
    for i in 1..v.len() {
        let key = v[i];
        let mut j = i;
        while j > 0 {
            ops.push(SortOp::Compare(j - 1, j));
            if v[j - 1] <= key {
                break;
            }
            v[j] = v[j - 1];
            ops.push(SortOp::Write(j, v[j]));
            j -= 1;
        }
        if j != i {
            v[j] = key;
            ops.push(SortOp::Write(j, key));
        }
    }
}

fn selection(v: &mut [u32], ops: &mut Vec<SortOp>) {
    let n = v.len();
    for i in 0..n {
        let mut min = i;
        for j in i + 1..n {
            ops.push(SortOp::Compare(min, j));
            if v[j] < v[min] {
                min = j;
            }
        }
        if min != i {
            v.swap(i, min);
            ops.push(SortOp::Swap(i, min));
        }
        ops.push(SortOp::MarkSorted(i));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Touch {
    None,
    Compare(usize, usize),
    Swap(usize, usize),
}

/// Array contents plus highlight state, rebuilt by replaying operations.
#[derive(Debug, Clone, PartialEq)]
pub struct SortState {
    values: Vec<u32>,
    sorted: Vec<bool>,
    pivot: Option<usize>,
    touch: Touch,
}

impl SortState {
    pub fn new(values: Vec<u32>) -> Self {
        let n = values.len();
        Self {
            values,
            sorted: vec![false; n],
            pivot: None,
            touch: Touch::None,
        }
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    pub fn is_sorted(&self, index: usize) -> bool {
        self.sorted.get(index).copied().unwrap_or(false)
    }

    pub fn apply(&mut self, op: SortOp) {
        let n = self.values.len();
        match op {
            SortOp::Compare(a, b) => self.touch = Touch::Compare(a, b),
            SortOp::Swap(a, b) if a < n && b < n => {
                self.values.swap(a, b);
                self.touch = Touch::Swap(a, b);
            }
            SortOp::Write(i, value) if i < n => {
                self.values[i] = value;
                self.touch = Touch::Swap(i, i);
            }
            SortOp::Pivot(p) => self.pivot = p,
            SortOp::MarkSorted(i) if i < n => {
                self.sorted[i] = true;
                self.touch = Touch::None;
            }
            _ => {}
        }
    }

    fn color(&self, index: usize) -> Rgb {
        if self.pivot == Some(index) {
            return PIVOT;
        }
        match self.touch {
            Touch::Swap(a, b) if index == a || index == b => SWAPPING,
            Touch::Compare(a, b) if index == a || index == b => COMPARING,
            _ if self.is_sorted(index) => SORTED,
            _ => DEFAULT,
        }
    }
}

/// Shows the algorithm name, replays a recorded sort as coloured bars, then
/// holds the sorted result.
#[derive(Debug, Clone)]
pub struct SortEffect {
    config: SortConfig,
    fixed: Option<SortAlgorithm>,
    algorithm: SortAlgorithm,
    ops: Vec<SortOp>,
    applied: usize,
    state: SortState,
    title: TextBlock,
    choreo: Choreography,
    width: usize,
    height: usize,
}

impl SortEffect {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.display.validate()?;
        config.sort.validate()?;
        let fixed = match config.sort.algorithm.as_str() {
            "random" => None,
            name => Some(name.parse()?),
        };
        let algorithm = fixed.unwrap_or(SortAlgorithm::Bubble);
        let mut effect = Self {
            config: config.sort.clone(),
            fixed,
            algorithm,
            ops: Vec::new(),
            applied: 0,
            state: SortState::new(Vec::new()),
            title: TextBlock::new(algorithm.title()),
            choreo: Choreography::new(Vec::new(), 1.0 / config.sort.step_interval),
            width: 0,
            height: 0,
        };
        effect.reset(config.display.width, config.display.height, 0);
        Ok(effect)
    }

    pub fn algorithm(&self) -> SortAlgorithm {
        self.algorithm
    }

    pub fn state(&self) -> &SortState {
        &self.state
    }

    pub fn operation_count(&self) -> usize {
        self.ops.len()
    }

    /// Replays recorded operations up to `target`.
    fn catch_up(&mut self, target: usize) {
        let target = target.min(self.ops.len());
        while self.applied < target {
            self.state.apply(self.ops[self.applied]);
            self.applied += 1;
        }
    }

    fn render_bars(&self) -> Canvas {
        let mut canvas = Canvas::new(self.width, self.height);
        let values = self.state.values();
        let n = values.len().max(1);
        let bar = (self.width / n).max(1);
        let h = self.height as f32;
        for (i, &value) in values.iter().enumerate() {
            let x = (i * bar) as f32;
            let top = h - (value as f32 / n as f32 * h).ceil();
            canvas.fill_rect(x, top, x + bar as f32 - 1.0, h - 1.0, self.state.color(i));
        }
        canvas
    }

    fn render_title(&self) -> Canvas {
        let mut canvas = Canvas::new(self.width, self.height);
        let x = (self.width as i64 - self.title.width() as i64) / 2;
        let y = (self.height as i64 - self.title.height() as i64) / 2;
        self.title.draw(&mut canvas, x, y, TITLE_MAIN, Some(TITLE_GLOW));
        canvas
    }
}

impl Effect for SortEffect {
    fn id(&self) -> &'static str {
        ID
    }

    fn family(&self) -> EffectFamily {
        EffectFamily::Stepwise
    }

    fn reset(&mut self, width: usize, height: usize, seed: u64) {
        let mut rng = seeded_rng(seed);
        self.algorithm = match self.fixed {
            Some(algorithm) => algorithm,
            None => *SortAlgorithm::ALL.choose(&mut rng).unwrap_or(&SortAlgorithm::Bubble),
        };
        let n = self.config.array_size.unwrap_or(width).min(width).max(2) as u32;
        let mut values: Vec<u32> = (1..=n).collect();
        values.shuffle(&mut rng);
        self.ops = record(self.algorithm, &values);
        self.applied = 0;
        self.state = SortState::new(values);
        self.title = TextBlock::new(self.algorithm.title());
        let interval = self.config.step_interval;
        self.choreo = Choreography::new(
            vec![
                Segment::new("title", self.config.title_secs),
                Segment::new("sorting", self.ops.len() as f32 * interval),
                Segment::new("hold", self.config.hold_secs),
            ],
            1.0 / interval,
        );
        self.width = width;
        self.height = height;
        tracing::debug!(algorithm = self.algorithm.name(), ops = self.ops.len(), "sort recorded");
    }

    fn advance(&mut self, dt: f32) -> Step {
        self.choreo.advance(sanitize_dt(dt));
        let Some(pos) = self.choreo.position() else {
            self.catch_up(self.ops.len());
            return Step::Done;
        };
        match pos.name.as_str() {
            "title" => Step::Frame(self.render_title().into_frame()),
            "sorting" => {
                let done = (pos.local_time / self.config.step_interval).round() as usize + 1;
                self.catch_up(done);
                Step::Frame(self.render_bars().into_frame())
            }
            _ => {
                self.catch_up(self.ops.len());
                Step::Frame(self.render_bars().into_frame())
            }
        }
    }

    fn segment(&self) -> Option<SegmentPosition> {
        self.choreo.position()
    }
}
