use std::collections::VecDeque;

use rand::{rngs::StdRng, seq::SliceRandom, Rng};

use crate::{
    config::{AppConfig, MazeConfig},
    effect::{sanitize_dt, seeded_rng, Effect, EffectFamily, SegmentPosition, Step},
    error::LedMatrixError,
    render::{Canvas, Rgb},
    timeline::Segment,
    Result,
};

use super::Choreography;

pub const ID: &str = "maze";
pub const NATIVE_FPS: u32 = 60;

/// Smallest grid side that still holds one lattice cell inside the border.
pub const MIN_GRID: usize = 5;

const WALL: Rgb = Rgb::new(48, 72, 97);
const FLOOR: Rgb = Rgb::BLACK;
const START: Rgb = Rgb::new(18, 121, 227);
const END: Rgb = Rgb::new(224, 16, 1);
const SEARCHED: Rgb = Rgb::new(139, 53, 46);
const PATH: Rgb = Rgb::new(199, 224, 0);

/// Grid coordinate as `(x, y)`.
pub type Cell = (usize, usize);

/// Wall/floor grid carved on the even lattice, with a two cell border.
#[derive(Debug, Clone, PartialEq)]
pub struct Maze {
    width: usize,
    height: usize,
    walls: Vec<bool>,
    start: Cell,
    end: Cell,
}

impl Maze {
    /// Carves a fresh maze with a recursive backtracker, opens extra
    /// passages and makes sure the end is reachable.
    pub fn generate(width: usize, height: usize, rng: &mut StdRng) -> Self {
        let mut maze = Self {
            width,
            height,
            walls: vec![true; width * height],
            start: (2, 2),
            end: (2, 2),
        };
        maze.end = (inner_even(width, rng), inner_even(height, rng));
        maze.carve(rng);
        maze.open_extra_passages(rng);
        maze.open(maze.start);
        maze.open(maze.end);
        if maze.search().path.is_empty() {
            maze.carve_direct_path();
        }
        maze
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn start(&self) -> Cell {
        self.start
    }

    pub fn end(&self) -> Cell {
        self.end
    }

    pub fn is_wall(&self, (x, y): Cell) -> bool {
        self.walls.get(y * self.width + x).copied().unwrap_or(true)
    }

    fn open(&mut self, (x, y): Cell) {
        if x < self.width && y < self.height {
            self.walls[y * self.width + x] = false;
        }
    }

    fn on_lattice(&self, x: i64, y: i64) -> bool {
        x >= 2 && y >= 2 && x < self.width as i64 - 2 && y < self.height as i64 - 2
    }

    fn carve(&mut self, rng: &mut StdRng) {
        let mut visited = vec![false; self.width * self.height];
        let mut stack = vec![self.start];
        while let Some(&(x, y)) = stack.last() {
            self.open((x, y));
            visited[y * self.width + x] = true;
            let candidates: Vec<(Cell, Cell)> = [(2, 0), (0, 2), (-2, 0), (0, -2)]
                .into_iter()
                .filter_map(|(dx, dy): (i64, i64)| {
                    let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                    if !self.on_lattice(nx, ny) {
                        return None;
                    }
                    let next = (nx as usize, ny as usize);
                    if visited[next.1 * self.width + next.0] {
                        return None;
                    }
                    let between = ((x as i64 + dx / 2) as usize, (y as i64 + dy / 2) as usize);
                    Some((next, between))
                })
                .collect();
            match candidates.choose(rng) {
                Some(&(next, between)) => {
                    self.open(between);
                    stack.push(next);
                }
                None => {
                    stack.pop();
                }
            }
        }
    }

    /// Knocks out a seventh of the walls that separate two open cells in a
    /// straight line, creating loops.
    fn open_extra_passages(&mut self, rng: &mut StdRng) {
        let mut removable = Vec::new();
        for y in 2..self.height.saturating_sub(2) {
            for x in 2..self.width.saturating_sub(2) {
                if !self.is_wall((x, y)) {
                    continue;
                }
                let vertical = !self.is_wall((x, y - 1)) && !self.is_wall((x, y + 1));
                let horizontal = !self.is_wall((x - 1, y)) && !self.is_wall((x + 1, y));
                if vertical || horizontal {
                    removable.push((x, y));
                }
            }
        }
        let count = (removable.len() / 7).max(1).min(removable.len());
        for &cell in removable.choose_multiple(rng, count) {
            self.open(cell);
        }
    }

    fn carve_direct_path(&mut self) {
        let (mut x, mut y) = self.start;
        let (ex, ey) = self.end;
        self.open((x, y));
        while y != ey {
            y = if y < ey { y + 1 } else { y - 1 };
            self.open((x, y));
        }
        while x != ex {
            x = if x < ex { x + 1 } else { x - 1 };
            self.open((x, y));
        }
    }

    /// Open 4-neighbours of `cell`.
    pub fn neighbours(&self, (x, y): Cell) -> impl Iterator<Item = Cell> + '_ {
        [(1i64, 0i64), (0, 1), (-1, 0), (0, -1)]
            .into_iter()
            .filter_map(move |(dx, dy)| {
                let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                if nx < 0 || ny < 0 || nx >= self.width as i64 || ny >= self.height as i64 {
                    return None;
                }
                let next = (nx as usize, ny as usize);
                (!self.is_wall(next)).then_some(next)
            })
    }

    /// Breadth-first search from start to end.
    pub fn search(&self) -> Search {
        let index = |(x, y): Cell| y * self.width + x;
        let mut parent: Vec<Option<Cell>> = vec![None; self.width * self.height];
        let mut seen = vec![false; self.width * self.height];
        let mut queue = VecDeque::from([self.start]);
        let mut visit_order = Vec::new();
        seen[index(self.start)] = true;

        while let Some(cell) = queue.pop_front() {
            visit_order.push(cell);
            if cell == self.end {
                let mut path = vec![cell];
                let mut cursor = cell;
                while let Some(prev) = parent[index(cursor)] {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return Search { visit_order, path };
            }
            for next in self.neighbours(cell) {
                if !seen[index(next)] {
                    seen[index(next)] = true;
                    parent[index(next)] = Some(cell);
                    queue.push_back(next);
                }
            }
        }
        Search {
            visit_order,
            path: Vec::new(),
        }
    }
}

/// Even coordinate in the middle half of `side`, kept on the lattice.
fn inner_even(side: usize, rng: &mut StdRng) -> usize {
    let v = rng.gen_range(side / 4..=3 * side / 4);
    let v = v - v % 2;
    let last = (side - 3) - (side - 3) % 2;
    v.clamp(2, last)
}

/// Recorded breadth-first search.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Search {
    /// Cells in the order they were dequeued, ending at the goal.
    pub visit_order: Vec<Cell>,
    /// Shortest path from start to end inclusive; empty when unreachable.
    pub path: Vec<Cell>,
}

/// Maze generation followed by an animated breadth-first search.
#[derive(Debug, Clone)]
pub struct MazeEffect {
    config: MazeConfig,
    maze: Maze,
    search: Search,
    choreo: Choreography,
    width: usize,
    height: usize,
}

impl MazeEffect {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.display.validate()?;
        config.maze.validate()?;
        let (gw, gh) = (
            config.display.width / config.maze.cell_size,
            config.display.height / config.maze.cell_size,
        );
        if gw < MIN_GRID || gh < MIN_GRID {
            return Err(LedMatrixError::config(format!(
                "maze grid {gw}x{gh} is smaller than {MIN_GRID}x{MIN_GRID}"
            )));
        }
        let mut effect = Self {
            config: config.maze.clone(),
            maze: Maze::generate(MIN_GRID, MIN_GRID, &mut seeded_rng(0)),
            search: Search::default(),
            choreo: Choreography::new(Vec::new(), config.maze.steps_per_second),
            width: 0,
            height: 0,
        };
        effect.reset(config.display.width, config.display.height, 0);
        Ok(effect)
    }

    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    pub fn search(&self) -> &Search {
        &self.search
    }

    fn search_steps(&self) -> usize {
        self.search.visit_order.len().div_ceil(self.config.visits_per_step)
    }

    fn revealed(&self, pos: &SegmentPosition) -> usize {
        let step = (pos.local_time * self.config.steps_per_second).round() as usize;
        ((step + 1) * self.config.visits_per_step).min(self.search.visit_order.len())
    }

    fn render(&self, pos: &SegmentPosition) -> Canvas {
        let mut canvas = Canvas::filled(self.width, self.height, FLOOR);
        let size = self.config.cell_size;
        let paint = |canvas: &mut Canvas, (x, y): Cell, color: Rgb| {
            let (px, py) = ((x * size) as f32, (y * size) as f32);
            canvas.fill_rect(px, py, px + size as f32 - 1.0, py + size as f32 - 1.0, color);
        };
        for y in 0..self.maze.height() {
            for x in 0..self.maze.width() {
                if self.maze.is_wall((x, y)) {
                    paint(&mut canvas, (x, y), WALL);
                }
            }
        }
        let (highlight, color): (&[Cell], Rgb) = match pos.name.as_str() {
            "searching" => (&self.search.visit_order[..self.revealed(pos)], SEARCHED),
            "explored" => (self.search.visit_order.as_slice(), SEARCHED),
            _ => (self.search.path.as_slice(), PATH),
        };
        for &cell in highlight {
            if cell != self.maze.start() && cell != self.maze.end() {
                paint(&mut canvas, cell, color);
            }
        }
        paint(&mut canvas, self.maze.start(), START);
        paint(&mut canvas, self.maze.end(), END);
        canvas
    }
}

impl Effect for MazeEffect {
    fn id(&self) -> &'static str {
        ID
    }

    fn family(&self) -> EffectFamily {
        EffectFamily::Stepwise
    }

    fn reset(&mut self, width: usize, height: usize, seed: u64) {
        let mut rng = seeded_rng(seed);
        let size = self.config.cell_size;
        let (gw, gh) = ((width / size).max(MIN_GRID), (height / size).max(MIN_GRID));
        self.maze = Maze::generate(gw, gh, &mut rng);
        self.search = self.maze.search();
        let sps = self.config.steps_per_second;
        self.choreo = Choreography::new(
            vec![
                Segment::new("searching", self.search_steps() as f32 / sps),
                Segment::new("explored", self.config.explored_hold_secs),
                Segment::new("path", self.config.path_hold_secs),
            ],
            sps,
        );
        self.width = width;
        self.height = height;
        tracing::debug!(
            visited = self.search.visit_order.len(),
            path = self.search.path.len(),
            "maze generated"
        );
    }

    fn advance(&mut self, dt: f32) -> Step {
        self.choreo.advance(sanitize_dt(dt));
        match self.choreo.position() {
            Some(pos) => Step::Frame(self.render(&pos).into_frame()),
            None => Step::Done,
        }
    }

    fn segment(&self) -> Option<SegmentPosition> {
        self.choreo.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::testing::{assert_zero_dt_is_idempotent, run_to_done};

    fn small_config(side: usize) -> AppConfig {
        let mut config = AppConfig::default();
        config.display.width = side;
        config.display.height = side;
        config
    }

    fn distances(maze: &Maze) -> Vec<Option<usize>> {
        let mut dist = vec![None; maze.width() * maze.height()];
        let (sx, sy) = maze.start();
        dist[sy * maze.width() + sx] = Some(0);
        let mut queue = VecDeque::from([maze.start()]);
        while let Some((x, y)) = queue.pop_front() {
            let d = dist[y * maze.width() + x].unwrap_or(0);
            for (nx, ny) in maze.neighbours((x, y)) {
                if dist[ny * maze.width() + nx].is_none() {
                    dist[ny * maze.width() + nx] = Some(d + 1);
                    queue.push_back((nx, ny));
                }
            }
        }
        dist
    }

    fn adjacent(a: Cell, b: Cell) -> bool {
        a.0.abs_diff(b.0) + a.1.abs_diff(b.1) == 1
    }

    #[test]
    fn border_stays_solid() {
        let maze = Maze::generate(21, 17, &mut seeded_rng(9));
        for x in 0..21 {
            assert!(maze.is_wall((x, 0)) && maze.is_wall((x, 16)));
        }
        for y in 0..17 {
            assert!(maze.is_wall((0, y)) && maze.is_wall((20, y)));
        }
    }

    #[test]
    fn visits_grow_from_the_start() {
        let maze = Maze::generate(64, 64, &mut seeded_rng(11));
        let search = maze.search();
        assert_eq!(search.visit_order.first(), Some(&maze.start()));
        for (i, &cell) in search.visit_order.iter().enumerate().skip(1) {
            assert!(
                search.visit_order[..i].iter().any(|&prev| adjacent(prev, cell)),
                "{cell:?} has no earlier neighbour"
            );
        }
        assert_eq!(search.visit_order.last(), Some(&maze.end()));
    }

    #[test]
    fn ten_by_ten_path_is_shortest() {
        let maze = Maze::generate(10, 10, &mut seeded_rng(42));
        let search = maze.search();
        let dist = distances(&maze);
        let (ex, ey) = maze.end();
        let shortest = dist[ey * maze.width() + ex].expect("end is reachable");
        assert_eq!(search.path.len(), shortest + 1);
        assert_eq!(search.path.first(), Some(&maze.start()));
        assert_eq!(search.path.last(), Some(&maze.end()));
        for pair in search.path.windows(2) {
            assert!(adjacent(pair[0], pair[1]));
            assert!(!maze.is_wall(pair[1]));
        }
    }

    #[test]
    fn end_is_always_reachable() {
        for seed in 0..20 {
            let maze = Maze::generate(16, 12, &mut seeded_rng(seed));
            assert!(!maze.search().path.is_empty(), "seed {seed}");
        }
    }

    #[test]
    fn tiny_panels_are_rejected() {
        assert!(MazeEffect::new(&small_config(4)).unwrap_err().is_config_error());
    }

    #[test]
    fn phases_run_in_order_then_finish() {
        let mut effect = MazeEffect::new(&small_config(16)).unwrap();
        effect.reset(16, 16, 5);
        assert_eq!(effect.segment().map(|p| p.name), Some("searching".to_string()));
        let dt = 1.0 / 60.0;
        let mut names: Vec<String> = Vec::new();
        loop {
            if effect.advance(dt).is_done() {
                break;
            }
            if let Some(pos) = effect.segment() {
                if names.last() != Some(&pos.name) {
                    names.push(pos.name);
                }
            }
        }
        assert_eq!(names.last().map(String::as_str), Some("path"));
        assert!(names.iter().any(|n| n == "explored"));
    }

    #[test]
    fn final_frames_show_the_path() {
        let mut effect = MazeEffect::new(&small_config(32)).unwrap();
        effect.reset(32, 32, 8);
        let dt = 1.0 / 60.0;
        let mut last = None;
        while let Step::Frame(frame) = effect.advance(dt) {
            last = Some(frame);
        }
        let frame = last.expect("at least one frame");
        for &(x, y) in &effect.search().path {
            if (x, y) != effect.maze().start() && (x, y) != effect.maze().end() {
                assert_eq!(frame.pixel(x, y), Some(PATH));
            }
        }
        let (sx, sy) = effect.maze().start();
        assert_eq!(frame.pixel(sx, sy), Some(START));
    }

    #[test]
    fn run_is_bounded() {
        let mut effect = MazeEffect::new(&AppConfig::default()).unwrap();
        effect.reset(64, 64, 2);
        run_to_done(&mut effect, 1.0 / 30.0, 100_000);
    }

    #[test]
    fn zero_delta_is_idempotent() {
        let mut effect = MazeEffect::new(&small_config(24)).unwrap();
        effect.reset(24, 24, 3);
        effect.advance(0.1);
        assert_zero_dt_is_idempotent(&mut effect);
    }
}
