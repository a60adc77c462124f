#[derive(Debug, Default, Clone)]
pub struct ArgKminTelemetry {
    /// True when the parallel loop ran over query tiles, false when it ran
    /// over reference tiles.
    pub parallel_on_queries: bool,
    pub x_tiles: usize,
    pub y_tiles: usize,
    pub tile_pairs: usize,
    pub threads: usize,
    /// Effective tile row count after the floor clamp.
    pub chunk_rows: usize,
    pub exact_pass: bool,
}

impl ArgKminTelemetry {
    pub fn record_dispatch(
        &mut self,
        parallel_on_queries: bool,
        x_tiles: usize,
        y_tiles: usize,
        threads: usize,
        chunk_rows: usize,
    ) {
        self.parallel_on_queries = parallel_on_queries;
        self.x_tiles = x_tiles;
        self.y_tiles = y_tiles;
        self.tile_pairs = x_tiles * y_tiles;
        self.threads = threads;
        self.chunk_rows = chunk_rows;
    }

    pub fn record_exact_pass(&mut self) {
        self.exact_pass = true;
    }

    pub fn add_from(&mut self, other: &ArgKminTelemetry) {
        self.parallel_on_queries |= other.parallel_on_queries;
        self.x_tiles += other.x_tiles;
        self.y_tiles += other.y_tiles;
        self.tile_pairs += other.tile_pairs;
        self.threads = self.threads.max(other.threads);
        self.chunk_rows = self.chunk_rows.max(other.chunk_rows);
        self.exact_pass |= other.exact_pass;
    }
}
