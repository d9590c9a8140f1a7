#[derive(Debug, Default)]
pub struct Stats {
    n_raw_rows: usize,
    n_records: usize,
    n_skipped_rows: usize,
    n_rate_fetches: usize,
}

impl Stats {
    pub fn inc_raw_rows(&mut self) {
        self.n_raw_rows += 1;
    }

    pub fn inc_records(&mut self) {
        self.n_records += 1;
    }

    pub fn inc_skipped(&mut self) {
        self.n_skipped_rows += 1;
    }

    pub fn add_rate_fetches(&mut self, count: usize) {
        self.n_rate_fetches += count;
    }

    pub fn raw_rows(&self) -> usize {
        self.n_raw_rows
    }

    pub fn records(&self) -> usize {
        self.n_records
    }

    pub fn skipped(&self) -> usize {
        self.n_skipped_rows
    }

    pub fn rate_fetches(&self) -> usize {
        self.n_rate_fetches
    }

    pub fn pretty_print(&self) {
        eprintln!("{self:#?}");
        eprintln!();
    }
}
