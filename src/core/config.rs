/// Request-building limits and key formatting shared by every operation.
#[derive(Debug, Clone)]
pub struct Config {
    pub separator: String,               // Between collection name and key segments

    pub max_batch_get_items: usize,      // BatchGetItem
    pub max_batch_write_items: usize,    // BatchWriteItem
    pub max_transact_items: usize,       // TransactGetItems / TransactWriteItems
    pub max_in_values: usize,            // $in operand count

    pub consistent_reads: bool,          // Primary-index reads only
}

impl Default for Config {
    fn default() -> Self {
        Config {
            separator: "|-|".to_string(),
            max_batch_get_items: 100,
            max_batch_write_items: 25,
            max_transact_items: 25,
            max_in_values: 100,
            consistent_reads: false,
        }
    }
}

impl Config {
    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    pub fn with_consistent_reads(mut self, consistent: bool) -> Self {
        self.consistent_reads = consistent;
        self
    }
}
