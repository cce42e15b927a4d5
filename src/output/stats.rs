//! Statistics of the harvest database

use crate::storage::{Storage, StorageResult};

/// Database statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStatistics {
    pub advertisements: u64,
    pub keywords: u64,

    /// Number of keyword/advertisement associations
    pub tags: u64,

    /// Advertisement counts per engine, ordered by engine name
    pub by_engine: Vec<(String, u64)>,
}

impl DatabaseStatistics {
    /// Average number of tags per advertisement
    pub fn tags_per_advertisement(&self) -> f64 {
        if self.advertisements > 0 {
            self.tags as f64 / self.advertisements as f64
        } else {
            0.0
        }
    }
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<DatabaseStatistics> {
    Ok(DatabaseStatistics {
        advertisements: storage.count_advertisements()?,
        keywords: storage.count_keywords()?,
        tags: storage.count_tags()?,
        by_engine: storage.count_by_source_type()?,
    })
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &DatabaseStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Advertisements: {}", stats.advertisements);
    println!("  Keywords: {}", stats.keywords);
    println!(
        "  Tags: {} ({:.2} per advertisement)",
        stats.tags,
        stats.tags_per_advertisement()
    );
    println!();

    if !stats.by_engine.is_empty() {
        println!("Advertisements by Engine:");
        for (engine, count) in &stats.by_engine {
            let percentage = if stats.advertisements > 0 {
                (*count as f64 / stats.advertisements as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", engine, count, percentage);
        }
        println!();
    }
}
