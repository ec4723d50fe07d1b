use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use cukeprobe::config::CacheSettings;
use cukeprobe::{ElementCache, OutputFormat};

use super::print_json;

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show entry count and file size
    Stats,
    /// List cached selectors
    List,
    /// Remove every entry
    Clear,
}

pub fn handle_cache(
    command: CacheCommands,
    settings: &CacheSettings,
    format: OutputFormat,
) -> Result<()> {
    let mut cache = ElementCache::load(&settings.cache_file);

    match command {
        CacheCommands::Stats => {
            let stats = cache.stats();
            match format {
                OutputFormat::Json => print_json(&stats)?,
                OutputFormat::Simple => {
                    println!("Cache file: {}", stats.cache_file.display());
                    println!("Entries: {}", stats.total_entries);
                    println!("Size: {} bytes", stats.cache_size_bytes);
                }
            }
        }
        CacheCommands::List => {
            let entries: Vec<_> = cache.entries().collect();
            match format {
                OutputFormat::Json => print_json(&entries)?,
                OutputFormat::Simple => {
                    for entry in entries {
                        println!(
                            "{} | {} | {}={} ({})",
                            entry.url,
                            entry.element_description,
                            entry.selector_type,
                            entry.selector,
                            entry.source
                        );
                    }
                }
            }
        }
        CacheCommands::Clear => {
            let removed = cache.len();
            cache.clear();
            match format {
                OutputFormat::Json => print_json(&json!({ "cleared": removed }))?,
                OutputFormat::Simple => println!("Cleared {} cache entries", removed),
            }
        }
    }
    Ok(())
}
