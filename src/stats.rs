//! `dqa status` command implementation.

use crate::config::Config;
use crate::store::VectorStore;
use crate::Result;

/// Print index counts and database details.
pub async fn run_status(config: &Config) -> Result<()> {
    let store = VectorStore::open(&config.db.path).await?;
    let status = store.status().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Index status");
    println!("============");
    println!("Database:        {}", config.db.path.display());
    println!("Size:            {}", format_bytes(db_size));
    println!("Documents:       {}", status.documents);
    println!("Chunks:          {}", status.entries);
    println!(
        "Embedding model: {}",
        status.embedding_model.as_deref().unwrap_or("none")
    );

    store.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
