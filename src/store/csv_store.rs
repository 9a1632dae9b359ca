use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::app::ports::DrawStore;
use crate::common::error::{Result, ScraperError};
use crate::common::types::{DrawRow, GameConfig};

/// One game's draw history as a CSV file
#[derive(Debug, Clone)]
pub struct CsvDrawStore {
    path: PathBuf,
    columns: [&'static str; 4],
}

impl CsvDrawStore {
    /// A store at `path` with the column schema of `game`
    pub fn new(path: impl Into<PathBuf>, game: &GameConfig) -> Self {
        Self {
            path: path.into(),
            columns: game.columns(),
        }
    }

    /// The game's store under `data_dir`, named by the per-game convention
    pub fn for_game(data_dir: &Path, game: &GameConfig) -> Self {
        Self::new(data_dir.join(game.csv_file), game)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DrawStore for CsvDrawStore {
    fn load(&self) -> Result<Vec<DrawRow>> {
        if !self.path.exists() {
            debug!("No store at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        // Columns missing from the file read as empty strings
        let index: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|col| headers.iter().position(|h| h.trim() == *col))
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |i: usize| {
                index[i]
                    .and_then(|idx| record.get(idx))
                    .unwrap_or("")
                    .trim()
                    .to_string()
            };
            rows.push(DrawRow {
                draw_date: field(0),
                white_balls: field(1),
                special_ball: field(2),
                jackpot: field(3),
            });
        }

        info!("Loaded {} rows from {}", rows.len(), self.path.display());
        Ok(rows)
    }

    fn replace(&self, rows: &[DrawRow]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        // Write next to the target so the final rename stays on one filesystem
        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
            writer.write_record(self.columns)?;
            for row in rows {
                writer.write_record([
                    row.draw_date.as_str(),
                    row.white_balls.as_str(),
                    row.special_ball.as_str(),
                    row.jackpot.as_str(),
                ])?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| ScraperError::Persist {
            path: self.path.display().to_string(),
            source: e.error,
        })?;

        info!("Wrote {} rows to {}", rows.len(), self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
