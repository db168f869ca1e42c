//! Журнал предсказаний в SQLite (только добавление)

use std::path::Path;

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::types::{HouseFeatures, PredictionRecord};

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS predictions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        area FLOAT NOT NULL,
        bedrooms INTEGER NOT NULL,
        bathrooms REAL NOT NULL,
        stories INTEGER NOT NULL,
        mainroad INTEGER NOT NULL,
        guestroom INTEGER NOT NULL,
        basement INTEGER NOT NULL,
        hotwaterheating INTEGER NOT NULL,
        airconditioning INTEGER NOT NULL,
        parking INTEGER NOT NULL,
        prefarea INTEGER NOT NULL,
        furnishingstatus TEXT NOT NULL,
        predicted_price REAL NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )";

pub struct PredictionLog {
    conn: Connection,
}

impl PredictionLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(CREATE_TABLE, [])?;
        tracing::info!("Prediction log initialized");
        Ok(Self { conn })
    }

    /// Добавляет строку и возвращает её id
    pub fn append(&self, name: &str, features: &HouseFeatures, predicted_price: f64) -> Result<i64> {
        let created_at = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.conn.execute(
            "INSERT INTO predictions (
                name, area, bedrooms, bathrooms, stories, mainroad, guestroom,
                basement, hotwaterheating, airconditioning, parking, prefarea,
                furnishingstatus, predicted_price, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                name,
                features.area,
                features.bedrooms,
                features.bathrooms,
                features.stories,
                features.mainroad,
                features.guestroom,
                features.basement,
                features.hotwaterheating,
                features.airconditioning,
                features.parking,
                features.prefarea,
                features.furnishingstatus,
                predicted_price,
                created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Последние записи, новые первыми
    pub fn recent(&self, limit: usize) -> Result<Vec<PredictionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, area, bedrooms, bathrooms, stories, mainroad, guestroom,
                    basement, hotwaterheating, airconditioning, parking, prefarea,
                    furnishingstatus, predicted_price, created_at
             FROM predictions ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(PredictionRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                features: HouseFeatures {
                    area: row.get(2)?,
                    bedrooms: row.get(3)?,
                    bathrooms: row.get(4)?,
                    stories: row.get(5)?,
                    mainroad: row.get(6)?,
                    guestroom: row.get(7)?,
                    basement: row.get(8)?,
                    hotwaterheating: row.get(9)?,
                    airconditioning: row.get(10)?,
                    parking: row.get(11)?,
                    prefarea: row.get(12)?,
                    furnishingstatus: row.get(13)?,
                },
                predicted_price: row.get(14)?,
                created_at: row.get(15)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> HouseFeatures {
        HouseFeatures {
            area: 7420.0,
            bedrooms: 4,
            bathrooms: 2.0,
            stories: 3,
            mainroad: true,
            guestroom: false,
            basement: false,
            hotwaterheating: false,
            airconditioning: true,
            parking: 2,
            prefarea: true,
            furnishingstatus: "furnished".to_string(),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let log = PredictionLog::open_in_memory().unwrap();
        assert_eq!(log.count().unwrap(), 0);

        let first = log.append("Alice", &features(), 13300000.0).unwrap();
        let second = log.append("Anonymous", &features(), 9100000.5).unwrap();
        assert!(second > first);
        assert_eq!(log.count().unwrap(), 2);

        let recent = log.recent(10).unwrap();
        assert_eq!(recent[0].name, "Anonymous");
        assert_eq!(recent[0].predicted_price, 9100000.5);
        assert_eq!(recent[1].features, features());
        assert!(!recent[1].created_at.is_empty());
    }

    #[test]
    fn test_log_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("predictions.db");

        PredictionLog::open(&path).unwrap().append("Bob", &features(), 1.0).unwrap();
        let reopened = PredictionLog::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
