//! Bulk import of the restaurant spreadsheet.
//!
//! The spreadsheet arrives as a delimited-text export that keeps its
//! Spanish headers. Every data row becomes one restaurant linked to exactly
//! one category and one subcategory; categories and subcategories are looked
//! up by name (subcategories scoped to their category) and created on first
//! sight, so re-running the import never duplicates them. Restaurants are
//! always inserted.

use crate::database_ops::db::Db;
use anyhow::{anyhow, Context, Result};
use bigdecimal::BigDecimal;
use clap::ValueEnum;
use serde::Deserialize;
use sqlx::PgConnection;
use std::collections::HashMap;
use std::io::Read;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Headers that must be present before any row is read.
pub const REQUIRED_HEADERS: [&str; 4] = ["categoria", "subcategoria", "nombre", "descripcion"];

/// Cell contents that spreadsheet exports use for "no value".
const NULL_TOKENS: [&str; 6] = ["nan", "NaN", "NaT", "None", "null", "NULL"];

/// One spreadsheet row exactly as exported; every cell may be missing.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SheetRow {
    pub categoria: Option<String>,
    pub subcategoria: Option<String>,
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
    pub pais: Option<String>,
    pub municipio: Option<String>,
    pub departamento: Option<String>,
    pub direccion: Option<String>,
    pub latitud: Option<String>,
    pub longitud: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
    pub red_social: Option<String>,
    pub image: Option<String>,
    pub resena: Option<String>,
    pub hora_apertura: Option<String>,
    pub menu: Option<String>,
    pub destacado: Option<String>,
}

/// A validated row, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct RestaurantRecord {
    pub category: String,
    pub subcategory: String,
    pub nombre: String,
    pub descripcion: String,
    pub pais: Option<String>,
    pub municipio: Option<String>,
    pub departamento: Option<String>,
    pub direccion: Option<String>,
    pub latitud: Option<BigDecimal>,
    pub longitud: Option<BigDecimal>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
    pub red_social: Option<String>,
    pub image: Option<String>,
    pub resena: Option<String>,
    pub hora_apertura: Option<String>,
    pub menu: Option<String>,
    pub destacado: Option<i16>,
}

#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("missing value for required column '{0}'")]
    Missing(&'static str),
    #[error("invalid value {value:?} in column '{column}'")]
    Invalid { column: &'static str, value: String },
    #[error("unreadable row: {0}")]
    Malformed(String),
}

/// Normalize a cell: blank cells and null tokens become `None`.
pub fn clean(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() || NULL_TOKENS.contains(&trimmed) {
        None
    } else {
        Some(value)
    }
}

fn required(column: &'static str, value: Option<String>) -> Result<String, RowError> {
    clean(value).ok_or(RowError::Missing(column))
}

fn parse_decimal(column: &'static str, value: Option<String>) -> Result<Option<BigDecimal>, RowError> {
    let Some(raw) = clean(value) else {
        return Ok(None);
    };
    BigDecimal::from_str(raw.trim())
        .map(Some)
        .map_err(|_| RowError::Invalid { column, value: raw })
}

/// Featured flag: integers, whole floats (`1.0` from numeric columns), and yes/no words.
fn parse_featured(column: &'static str, value: Option<String>) -> Result<Option<i16>, RowError> {
    let Some(raw) = clean(value) else {
        return Ok(None);
    };
    let lowered = raw.trim().to_lowercase();
    match lowered.as_str() {
        "true" | "yes" | "si" | "sí" => return Ok(Some(1)),
        "false" | "no" => return Ok(Some(0)),
        _ => {}
    }
    if let Ok(n) = lowered.parse::<i16>() {
        return Ok(Some(n));
    }
    match lowered.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f >= f64::from(i16::MIN) && f <= f64::from(i16::MAX) => {
            Ok(Some(f as i16))
        }
        _ => Err(RowError::Invalid { column, value: raw }),
    }
}

impl SheetRow {
    pub fn into_record(self) -> Result<RestaurantRecord, RowError> {
        Ok(RestaurantRecord {
            category: required("categoria", self.categoria)?,
            subcategory: required("subcategoria", self.subcategoria)?,
            nombre: required("nombre", self.nombre)?,
            descripcion: required("descripcion", self.descripcion)?,
            pais: clean(self.pais),
            municipio: clean(self.municipio),
            departamento: clean(self.departamento),
            direccion: clean(self.direccion),
            latitud: parse_decimal("latitud", self.latitud)?,
            longitud: parse_decimal("longitud", self.longitud)?,
            telefono: clean(self.telefono),
            email: clean(self.email),
            url: clean(self.url),
            red_social: clean(self.red_social),
            image: clean(self.image),
            resena: clean(self.resena),
            hora_apertura: clean(self.hora_apertura),
            menu: clean(self.menu),
            destacado: parse_featured("destacado", self.destacado)?,
        })
    }
}

/// A data row (1-based, header excluded) and its validation outcome.
#[derive(Debug)]
pub struct ParsedRow {
    pub row: usize,
    pub record: Result<RestaurantRecord, RowError>,
}

/// Read the whole export. Missing required headers fail the read; problems in
/// individual rows are reported per row.
pub fn read_sheet<R: Read>(reader: R, delimiter: u8) -> Result<Vec<ParsedRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = rdr.headers().context("failed to read header row")?.clone();
    let missing: Vec<&str> = REQUIRED_HEADERS
        .iter()
        .copied()
        .filter(|h| !headers.iter().any(|x| x == *h))
        .collect();
    if !missing.is_empty() {
        return Err(anyhow!("spreadsheet is missing required columns: {missing:?}"));
    }

    let rows = rdr
        .deserialize::<SheetRow>()
        .enumerate()
        .map(|(idx, parsed)| ParsedRow {
            row: idx + 1,
            record: parsed
                .map_err(|e| RowError::Malformed(e.to_string()))
                .and_then(SheetRow::into_record),
        })
        .collect();
    Ok(rows)
}

/// How rows are grouped into transactions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum TxMode {
    /// Each row commits on its own; a failing row rolls back alone.
    #[default]
    PerRow,
    /// One transaction for the whole file; any failure rolls everything back.
    Batch,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows_read: usize,
    pub inserted: usize,
    pub rejected: usize,
    pub failed: usize,
    pub categories_created: usize,
    pub subcategories_created: usize,
}

impl LoadSummary {
    /// Counts for a run that only validated the file.
    pub fn validated(rows: &[ParsedRow]) -> Self {
        Self {
            rows_read: rows.len(),
            rejected: rows.iter().filter(|r| r.record.is_err()).count(),
            ..Self::default()
        }
    }
}

/// Committed category/subcategory ids seen during this run.
#[derive(Debug, Default)]
pub struct LookupCache {
    categories: HashMap<String, i32>,
    subcategories: HashMap<(String, i32), i32>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(&self, name: &str) -> Option<i32> {
        self.categories.get(name).copied()
    }

    pub fn subcategory(&self, name: &str, category_id: i32) -> Option<i32> {
        self.subcategories
            .get(&(name.to_owned(), category_id))
            .copied()
    }

    /// Record ids resolved for a row whose transaction is durable.
    fn remember(&mut self, record: &RestaurantRecord, ids: &RowIds) {
        self.categories
            .insert(record.category.clone(), ids.category_id);
        self.subcategories.insert(
            (record.subcategory.clone(), ids.category_id),
            ids.subcategory_id,
        );
    }

    pub fn clear(&mut self) {
        self.categories.clear();
        self.subcategories.clear();
    }
}

/// Ids produced while loading one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowIds {
    pub restaurant_id: i32,
    pub category_id: i32,
    pub subcategory_id: i32,
    pub category_created: bool,
    pub subcategory_created: bool,
}

pub async fn ensure_category(conn: &mut PgConnection, name: &str) -> Result<(i32, bool), sqlx::Error> {
    if let Some(id) = sqlx::query_scalar::<_, i32>("SELECT id FROM categories WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
    {
        debug!(category = %name, category_id = id, "category exists");
        return Ok((id, false));
    }

    let id: i32 = sqlx::query_scalar("INSERT INTO categories (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    debug!(category = %name, category_id = id, "category created");
    Ok((id, true))
}

pub async fn ensure_subcategory(
    conn: &mut PgConnection,
    name: &str,
    category_id: i32,
) -> Result<(i32, bool), sqlx::Error> {
    if let Some(id) = sqlx::query_scalar::<_, i32>(
        "SELECT id FROM subcategories WHERE name = $1 AND category_id = $2",
    )
    .bind(name)
    .bind(category_id)
    .fetch_optional(&mut *conn)
    .await?
    {
        debug!(subcategory = %name, category_id, subcategory_id = id, "subcategory exists");
        return Ok((id, false));
    }

    let id: i32 = sqlx::query_scalar(
        "INSERT INTO subcategories (name, category_id) VALUES ($1, $2) RETURNING id",
    )
    .bind(name)
    .bind(category_id)
    .fetch_one(&mut *conn)
    .await?;
    debug!(subcategory = %name, category_id, subcategory_id = id, "subcategory created");
    Ok((id, true))
}

pub async fn insert_restaurant(
    conn: &mut PgConnection,
    record: &RestaurantRecord,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO restaurants (nombre, descripcion, pais, municipio, departamento, direccion, \
         latitud, longitud, telefono, email, url, red_social, image, resena, hora_apertura, menu, destacado) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
         RETURNING id",
    )
    .bind(&record.nombre)
    .bind(&record.descripcion)
    .bind(&record.pais)
    .bind(&record.municipio)
    .bind(&record.departamento)
    .bind(&record.direccion)
    .bind(&record.latitud)
    .bind(&record.longitud)
    .bind(&record.telefono)
    .bind(&record.email)
    .bind(&record.url)
    .bind(&record.red_social)
    .bind(&record.image)
    .bind(&record.resena)
    .bind(&record.hora_apertura)
    .bind(&record.menu)
    .bind(record.destacado)
    .fetch_one(&mut *conn)
    .await
}

/// Category, subcategory, restaurant and both join rows for one record.
/// The caller owns the transaction.
pub async fn load_record(
    conn: &mut PgConnection,
    cache: &LookupCache,
    record: &RestaurantRecord,
) -> Result<RowIds, sqlx::Error> {
    let (category_id, category_created) = match cache.category(&record.category) {
        Some(id) => (id, false),
        None => ensure_category(conn, &record.category).await?,
    };
    let (subcategory_id, subcategory_created) =
        match cache.subcategory(&record.subcategory, category_id) {
            Some(id) => (id, false),
            None => ensure_subcategory(conn, &record.subcategory, category_id).await?,
        };

    let restaurant_id = insert_restaurant(conn, record).await?;

    sqlx::query("INSERT INTO restaurant_category (restaurant_id, category_id) VALUES ($1, $2)")
        .bind(restaurant_id)
        .bind(category_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        "INSERT INTO restaurant_subcategory (restaurant_id, subcategory_id) VALUES ($1, $2)",
    )
    .bind(restaurant_id)
    .bind(subcategory_id)
    .execute(&mut *conn)
    .await?;

    Ok(RowIds {
        restaurant_id,
        category_id,
        subcategory_id,
        category_created,
        subcategory_created,
    })
}

pub struct Loader {
    db: Db,
    mode: TxMode,
    cache: LookupCache,
}

impl Loader {
    pub fn new(db: Db, mode: TxMode) -> Self {
        Self {
            db,
            mode,
            cache: LookupCache::new(),
        }
    }

    #[instrument(skip(self, rows), fields(mode = ?self.mode, rows = rows.len()))]
    pub async fn run(&mut self, rows: Vec<ParsedRow>) -> Result<LoadSummary> {
        match self.mode {
            TxMode::PerRow => self.run_per_row(rows).await,
            TxMode::Batch => self.run_batch(rows).await,
        }
    }

    async fn run_per_row(&mut self, rows: Vec<ParsedRow>) -> Result<LoadSummary> {
        let mut summary = LoadSummary {
            rows_read: rows.len(),
            ..LoadSummary::default()
        };

        for ParsedRow { row, record } in rows {
            let record = match record {
                Ok(r) => r,
                Err(err) => {
                    warn!(row, error = %err, "row rejected");
                    summary.rejected += 1;
                    continue;
                }
            };

            let mut tx = self
                .db
                .pool
                .begin()
                .await
                .context("failed to open transaction")?;
            match load_record(&mut tx, &self.cache, &record).await {
                Ok(ids) => {
                    tx.commit()
                        .await
                        .with_context(|| format!("failed to commit row {row}"))?;
                    self.cache.remember(&record, &ids);
                    summary.record(&ids);
                }
                Err(err) => {
                    if let Err(rb) = tx.rollback().await {
                        warn!(row, error = %rb, "rollback failed");
                    }
                    warn!(row, nombre = %record.nombre, error = %err, "row failed; rolled back");
                    summary.failed += 1;
                }
            }
        }

        info!(?summary, "load finished");
        Ok(summary)
    }

    async fn run_batch(&mut self, rows: Vec<ParsedRow>) -> Result<LoadSummary> {
        let mut summary = LoadSummary {
            rows_read: rows.len(),
            ..LoadSummary::default()
        };
        let mut tx = self
            .db
            .pool
            .begin()
            .await
            .context("failed to open transaction")?;

        for ParsedRow { row, record } in rows {
            let record = match record {
                Ok(r) => r,
                Err(err) => {
                    warn!(row, error = %err, "row rejected");
                    summary.rejected += 1;
                    continue;
                }
            };

            match load_record(&mut tx, &self.cache, &record).await {
                Ok(ids) => {
                    // Visible to later rows of the same transaction.
                    self.cache.remember(&record, &ids);
                    summary.record(&ids);
                }
                Err(err) => {
                    self.cache.clear();
                    if let Err(rb) = tx.rollback().await {
                        warn!(row, error = %rb, "rollback failed");
                    }
                    return Err(anyhow::Error::new(err).context(format!(
                        "row {row} ({}) failed; batch rolled back",
                        record.nombre
                    )));
                }
            }
        }

        tx.commit().await.context("failed to commit batch")?;
        info!(?summary, "load finished");
        Ok(summary)
    }
}

impl LoadSummary {
    fn record(&mut self, ids: &RowIds) {
        self.inserted += 1;
        if ids.category_created {
            self.categories_created += 1;
        }
        if ids.subcategory_created {
            self.subcategories_created += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "categoria,subcategoria,nombre,descripcion,pais,municipio,departamento,direccion,latitud,longitud,telefono,email,url,red_social,image,resena,hora_apertura,menu,destacado";

    fn sheet(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for r in rows {
            out.push('\n');
            out.push_str(r);
        }
        out
    }

    #[test]
    fn clean_maps_blank_and_null_tokens_to_none() {
        assert_eq!(clean(None), None);
        assert_eq!(clean(Some("".into())), None);
        assert_eq!(clean(Some("   ".into())), None);
        assert_eq!(clean(Some("NaN".into())), None);
        assert_eq!(clean(Some("nan".into())), None);
        assert_eq!(clean(Some("NaT".into())), None);
        assert_eq!(clean(Some(" Café ".into())), Some(" Café ".into()));
    }

    #[test]
    fn reads_a_full_row() {
        let data = sheet(&[
            "Food,Bakery,Café X,Pan fresco,Colombia,Medellín,Antioquia,Cra 1,6.2442,-75.5812,300,a@b.co,https://x.co,@cafex,img.png,Muy bueno,8-18,menu.pdf,1.0",
        ]);
        let rows = read_sheet(data.as_bytes(), b',').unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row, 1);

        let rec = rows[0].record.as_ref().unwrap();
        assert_eq!(rec.category, "Food");
        assert_eq!(rec.subcategory, "Bakery");
        assert_eq!(rec.nombre, "Café X");
        assert_eq!(rec.municipio.as_deref(), Some("Medellín"));
        assert_eq!(rec.latitud, Some(BigDecimal::from_str("6.2442").unwrap()));
        assert_eq!(rec.destacado, Some(1));
    }

    #[test]
    fn optional_cells_may_be_empty_or_nan() {
        let data = sheet(&["Food,Bakery,Café X,Pan,,,,,nan,,NaN,,,,,,,,"]);
        let rows = read_sheet(data.as_bytes(), b',').unwrap();
        let rec = rows[0].record.as_ref().unwrap();
        assert_eq!(rec.pais, None);
        assert_eq!(rec.latitud, None);
        assert_eq!(rec.telefono, None);
        assert_eq!(rec.destacado, None);
    }

    #[test]
    fn rows_without_category_are_rejected() {
        let data = sheet(&[
            ",Bakery,Café X,Pan,,,,,,,,,,,,,,,",
            "Food,Bakery,Café Y,Pan,,,,,,,,,,,,,,,",
        ]);
        let rows = read_sheet(data.as_bytes(), b',').unwrap();
        assert_eq!(rows[0].record, Err(RowError::Missing("categoria")));
        assert!(rows[1].record.is_ok());
        let summary = LoadSummary::validated(&rows);
        assert_eq!(summary.rows_read, 2);
        assert_eq!(summary.rejected, 1);
    }

    #[test]
    fn bad_coordinates_are_rejected() {
        let data = sheet(&["Food,Bakery,Café X,Pan,,,,,north,,,,,,,,,,"]);
        let rows = read_sheet(data.as_bytes(), b',').unwrap();
        assert_eq!(
            rows[0].record,
            Err(RowError::Invalid {
                column: "latitud",
                value: "north".into()
            })
        );
    }

    #[test]
    fn ragged_rows_are_malformed() {
        let data = sheet(&["Food,Bakery"]);
        let rows = read_sheet(data.as_bytes(), b',').unwrap();
        assert!(matches!(rows[0].record, Err(RowError::Malformed(_))));
    }

    #[test]
    fn missing_required_header_fails_early() {
        let data = "categoria,nombre\nFood,Café X";
        let err = read_sheet(data.as_bytes(), b',').unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("subcategoria"), "{msg}");
        assert!(msg.contains("descripcion"), "{msg}");
    }

    #[test]
    fn optional_headers_may_be_absent_and_delimiter_is_configurable() {
        let data = "categoria;subcategoria;nombre;descripcion\nFood;Bakery;Café X;Pan";
        let rows = read_sheet(data.as_bytes(), b';').unwrap();
        let rec = rows[0].record.as_ref().unwrap();
        assert_eq!(rec.nombre, "Café X");
        assert_eq!(rec.email, None);
    }

    #[test]
    fn featured_flag_forms() {
        let parse = |v: &str| parse_featured("destacado", Some(v.to_string()));
        assert_eq!(parse("1"), Ok(Some(1)));
        assert_eq!(parse("0.0"), Ok(Some(0)));
        assert_eq!(parse("TRUE"), Ok(Some(1)));
        assert_eq!(parse("Sí"), Ok(Some(1)));
        assert_eq!(parse("no"), Ok(Some(0)));
        assert_eq!(parse("nan"), Ok(None));
        assert!(parse("1.5").is_err());
        assert!(parse("maybe").is_err());
    }

    #[test]
    fn cache_tracks_committed_ids() {
        let mut cache = LookupCache::new();
        let rec = SheetRow {
            categoria: Some("Food".into()),
            subcategoria: Some("Bakery".into()),
            nombre: Some("Café X".into()),
            descripcion: Some("Pan".into()),
            ..SheetRow::default()
        }
        .into_record()
        .unwrap();
        let ids = RowIds {
            restaurant_id: 1,
            category_id: 7,
            subcategory_id: 9,
            category_created: true,
            subcategory_created: true,
        };
        cache.remember(&rec, &ids);
        assert_eq!(cache.category("Food"), Some(7));
        assert_eq!(cache.subcategory("Bakery", 7), Some(9));
        assert_eq!(cache.subcategory("Bakery", 8), None);

        let mut summary = LoadSummary::default();
        summary.record(&ids);
        summary.record(&RowIds {
            category_created: false,
            subcategory_created: false,
            ..ids
        });
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.categories_created, 1);
        assert_eq!(summary.subcategories_created, 1);

        cache.clear();
        assert_eq!(cache.category("Food"), None);
    }

    #[test]
    fn dry_run_summary_counts_rejections() {
        let data = sheet(&[
            "Food,Bakery,Café X,Pan,,,,,,,,,,,,,,,",
            ",Bakery,Sin categoria,Pan,,,,,,,,,,,,,,,",
        ]);
        let rows = read_sheet(data.as_bytes(), b',').unwrap();
        let summary = LoadSummary::validated(&rows);
        assert_eq!(summary.rows_read, 2);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.inserted, 0);
    }
}
