// Directory schema. Column names of `restaurants` are the persisted contract
// shared with data loaded by earlier tooling, so they stay as they are.

use anyhow::{Context, Result};
use sqlx::PgConnection;
use tracing::info;

pub const TABLES: [&str; 5] = [
    "restaurants",
    "categories",
    "subcategories",
    "restaurant_category",
    "restaurant_subcategory",
];

// Order matters: referenced tables first.
const DDL: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS restaurants (
        id SERIAL PRIMARY KEY,
        nombre TEXT NOT NULL,
        descripcion TEXT NOT NULL,
        pais TEXT,
        municipio TEXT,
        departamento TEXT,
        direccion TEXT,
        latitud NUMERIC(10, 8),
        longitud NUMERIC(11, 8),
        telefono TEXT,
        email TEXT,
        url TEXT,
        red_social TEXT,
        image TEXT,
        resena TEXT,
        hora_apertura TEXT,
        menu TEXT,
        destacado SMALLINT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id SERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS subcategories (
        id SERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        category_id INT NOT NULL REFERENCES categories (id),
        UNIQUE (name, category_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS restaurant_category (
        restaurant_id INT NOT NULL REFERENCES restaurants (id),
        category_id INT NOT NULL REFERENCES categories (id),
        PRIMARY KEY (restaurant_id, category_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS restaurant_subcategory (
        restaurant_id INT NOT NULL REFERENCES restaurants (id),
        subcategory_id INT NOT NULL REFERENCES subcategories (id),
        PRIMARY KEY (restaurant_id, subcategory_id)
    )
    "#,
];

/// Create the five directory tables if they are missing.
pub async fn create_tables(conn: &mut PgConnection) -> Result<()> {
    for (table, stmt) in TABLES.iter().zip(DDL) {
        sqlx::raw_sql(stmt)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("failed to create table {table}"))?;
    }
    info!(tables = TABLES.len(), "schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_matches_table_order() {
        for (table, stmt) in TABLES.iter().zip(DDL) {
            let needle = format!("CREATE TABLE IF NOT EXISTS {table} (");
            assert!(stmt.contains(&needle), "{table}");
        }
    }

    #[test]
    fn referenced_tables_are_created_first() {
        let position = |t: &str| TABLES.iter().position(|x| *x == t).unwrap();
        assert!(position("categories") < position("subcategories"));
        assert!(position("restaurants") < position("restaurant_category"));
        assert!(position("subcategories") < position("restaurant_subcategory"));
    }
}
