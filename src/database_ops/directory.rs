//! Read side of the directory: the queries behind the three GET endpoints and
//! the reshaping of their rows into the nested objects clients receive.

use crate::database_ops::filters::{push_where, split_names, NameFilter, ALL};
use bigdecimal::{BigDecimal, ToPrimitive};
use indexmap::IndexSet;
use serde::Serialize;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

const SUBCATEGORY_PAIRS_SQL: &str = "SELECT sc.name AS subcategory, c.name AS category \
     FROM subcategories sc \
     JOIN categories c ON c.id = sc.category_id";

const PLACE_JOINS_SQL: &str = " FROM restaurants r \
     JOIN restaurant_category rc ON r.id = rc.restaurant_id \
     JOIN categories c ON rc.category_id = c.id \
     JOIN restaurant_subcategory rs ON r.id = rs.restaurant_id \
     JOIN subcategories s ON rs.subcategory_id = s.id";

const PLACE_DETAIL_COLUMNS: &str = "SELECT r.nombre, c.name AS category, s.name AS subcategory, \
     r.latitud, r.longitud, r.descripcion, r.pais, r.municipio, r.departamento, r.direccion, \
     r.telefono, r.email, r.url, r.red_social, r.image, r.resena, r.hora_apertura, r.menu, \
     r.destacado";

/// Rows plus the count reported as `ntotal`.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    pub data: Vec<T>,
    pub ntotal: usize,
}

/// What `get_categories` was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryScope {
    /// No parameter: one object per category.
    Grouped,
    /// `ALL`: one aggregate object over every category.
    All,
    /// Explicit list: one aggregate object over the listed categories.
    Only(Vec<String>),
}

impl CategoryScope {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") => CategoryScope::Grouped,
            Some(ALL) => CategoryScope::All,
            Some(list) => CategoryScope::Only(split_names(list)),
        }
    }

    pub fn filter(&self) -> NameFilter {
        match self {
            CategoryScope::Grouped | CategoryScope::All => NameFilter::All,
            CategoryScope::Only(names) => NameFilter::Only(names.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SubcategoryPair {
    pub subcategory: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGroup {
    pub category: String,
    pub subcategories: IndexSet<String>,
    pub n: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryAggregate {
    pub category: Vec<String>,
    pub n: usize,
    pub subcategories: IndexSet<String>,
}

/// The grouped and aggregate branches answer with different object shapes;
/// both are kept as-is for existing consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CategoryEntry {
    Group(CategoryGroup),
    Aggregate(CategoryAggregate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceNames {
    pub places: IndexSet<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlaceDetailRow {
    pub nombre: String,
    pub category: String,
    pub subcategory: String,
    pub latitud: Option<BigDecimal>,
    pub longitud: Option<BigDecimal>,
    pub descripcion: String,
    pub pais: Option<String>,
    pub municipio: Option<String>,
    pub departamento: Option<String>,
    pub direccion: Option<String>,
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

/// One restaurant/category/subcategory combination as served by `get_info_place`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceDetail {
    pub display_name: String,
    pub category: String,
    pub subcategories: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub desc: String,
    pub country: Option<String>,
    pub department: Option<String>,
    pub municipality: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
    pub red_social: Option<String>,
    pub image: Option<String>,
    pub review: Option<String>,
    pub open_hour: Option<String>,
    pub menu: Option<String>,
    pub featured: Option<i16>,
}

fn coordinate(value: Option<BigDecimal>) -> Option<f64> {
    value.and_then(|d| d.to_f64())
}

impl From<PlaceDetailRow> for PlaceDetail {
    fn from(row: PlaceDetailRow) -> Self {
        Self {
            display_name: row.nombre,
            category: row.category,
            subcategories: row.subcategory,
            lat: coordinate(row.latitud),
            lon: coordinate(row.longitud),
            desc: row.descripcion,
            country: row.pais,
            department: row.departamento,
            municipality: row.municipio,
            address: row.direccion,
            phone: row.telefono,
            email: row.email,
            url: row.url,
            red_social: row.red_social,
            image: row.image,
            review: row.resena,
            open_hour: row.hora_apertura,
            menu: row.menu,
            featured: row.destacado,
        }
    }
}

fn subcategory_pairs_query(filter: &NameFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(SUBCATEGORY_PAIRS_SQL);
    push_where(&mut qb, &[("c.name", filter)]);
    qb.push(" ORDER BY sc.id");
    qb
}

fn place_names_query(
    categories: &NameFilter,
    subcategories: &NameFilter,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT r.nombre");
    qb.push(PLACE_JOINS_SQL);
    push_where(&mut qb, &[("c.name", categories), ("s.name", subcategories)]);
    qb.push(" ORDER BY r.id");
    qb
}

fn place_details_query(
    places: &NameFilter,
    categories: &NameFilter,
    subcategories: &NameFilter,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(PLACE_DETAIL_COLUMNS);
    qb.push(PLACE_JOINS_SQL);
    push_where(
        &mut qb,
        &[
            ("c.name", categories),
            ("s.name", subcategories),
            ("r.nombre", places),
        ],
    );
    qb.push(" ORDER BY r.id, s.id");
    qb
}

/// One object per category, categories sorted by name, subcategories in row order.
pub fn group_by_category(rows: Vec<SubcategoryPair>) -> Listing<CategoryEntry> {
    let mut groups: BTreeMap<String, IndexSet<String>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.category).or_default().insert(row.subcategory);
    }

    let ntotal = groups.values().map(IndexSet::len).sum();
    let data = groups
        .into_iter()
        .map(|(category, subcategories)| {
            CategoryEntry::Group(CategoryGroup {
                n: subcategories.len(),
                category,
                subcategories,
            })
        })
        .collect();
    Listing { data, ntotal }
}

/// A single object covering every row. `category` echoes the requested list,
/// or the categories actually present when everything was requested.
pub fn aggregate_categories(rows: Vec<SubcategoryPair>, scope: &CategoryScope) -> Listing<CategoryEntry> {
    let mut present: IndexSet<String> = IndexSet::new();
    let mut subcategories: IndexSet<String> = IndexSet::new();
    for row in rows {
        present.insert(row.category);
        subcategories.insert(row.subcategory);
    }

    let category = match scope {
        CategoryScope::Only(requested) => requested.clone(),
        CategoryScope::All | CategoryScope::Grouped => present.into_iter().collect(),
    };
    let n = subcategories.len();
    Listing {
        data: vec![CategoryEntry::Aggregate(CategoryAggregate {
            category,
            n,
            subcategories,
        })],
        ntotal: n,
    }
}

pub fn distinct_places(names: Vec<String>) -> Listing<PlaceNames> {
    let places: IndexSet<String> = names.into_iter().collect();
    let ntotal = places.len();
    Listing {
        data: vec![PlaceNames { places }],
        ntotal,
    }
}

#[instrument(skip(conn))]
pub async fn categories(
    conn: &mut PgConnection,
    scope: &CategoryScope,
) -> Result<Listing<CategoryEntry>, sqlx::Error> {
    let mut qb = subcategory_pairs_query(&scope.filter());
    let rows: Vec<SubcategoryPair> = qb.build_query_as().fetch_all(&mut *conn).await?;
    debug!(rows = rows.len(), "fetched subcategory pairs");

    Ok(match scope {
        CategoryScope::Grouped => group_by_category(rows),
        CategoryScope::All | CategoryScope::Only(_) => aggregate_categories(rows, scope),
    })
}

#[instrument(skip(conn))]
pub async fn places(
    conn: &mut PgConnection,
    categories: &NameFilter,
    subcategories: &NameFilter,
) -> Result<Listing<PlaceNames>, sqlx::Error> {
    let mut qb = place_names_query(categories, subcategories);
    let names: Vec<String> = qb.build_query_scalar().fetch_all(&mut *conn).await?;
    debug!(rows = names.len(), "fetched place names");
    Ok(distinct_places(names))
}

#[instrument(skip(conn))]
pub async fn place_details(
    conn: &mut PgConnection,
    places: &NameFilter,
    categories: &NameFilter,
    subcategories: &NameFilter,
) -> Result<Listing<PlaceDetail>, sqlx::Error> {
    let mut qb = place_details_query(places, categories, subcategories);
    let rows: Vec<PlaceDetailRow> = qb.build_query_as().fetch_all(&mut *conn).await?;
    let data: Vec<PlaceDetail> = rows.into_iter().map(PlaceDetail::from).collect();
    Ok(Listing {
        ntotal: data.len(),
        data,
    })
}
