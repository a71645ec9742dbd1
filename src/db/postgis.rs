// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostGIS facility store.
//!
//! Geometries cross the wire as GeoJSON text: bound through
//! `ST_GeomFromGeoJSON` on the way in and read back with `ST_AsGeoJSON`.
//! Distances are spherical meters on `geography`, so they agree with the
//! in-process store's Haversine distances.

use crate::error::AppError;
use crate::models::building::Information;
use crate::models::geometry::{parse_geometry, StorageGeometry};
use crate::models::{
    Amenity, AmenityCategory, AmenityUpdate, Building, BuildingUpdate, ClosestAmenity, NewAmenity,
    NewBuilding,
};
use chrono::{DateTime, Utc};
use geo::Point;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

/// Rows per INSERT statement during bulk loads.
const BATCH_SIZE: usize = 1000;
const MAX_CONNECTIONS: u32 = 10;

const SCHEMA: &str = include_str!("schema.sql");

const AMENITY_COLUMNS: &str = "a.id, a.osm_id, a.name, a.amenity_type, a.category, a.address, \
     a.opening_hours, ST_AsGeoJSON(a.geometry) AS geometry, a.updated_at, a.updated_by";

const BUILDING_SELECT: &str = "SELECT b.id, b.osm_id, b.information, \
     ST_AsGeoJSON(b.geometry) AS geometry, b.requires_maintenance, b.amenity_id, \
     b.updated_at, b.updated_by, \
     a.osm_id AS a_osm_id, a.name AS a_name, a.amenity_type AS a_amenity_type, \
     a.category AS a_category, a.address AS a_address, a.opening_hours AS a_opening_hours, \
     ST_AsGeoJSON(a.geometry) AS a_geometry, a.updated_at AS a_updated_at, \
     a.updated_by AS a_updated_by \
     FROM buildings b LEFT JOIN amenities a ON a.id = b.amenity_id";

// ─── Row Types ───────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct AmenityRow {
    id: Uuid,
    osm_id: i64,
    name: Option<String>,
    amenity_type: Option<String>,
    category: String,
    address: Option<String>,
    opening_hours: Option<String>,
    geometry: String,
    updated_at: DateTime<Utc>,
    updated_by: Option<String>,
}

impl TryFrom<AmenityRow> for Amenity {
    type Error = AppError;

    fn try_from(row: AmenityRow) -> Result<Self, Self::Error> {
        Ok(Amenity {
            id: row.id,
            osm_id: row.osm_id,
            name: row.name,
            amenity_type: row.amenity_type,
            category: parse_category(&row.category)?,
            address: row.address,
            opening_hours: row.opening_hours,
            geometry: parse_point(&row.geometry)?,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ClosestRow {
    #[sqlx(flatten)]
    amenity: AmenityRow,
    distance_meters: f64,
}

/// Building with its assigned amenity's columns, all nullable from the LEFT JOIN.
#[derive(sqlx::FromRow)]
struct BuildingRow {
    id: Uuid,
    osm_id: i64,
    information: Json<Information>,
    geometry: String,
    requires_maintenance: bool,
    amenity_id: Option<Uuid>,
    updated_at: DateTime<Utc>,
    updated_by: Option<String>,
    a_osm_id: Option<i64>,
    a_name: Option<String>,
    a_amenity_type: Option<String>,
    a_category: Option<String>,
    a_address: Option<String>,
    a_opening_hours: Option<String>,
    a_geometry: Option<String>,
    a_updated_at: Option<DateTime<Utc>>,
    a_updated_by: Option<String>,
}

impl TryFrom<BuildingRow> for Building {
    type Error = AppError;

    fn try_from(row: BuildingRow) -> Result<Self, Self::Error> {
        let amenity = match (
            row.amenity_id,
            row.a_osm_id,
            row.a_category,
            row.a_geometry,
            row.a_updated_at,
        ) {
            (Some(id), Some(osm_id), Some(category), Some(geometry), Some(updated_at)) => {
                Some(Amenity {
                    id,
                    osm_id,
                    name: row.a_name,
                    amenity_type: row.a_amenity_type,
                    category: parse_category(&category)?,
                    address: row.a_address,
                    opening_hours: row.a_opening_hours,
                    geometry: parse_point(&geometry)?,
                    updated_at,
                    updated_by: row.a_updated_by,
                })
            }
            _ => None,
        };

        let geometry = parse_geometry(&row.geometry)
            .and_then(StorageGeometry::into_polygon)
            .map_err(|e| AppError::Database(format!("building {}: {}", row.id, e)))?;

        Ok(Building {
            id: row.id,
            osm_id: row.osm_id,
            information: row.information.0,
            geometry,
            requires_maintenance: row.requires_maintenance,
            amenity_id: row.amenity_id,
            amenity,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        })
    }
}

fn parse_category(label: &str) -> Result<AmenityCategory, AppError> {
    label
        .parse()
        .map_err(|e: crate::models::category::UnknownCategory| AppError::Database(e.to_string()))
}

fn parse_point(geojson: &str) -> Result<Point<f64>, AppError> {
    parse_geometry(geojson)
        .and_then(StorageGeometry::into_point)
        .map_err(|e| AppError::Database(format!("stored amenity geometry: {}", e)))
}

fn collect<R, T>(rows: Vec<R>) -> Result<Vec<T>, AppError>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// PostGIS-backed store.
#[derive(Clone)]
pub struct PostgisStore {
    pool: PgPool,
}

impl PostgisStore {
    /// Open a connection pool.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to PostGIS: {}", e)))?;

        tracing::info!("Connected to PostGIS");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the extension, tables and indexes when they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::debug!("Schema ensured");
        Ok(())
    }

    // ─── Bulk Load ───────────────────────────────────────────────

    pub async fn load_buildings(&self, buildings: &[NewBuilding]) -> Result<u64, AppError> {
        let mut seen = HashSet::new();
        let unique: Vec<&NewBuilding> = buildings
            .iter()
            .filter(|b| seen.insert(b.osm_id))
            .collect();

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in unique.chunks(BATCH_SIZE) {
            let ids: Vec<Uuid> = chunk.iter().map(|_| Uuid::new_v4()).collect();
            let osm_ids: Vec<i64> = chunk.iter().map(|b| b.osm_id).collect();
            let information: Vec<String> = chunk
                .iter()
                .map(|b| serde_json::Value::Object(b.information.clone()).to_string())
                .collect();
            let geometries: Vec<String> = chunk
                .iter()
                .map(|b| StorageGeometry::polygon(b.geometry.clone()).to_geojson_string())
                .collect();

            let result = sqlx::query(
                "INSERT INTO buildings (id, osm_id, information, geometry) \
                 SELECT t.id, t.osm_id, t.information::jsonb, \
                        ST_SetSRID(ST_GeomFromGeoJSON(t.geometry), 4326) \
                 FROM UNNEST($1::uuid[], $2::int8[], $3::text[], $4::text[]) \
                      AS t(id, osm_id, information, geometry) \
                 ON CONFLICT (osm_id) DO NOTHING",
            )
            .bind(&ids)
            .bind(&osm_ids)
            .bind(&information)
            .bind(&geometries)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn load_amenities(&self, amenities: &[NewAmenity]) -> Result<u64, AppError> {
        let mut seen = HashSet::new();
        let unique: Vec<&NewAmenity> = amenities
            .iter()
            .filter(|a| seen.insert(a.osm_id))
            .collect();

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in unique.chunks(BATCH_SIZE) {
            let ids: Vec<Uuid> = chunk.iter().map(|_| Uuid::new_v4()).collect();
            let osm_ids: Vec<i64> = chunk.iter().map(|a| a.osm_id).collect();
            let names: Vec<Option<String>> = chunk.iter().map(|a| a.name.clone()).collect();
            let types: Vec<Option<String>> =
                chunk.iter().map(|a| a.amenity_type.clone()).collect();
            let categories: Vec<String> = chunk
                .iter()
                .map(|a| a.category.label().to_string())
                .collect();
            let addresses: Vec<Option<String>> =
                chunk.iter().map(|a| a.address.clone()).collect();
            let hours: Vec<Option<String>> =
                chunk.iter().map(|a| a.opening_hours.clone()).collect();
            let geometries: Vec<String> = chunk
                .iter()
                .map(|a| StorageGeometry::point(a.geometry).to_geojson_string())
                .collect();

            let result = sqlx::query(
                "INSERT INTO amenities \
                     (id, osm_id, name, amenity_type, category, address, opening_hours, geometry) \
                 SELECT t.id, t.osm_id, t.name, t.amenity_type, t.category, t.address, \
                        t.opening_hours, ST_SetSRID(ST_GeomFromGeoJSON(t.geometry), 4326) \
                 FROM UNNEST($1::uuid[], $2::int8[], $3::text[], $4::text[], $5::text[], \
                             $6::text[], $7::text[], $8::text[]) \
                      AS t(id, osm_id, name, amenity_type, category, address, opening_hours, geometry) \
                 ON CONFLICT (osm_id) DO NOTHING",
            )
            .bind(&ids)
            .bind(&osm_ids)
            .bind(&names)
            .bind(&types)
            .bind(&categories)
            .bind(&addresses)
            .bind(&hours)
            .bind(&geometries)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    // ─── Reads ───────────────────────────────────────────────────

    pub async fn get_buildings(&self) -> Result<Vec<Building>, AppError> {
        let sql = format!("{} ORDER BY b.osm_id", BUILDING_SELECT);
        let rows = sqlx::query_as::<_, BuildingRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    pub async fn get_amenities(&self) -> Result<Vec<Amenity>, AppError> {
        let sql = format!(
            "SELECT {} FROM amenities a ORDER BY a.osm_id",
            AMENITY_COLUMNS
        );
        let rows = sqlx::query_as::<_, AmenityRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    pub async fn get_building(&self, id: Uuid) -> Result<Option<Building>, AppError> {
        let sql = format!("{} WHERE b.id = $1", BUILDING_SELECT);
        sqlx::query_as::<_, BuildingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Building::try_from)
            .transpose()
    }

    pub async fn get_amenity(&self, id: Uuid) -> Result<Option<Amenity>, AppError> {
        let sql = format!("SELECT {} FROM amenities a WHERE a.id = $1", AMENITY_COLUMNS);
        sqlx::query_as::<_, AmenityRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Amenity::try_from)
            .transpose()
    }

    // ─── Mutations ───────────────────────────────────────────────

    pub async fn update_building(
        &self,
        id: Uuid,
        update: &BuildingUpdate,
    ) -> Result<Option<Building>, AppError> {
        let updated: Option<Uuid> = sqlx::query_scalar(
            "UPDATE buildings SET \
                 information = COALESCE($2, information), \
                 requires_maintenance = COALESCE($3, requires_maintenance), \
                 updated_by = COALESCE($4, updated_by), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING id",
        )
        .bind(id)
        .bind(update.information.as_ref().map(Json))
        .bind(update.requires_maintenance)
        .bind(update.updated_by.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(id) => self.get_building(id).await,
            None => Ok(None),
        }
    }

    pub async fn update_amenity(
        &self,
        id: Uuid,
        update: &AmenityUpdate,
    ) -> Result<Option<Amenity>, AppError> {
        let sql = format!(
            "UPDATE amenities AS a SET \
                 name = COALESCE($2, a.name), \
                 amenity_type = COALESCE($3, a.amenity_type), \
                 category = COALESCE($4, a.category), \
                 address = COALESCE($5, a.address), \
                 opening_hours = COALESCE($6, a.opening_hours), \
                 updated_by = COALESCE($7, a.updated_by), \
                 updated_at = now() \
             WHERE a.id = $1 \
             RETURNING {}",
            AMENITY_COLUMNS
        );

        sqlx::query_as::<_, AmenityRow>(&sql)
            .bind(id)
            .bind(update.name.as_deref())
            .bind(update.amenity_type.as_deref())
            .bind(update.category().map(|c| c.label()))
            .bind(update.address.as_deref())
            .bind(update.opening_hours.as_deref())
            .bind(update.updated_by.as_deref())
            .fetch_optional(&self.pool)
            .await?
            .map(Amenity::try_from)
            .transpose()
    }

    pub async fn delete_building(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM buildings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_amenity(&self, id: Uuid) -> Result<bool, AppError> {
        // ON DELETE SET NULL clears referencing buildings in the same statement.
        let result = sqlx::query("DELETE FROM amenities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ─── Spatial Queries ─────────────────────────────────────────

    pub async fn find_contained_amenity(
        &self,
        building_id: Uuid,
    ) -> Result<Option<Amenity>, AppError> {
        let sql = format!(
            "SELECT {} FROM amenities a \
             JOIN buildings b ON ST_Contains(b.geometry, a.geometry) \
             WHERE b.id = $1 \
             ORDER BY a.osm_id, a.id \
             LIMIT 1",
            AMENITY_COLUMNS
        );
        sqlx::query_as::<_, AmenityRow>(&sql)
            .bind(building_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Amenity::try_from)
            .transpose()
    }

    pub async fn amenities_within_radius(
        &self,
        point: Point<f64>,
        radius_meters: f64,
    ) -> Result<Vec<Amenity>, AppError> {
        let sql = format!(
            "SELECT {} FROM amenities a \
             WHERE ST_DWithin(a.geometry::geography, \
                              ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3, false)",
            AMENITY_COLUMNS
        );
        let rows = sqlx::query_as::<_, AmenityRow>(&sql)
            .bind(point.x())
            .bind(point.y())
            .bind(radius_meters)
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    pub async fn set_building_amenity(
        &self,
        building_id: Uuid,
        amenity_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE buildings SET amenity_id = $2 \
             WHERE id = $1 AND EXISTS (SELECT 1 FROM amenities WHERE id = $2)",
        )
        .bind(building_id)
        .bind(amenity_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn fill_building_amenity(
        &self,
        building_id: Uuid,
        amenity_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE buildings SET amenity_id = $2 \
             WHERE id = $1 AND amenity_id IS NULL \
               AND EXISTS (SELECT 1 FROM amenities WHERE id = $2)",
        )
        .bind(building_id)
        .bind(amenity_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ─── Assignment ──────────────────────────────────────────────

    pub async fn assign_closest_amenities(&self, radius_meters: f64) -> Result<u64, AppError> {
        let result = sqlx::query(
            "WITH ranked AS ( \
                 SELECT b.id AS building_id, a.id AS amenity_id, \
                        ROW_NUMBER() OVER ( \
                            PARTITION BY b.id \
                            ORDER BY ST_Distance(b.geometry::geography, a.geometry::geography, false), \
                                     a.osm_id, a.id \
                        ) AS rn \
                 FROM buildings b \
                 JOIN amenities a \
                   ON ST_DWithin(b.geometry::geography, a.geometry::geography, $1, false) \
             ) \
             UPDATE buildings b SET amenity_id = r.amenity_id \
             FROM ranked r \
             WHERE b.id = r.building_id \
               AND r.rn = 1 \
               AND b.amenity_id IS DISTINCT FROM r.amenity_id",
        )
        .bind(radius_meters)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn closest_amenity(
        &self,
        building_id: Uuid,
        category: AmenityCategory,
        radius_meters: f64,
    ) -> Result<Option<ClosestAmenity>, AppError> {
        let sql = format!(
            "SELECT {}, \
                    ST_Distance(b.geometry::geography, a.geometry::geography, false) \
                        AS distance_meters \
             FROM buildings b \
             JOIN amenities a \
               ON ST_DWithin(b.geometry::geography, a.geometry::geography, $3, false) \
             WHERE b.id = $1 AND a.category = $2 \
             ORDER BY distance_meters, a.osm_id, a.id \
             LIMIT 1",
            AMENITY_COLUMNS
        );

        let row = sqlx::query_as::<_, ClosestRow>(&sql)
            .bind(building_id)
            .bind(category.label())
            .bind(radius_meters)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| {
            Ok(ClosestAmenity {
                distance_meters: r.distance_meters,
                amenity: Amenity::try_from(r.amenity)?,
            })
        })
        .transpose()
    }
}
