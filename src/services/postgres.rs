use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};
use std::time::Duration;
use uuid::Uuid;

use crate::config::DatabaseSettings;
use crate::core::coordinate::{Coordinate, Location};
use crate::models::{
    Message, MessageFilter, MessageId, MessageWithPoint, NewMessage, NewPoint, Point, PointChanges,
    PointFilter, PointId, Ranked,
};
use crate::services::store::{PointStore, SpatialMode, SpatialSupport, StoreError};

/// SQLSTATE for a call to a function that does not exist (PostGIS missing)
const UNDEFINED_FUNCTION: &str = "42883";
/// SQLSTATE for a foreign key violation
const FOREIGN_KEY_VIOLATION: &str = "23503";

const POINT_COLUMNS: &str =
    "id, owner_id, name, description, latitude, longitude, geometry, created_at";

const MESSAGE_SELECT: &str = r#"
    SELECT m.id AS message_id, m.author_id, m.point_id, m.content,
           m.created_at AS message_created_at,
           p.owner_id, p.name, p.description, p.latitude, p.longitude, p.geometry,
           p.created_at AS point_created_at
    FROM messages m
    JOIN points p ON p.id = m.point_id
"#;

/// Row of the `points` table
#[derive(Debug, Clone, FromRow)]
struct PointRow {
    id: i64,
    owner_id: Uuid,
    name: String,
    description: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    geometry: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<PointRow> for Point {
    type Error = StoreError;

    fn try_from(row: PointRow) -> Result<Self, Self::Error> {
        let location = Location::from_stored(row.latitude, row.longitude, row.geometry.as_deref())?;
        Ok(Point {
            id: row.id,
            owner: row.owner_id,
            name: row.name,
            description: row.description,
            location,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct RankedPointRow {
    #[sqlx(flatten)]
    point: PointRow,
    distance_km: f64,
}

/// Decode a row produced by [`MESSAGE_SELECT`]
fn message_from_row(row: &PgRow) -> Result<MessageWithPoint, StoreError> {
    let point = PointRow {
        id: row.try_get("point_id")?,
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        geometry: row.try_get("geometry")?,
        created_at: row.try_get("point_created_at")?,
    };

    Ok(MessageWithPoint {
        message: Message {
            id: row.try_get("message_id")?,
            author: row.try_get("author_id")?,
            point_id: point.id,
            content: row.try_get("content")?,
            created_at: row.try_get("message_created_at")?,
        },
        point: Point::try_from(point)?,
    })
}

/// Missing PostGIS functions mean the engine lacks spatial support rather than
/// a failed query
fn map_spatial_error(error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &error {
        if db.code().as_deref() == Some(UNDEFINED_FUNCTION) {
            return StoreError::SpatialUnavailable(db.message().to_string());
        }
    }
    StoreError::SqlxError(error)
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION))
}

/// Escape LIKE wildcards in user input
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// PostgreSQL-backed point store.
///
/// Scalars and the EWKT geometry are written together from one synced
/// [`Location`]. With PostGIS installed, proximity queries run on
/// `geography` through `ST_DWithin`, backed by a GiST expression index.
pub struct PostgresStore {
    pool: PgPool,
    spatial: SpatialSupport,
}

impl PostgresStore {
    /// Create a new store from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        spatial_mode: SpatialMode,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Self::from_pool(pool, spatial_mode).await
    }

    /// Create a new store from settings
    pub async fn from_settings(
        settings: &DatabaseSettings,
        spatial_mode: SpatialMode,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(settings.idle_timeout_secs))
            .test_before_acquire(true)
            .connect(&settings.url)
            .await?;

        if settings.run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
        }

        Self::from_pool(pool, spatial_mode).await
    }

    /// Wrap an existing, migrated pool and resolve spatial support
    pub async fn from_pool(pool: PgPool, spatial_mode: SpatialMode) -> Result<Self, StoreError> {
        let spatial = match spatial_mode {
            SpatialMode::Disabled => SpatialSupport::Unavailable,
            SpatialMode::Enabled => SpatialSupport::Available,
            SpatialMode::Auto => {
                if Self::postgis_installed(&pool).await? {
                    SpatialSupport::Available
                } else {
                    SpatialSupport::Unavailable
                }
            }
        };

        if spatial.is_available() {
            Self::ensure_spatial_index(&pool).await;
        }

        tracing::info!("PostgreSQL store ready (spatial support: {:?})", spatial);

        Ok(Self { pool, spatial })
    }

    async fn postgis_installed(pool: &PgPool) -> Result<bool, StoreError> {
        let installed: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM pg_extension WHERE extname = 'postgis')",
        )
        .fetch_one(pool)
        .await?;

        Ok(installed)
    }

    /// The index only speeds queries up, so failing to build it is logged and ignored
    async fn ensure_spatial_index(pool: &PgPool) {
        let query = r#"
            CREATE INDEX IF NOT EXISTS points_geography_idx
            ON points USING GIST ((ST_GeogFromText(geometry)))
            WHERE geometry IS NOT NULL
        "#;

        if let Err(e) = sqlx::query(query).execute(pool).await {
            tracing::warn!("Could not create spatial index on points: {}", e);
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn require_spatial(&self) -> Result<(), StoreError> {
        if self.spatial.is_available() {
            Ok(())
        } else {
            Err(StoreError::SpatialUnavailable(
                "PostGIS is not enabled for this database".to_string(),
            ))
        }
    }
}

#[async_trait]
impl PointStore for PostgresStore {
    fn spatial_support(&self) -> SpatialSupport {
        self.spatial
    }

    async fn create_point(&self, new: NewPoint) -> Result<Point, StoreError> {
        let query = format!(
            r#"
            INSERT INTO points (owner_id, name, description, latitude, longitude, geometry)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            POINT_COLUMNS
        );

        let row: PointRow = sqlx::query_as(&query)
            .bind(new.owner)
            .bind(&new.name)
            .bind(&new.description)
            .bind(new.location.map(|l| l.latitude()))
            .bind(new.location.map(|l| l.longitude()))
            .bind(new.location.map(|l| l.geometry().to_ewkt()))
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!("Created point {} for owner {}", row.id, row.owner_id);

        Point::try_from(row)
    }

    async fn get_point(&self, id: PointId) -> Result<Point, StoreError> {
        let query = format!("SELECT {} FROM points WHERE id = $1", POINT_COLUMNS);

        let row: Option<PointRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or(StoreError::PointNotFound(id))
            .and_then(Point::try_from)
    }

    async fn update_point(&self, id: PointId, changes: PointChanges) -> Result<Point, StoreError> {
        if changes.is_empty() {
            return self.get_point(id).await;
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE points SET ");
        {
            let mut assignments = builder.separated(", ");
            if let Some(name) = changes.name {
                assignments.push("name = ").push_bind_unseparated(name);
            }
            if let Some(description) = changes.description {
                assignments
                    .push("description = ")
                    .push_bind_unseparated(description);
            }
            if let Some(location) = changes.location {
                assignments
                    .push("latitude = ")
                    .push_bind_unseparated(location.latitude());
                assignments
                    .push("longitude = ")
                    .push_bind_unseparated(location.longitude());
                assignments
                    .push("geometry = ")
                    .push_bind_unseparated(location.geometry().to_ewkt());
            }
        }
        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(POINT_COLUMNS);

        let row: Option<PointRow> = builder
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or(StoreError::PointNotFound(id))
            .and_then(Point::try_from)
    }

    async fn delete_point(&self, id: PointId) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let messages = sqlx::query("DELETE FROM messages WHERE point_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let points = sqlx::query("DELETE FROM points WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if points == 0 {
            tx.rollback().await?;
            return Err(StoreError::PointNotFound(id));
        }

        tx.commit().await?;

        tracing::debug!("Deleted point {} and {} messages", id, messages);

        Ok(messages)
    }

    async fn list_points(&self, filter: &PointFilter) -> Result<Vec<Point>, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM points WHERE TRUE", POINT_COLUMNS));

        if filter.located_only {
            builder.push(" AND latitude IS NOT NULL AND longitude IS NOT NULL");
        }
        if let Some(owner) = filter.owner {
            builder.push(" AND owner_id = ").push_bind(owner);
        }
        if let Some(needle) = &filter.name_contains {
            builder.push(" AND name ILIKE ").push_bind(like_pattern(needle));
        }
        builder.push(" ORDER BY id");

        let rows: Vec<PointRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        rows.into_iter().map(Point::try_from).collect()
    }

    async fn points_within(
        &self,
        center: &Coordinate,
        radius_km: f64,
    ) -> Result<Vec<Ranked<Point>>, StoreError> {
        self.require_spatial()?;

        let query = format!(
            r#"
            SELECT {},
                   ST_Distance(ST_GeogFromText(geometry), ST_GeogFromText($1::text), false) / 1000.0
                       AS distance_km
            FROM points
            WHERE geometry IS NOT NULL
              AND ST_DWithin(ST_GeogFromText(geometry), ST_GeogFromText($1::text), $2::float8 * 1000.0, false)
            ORDER BY distance_km ASC, id ASC
            "#,
            POINT_COLUMNS
        );

        let rows: Vec<RankedPointRow> = sqlx::query_as(&query)
            .bind(center.derive_geometry().to_ewkt())
            .bind(radius_km)
            .fetch_all(&self.pool)
            .await
            .map_err(map_spatial_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(Ranked {
                    item: Point::try_from(row.point)?,
                    distance_km: row.distance_km,
                })
            })
            .collect()
    }

    async fn create_message(&self, new: NewMessage) -> Result<MessageWithPoint, StoreError> {
        // Inserting through a SELECT on points makes the existence check and
        // the insert one statement.
        let query = r#"
            WITH inserted AS (
                INSERT INTO messages (author_id, point_id, content, created_at)
                SELECT $1, p.id, $3, clock_timestamp()
                FROM points p
                WHERE p.id = $2
                RETURNING id, author_id, point_id, content, created_at
            )
            SELECT m.id AS message_id, m.author_id, m.point_id, m.content,
                   m.created_at AS message_created_at,
                   p.owner_id, p.name, p.description, p.latitude, p.longitude, p.geometry,
                   p.created_at AS point_created_at
            FROM inserted m
            JOIN points p ON p.id = m.point_id
        "#;

        let row = sqlx::query(query)
            .bind(new.author)
            .bind(new.point_id)
            .bind(&new.content)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    StoreError::PointNotFound(new.point_id)
                } else {
                    StoreError::SqlxError(e)
                }
            })?;

        match row {
            Some(row) => message_from_row(&row),
            None => Err(StoreError::PointNotFound(new.point_id)),
        }
    }

    async fn get_message(&self, id: MessageId) -> Result<MessageWithPoint, StoreError> {
        let query = format!("{} WHERE m.id = $1", MESSAGE_SELECT);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => message_from_row(&row),
            None => Err(StoreError::MessageNotFound(id)),
        }
    }

    async fn delete_message(&self, id: MessageId) -> Result<Message, StoreError> {
        let row = sqlx::query(
            "DELETE FROM messages WHERE id = $1 RETURNING id, author_id, point_id, content, created_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or(StoreError::MessageNotFound(id))?;

        Ok(Message {
            id: row.try_get("id")?,
            author: row.try_get("author_id")?,
            point_id: row.try_get("point_id")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn list_messages(
        &self,
        filter: &MessageFilter,
    ) -> Result<Vec<MessageWithPoint>, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("{} WHERE TRUE", MESSAGE_SELECT));

        if filter.located_only {
            builder.push(" AND p.latitude IS NOT NULL AND p.longitude IS NOT NULL");
        }
        if let Some(point) = filter.point {
            builder.push(" AND m.point_id = ").push_bind(point);
        }
        if let Some(author) = filter.author {
            builder.push(" AND m.author_id = ").push_bind(author);
        }
        builder.push(" ORDER BY m.id");

        let rows = builder.build().fetch_all(&self.pool).await?;

        rows.iter().map(message_from_row).collect()
    }

    async fn messages_within(
        &self,
        center: &Coordinate,
        radius_km: f64,
    ) -> Result<Vec<Ranked<MessageWithPoint>>, StoreError> {
        self.require_spatial()?;

        let query = r#"
            SELECT * FROM (
                SELECT m.id AS message_id, m.author_id, m.point_id, m.content,
                       m.created_at AS message_created_at,
                       p.owner_id, p.name, p.description, p.latitude, p.longitude, p.geometry,
                       p.created_at AS point_created_at,
                       ST_Distance(ST_GeogFromText(p.geometry), ST_GeogFromText($1::text), false) / 1000.0
                           AS distance_km
                FROM messages m
                JOIN points p ON p.id = m.point_id
                WHERE p.geometry IS NOT NULL
                  AND ST_DWithin(ST_GeogFromText(p.geometry), ST_GeogFromText($1::text), $2::float8 * 1000.0, false)
            ) ranked
            ORDER BY distance_km ASC, message_id ASC
        "#;

        let rows = sqlx::query(query)
            .bind(center.derive_geometry().to_ewkt())
            .bind(radius_km)
            .fetch_all(&self.pool)
            .await
            .map_err(map_spatial_error)?;

        rows.iter()
            .map(|row| {
                Ok(Ranked {
                    item: message_from_row(row)?,
                    distance_km: row.try_get("distance_km")?,
                })
            })
            .collect()
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
