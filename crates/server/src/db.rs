use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager, ManagerConfig},
    AsyncConnection, AsyncPgConnection, SimpleAsyncConnection,
};
use shared_types::User;

use crate::repository::{NewUser, StoreError, UserStore};

pub type DbPool = Pool<AsyncPgConnection>;

const SCHEMA_SQL: &str =
    include_str!("../migrations/2025-01-01-000000_create_users_and_restaurants/up.sql");

async fn establish_tls_connection(config: String) -> diesel::ConnectionResult<AsyncPgConnection> {
    // Local databases usually run without TLS
    if config.contains("sslmode=disable") {
        return AsyncPgConnection::establish(&config).await;
    }

    // Set up rustls TLS configuration
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    let (client, connection) = tokio_postgres::connect(&config, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    AsyncPgConnection::try_from(client).await
}

pub fn establish_connection_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let mut manager_config = ManagerConfig::default();
    manager_config.custom_setup =
        Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));

    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
        database_url,
        manager_config,
    );
    let pool = Pool::builder(config).build()?;

    Ok(pool)
}

/// Apply the bundled schema. Every statement is idempotent.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let mut conn = pool.get().await?;
    conn.batch_execute(SCHEMA_SQL).await?;
    tracing::info!("Database schema is up to date");
    Ok(())
}

fn map_write_error(err: diesel::result::Error) -> StoreError {
    use diesel::result::{DatabaseErrorKind, Error};

    match err {
        Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => StoreError::Conflict(
            info.constraint_name()
                .unwrap_or("unique constraint")
                .to_string(),
        ),
        other => StoreError::Database(other),
    }
}

// User database operations
pub mod users {
    use diesel_async::RunQueryDsl;

    use super::*;
    use crate::models::{NewUserRow, UserRow};

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        user_id: i64,
    ) -> Result<Option<User>, StoreError> {
        use crate::schema::users::dsl::*;

        users
            .filter(id.eq(user_id))
            .select(UserRow::as_select())
            .first::<UserRow>(conn)
            .await
            .optional()?
            .map(User::try_from)
            .transpose()
    }

    pub async fn get_by_google_id(
        conn: &mut AsyncPgConnection,
        subject: &str,
    ) -> Result<Option<User>, StoreError> {
        use crate::schema::users::dsl::*;

        users
            .filter(google_id.eq(subject))
            .select(UserRow::as_select())
            .first::<UserRow>(conn)
            .await
            .optional()?
            .map(User::try_from)
            .transpose()
    }

    /// `INSERT .. ON CONFLICT (google_id) DO NOTHING RETURNING *`
    pub async fn insert_if_absent(
        conn: &mut AsyncPgConnection,
        new_user: &NewUser,
    ) -> Result<Option<User>, StoreError> {
        use crate::schema::users::dsl::*;

        let row = NewUserRow {
            email: &new_user.email,
            name: &new_user.name,
            role: new_user.role.as_str(),
            google_id: Some(&new_user.google_id),
            is_active: true,
        };

        diesel::insert_into(users)
            .values(&row)
            .on_conflict(google_id)
            .do_nothing()
            .returning(UserRow::as_returning())
            .get_result::<UserRow>(conn)
            .await
            .optional()
            .map_err(map_write_error)?
            .map(User::try_from)
            .transpose()
    }
}

/// Postgres-backed [`UserStore`].
#[derive(Clone)]
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let mut conn = self.pool.get().await?;
        users::get_by_id(&mut conn, id).await
    }

    async fn get_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        let mut conn = self.pool.get().await?;
        users::get_by_google_id(&mut conn, google_id).await
    }

    async fn insert_if_absent(&self, new_user: &NewUser) -> Result<Option<User>, StoreError> {
        let mut conn = self.pool.get().await?;
        users::insert_if_absent(&mut conn, new_user).await
    }
}
