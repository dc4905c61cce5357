use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

pub type DbPool = Pool<AsyncPgConnection>;

/// Build the async Postgres pool the message store and user directory run
/// on. Capacity comes from configuration so deployments can size it to
/// their connection budget.
pub async fn connect(database_url: &str, max_size: usize) -> DbPool {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    let pool = Pool::builder(manager)
        .max_size(max_size)
        .build()
        .expect("failed to build connection pool");

    tracing::info!(max_size, "database pool created");

    pool
}
