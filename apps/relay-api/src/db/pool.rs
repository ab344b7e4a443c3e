use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

pub type DbPool = Pool<AsyncPgConnection>;

/// One connection per in-flight handler plus fanout persistence is plenty;
/// the relay keeps no long-lived transactions.
const POOL_MAX_SIZE: usize = 16;

/// Build the Diesel async connection pool the relay runs on.
pub async fn connect(database_url: &str) -> DbPool {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    let pool = Pool::builder(manager)
        .max_size(POOL_MAX_SIZE)
        .build()
        .expect("failed to build connection pool");

    tracing::info!(max_size = POOL_MAX_SIZE, "database pool created");

    pool
}
