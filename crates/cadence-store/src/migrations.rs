use rusqlite::Connection;
use tracing::debug;

pub fn run(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schedule_settings (
            user_id       TEXT PRIMARY KEY,
            frequency     TEXT NOT NULL,
            time_of_day   TEXT NOT NULL,
            day_of_week   INTEGER,
            day_of_month  INTEGER,
            timezone      TEXT NOT NULL,
            next_run_at   TEXT NOT NULL,
            updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS scheduled_posts (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            content_id  TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            run_at      TEXT NOT NULL,
            timezone    TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'pending'
        );

        -- Backlog reads: one user's pending posts in creation order
        CREATE INDEX IF NOT EXISTS idx_posts_backlog
            ON scheduled_posts(user_id, status, created_at);

        -- Publisher poll: pending posts whose run time has arrived
        CREATE INDEX IF NOT EXISTS idx_posts_due
            ON scheduled_posts(status, run_at);
        ",
    )?;

    debug!("database migrations complete");
    Ok(())
}
