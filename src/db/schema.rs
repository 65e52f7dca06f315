pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- prefectures table (ids come from the upstream API)
CREATE TABLE IF NOT EXISTS prefectures (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

-- breweries table
CREATE TABLE IF NOT EXISTS breweries (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    prefecture_id INTEGER NOT NULL REFERENCES prefectures(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_breweries_prefecture_id ON breweries(prefecture_id);

-- sakes table (brands plus their flavor chart)
CREATE TABLE IF NOT EXISTS sakes (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    brewery_id INTEGER REFERENCES breweries(id) ON DELETE SET NULL,
    f1_hanayaka REAL CHECK (f1_hanayaka IS NULL OR f1_hanayaka BETWEEN 0.0 AND 1.0),
    f2_houjun REAL CHECK (f2_houjun IS NULL OR f2_houjun BETWEEN 0.0 AND 1.0),
    f3_juukou REAL CHECK (f3_juukou IS NULL OR f3_juukou BETWEEN 0.0 AND 1.0),
    f4_odayaka REAL CHECK (f4_odayaka IS NULL OR f4_odayaka BETWEEN 0.0 AND 1.0),
    f5_dry REAL CHECK (f5_dry IS NULL OR f5_dry BETWEEN 0.0 AND 1.0),
    f6_keikai REAL CHECK (f6_keikai IS NULL OR f6_keikai BETWEEN 0.0 AND 1.0)
);

CREATE INDEX IF NOT EXISTS idx_sakes_brewery_id ON sakes(brewery_id);

-- users table
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- sake_logs table (one log per user and sake)
CREATE TABLE IF NOT EXISTS sake_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    sake_id INTEGER NOT NULL REFERENCES sakes(id) ON DELETE CASCADE,
    is_liked INTEGER NOT NULL DEFAULT 0,
    is_drunk INTEGER NOT NULL DEFAULT 0,
    rating INTEGER CHECK (rating IS NULL OR rating BETWEEN 1 AND 5),
    memo TEXT NOT NULL DEFAULT '',
    drunk_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(user_id, sake_id)
);

CREATE INDEX IF NOT EXISTS idx_sake_logs_user_updated ON sake_logs(user_id, updated_at DESC);
CREATE INDEX IF NOT EXISTS idx_sake_logs_sake_id ON sake_logs(sake_id);
"#;
