use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use tokio::sync::watch;
use tracing::{debug, info};

use super::{NotificationStore, Result, StoreRevision};
use crate::models::{CapturedNotification, FilterRule, IgnoredApp, NewNotification, Scope, Tab};

/// SQLite caps bound parameters per statement; id deletes are chunked below it.
const DELETE_CHUNK: usize = 500;

const NOTIFICATION_COLUMNS: &str = "id, app_name, app_id, title, body, post_time_millis, \
     post_time_display, key, is_dismissed, dismissal_time_millis";

#[derive(Clone, Copy)]
enum Table {
    Notifications,
    IgnoredApps,
    FilterRules,
}

pub struct Database {
    conn: Mutex<Connection>,
    revisions: watch::Sender<StoreRevision>,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        let db = Self::with_connection(conn)?;
        info!("Notification database opened at {}", path.display());
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let (revisions, _) = watch::channel(StoreRevision::default());
        let db = Self {
            conn: Mutex::new(conn),
            revisions,
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                app_name TEXT NOT NULL,
                app_id TEXT NOT NULL,
                title TEXT,
                body TEXT,
                post_time_millis INTEGER NOT NULL,
                post_time_display TEXT NOT NULL,
                key TEXT NOT NULL,
                is_dismissed INTEGER NOT NULL DEFAULT 0,
                dismissal_time_millis INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_notifications_post_time ON notifications(post_time_millis);
            CREATE INDEX IF NOT EXISTS idx_notifications_app_id ON notifications(app_id);
            CREATE INDEX IF NOT EXISTS idx_notifications_key ON notifications(key);

            CREATE TABLE IF NOT EXISTS ignored_apps (
                app_id TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS filter_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                app_name TEXT,
                app_id TEXT,
                title_keyword TEXT,
                content_keyword TEXT
            );
            "#,
        )?;
        Ok(())
    }

    fn bump(&self, table: Table) {
        self.revisions.send_modify(|rev| match table {
            Table::Notifications => rev.notifications += 1,
            Table::IgnoredApps => rev.ignored_apps += 1,
            Table::FilterRules => rev.filter_rules += 1,
        });
    }

    fn bump_if_changed(&self, table: Table, changed: usize) -> usize {
        if changed > 0 {
            self.bump(table);
        }
        changed
    }
}

fn row_to_notification(row: &Row<'_>) -> rusqlite::Result<CapturedNotification> {
    Ok(CapturedNotification {
        id: row.get(0)?,
        app_name: row.get(1)?,
        app_id: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        post_time_millis: row.get(5)?,
        post_time_display: row.get(6)?,
        key: row.get(7)?,
        is_dismissed: row.get(8)?,
        dismissal_time_millis: row.get(9)?,
    })
}

fn row_to_rule(row: &Row<'_>) -> rusqlite::Result<FilterRule> {
    Ok(FilterRule {
        id: row.get(0)?,
        app_name: row.get(1)?,
        app_id: row.get(2)?,
        title_keyword: row.get(3)?,
        content_keyword: row.get(4)?,
    })
}

impl NotificationStore for Database {
    fn insert(&self, n: &NewNotification) -> Result<i64> {
        let id = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO notifications
                 (app_name, app_id, title, body, post_time_millis, post_time_display, key)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    n.app_name,
                    n.app_id,
                    n.title,
                    n.body,
                    n.post_time_millis,
                    n.post_time_display,
                    n.key,
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.bump(Table::Notifications);
        debug!("Inserted notification {} from {}", id, n.app_id);
        Ok(id)
    }

    fn mark_dismissed(&self, key: &str, at_millis: i64) -> Result<usize> {
        // The stamp never precedes the post time, even with a skewed clock
        let updated = self.conn.lock().execute(
            "UPDATE notifications
             SET is_dismissed = 1, dismissal_time_millis = MAX(?2, post_time_millis)
             WHERE key = ?1",
            params![key, at_millis],
        )?;
        Ok(self.bump_if_changed(Table::Notifications, updated))
    }

    fn delete_by_ids(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut deleted = 0;
        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            for chunk in ids.chunks(DELETE_CHUNK) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let sql = format!("DELETE FROM notifications WHERE id IN ({})", placeholders);
                deleted += tx.execute(&sql, params_from_iter(chunk.iter()))?;
            }
            tx.commit()?;
        }
        Ok(self.bump_if_changed(Table::Notifications, deleted))
    }

    fn delete_older_than(&self, cutoff_millis: i64) -> Result<usize> {
        let deleted = self.conn.lock().execute(
            "DELETE FROM notifications WHERE post_time_millis < ?1",
            params![cutoff_millis],
        )?;
        if deleted > 0 {
            info!("Swept {} notifications older than {}", deleted, cutoff_millis);
        }
        Ok(self.bump_if_changed(Table::Notifications, deleted))
    }

    fn delete_all(&self) -> Result<usize> {
        let deleted = self.conn.lock().execute("DELETE FROM notifications", [])?;
        Ok(self.bump_if_changed(Table::Notifications, deleted))
    }

    fn notifications(&self, scope: &Scope, since_millis: i64) -> Result<Vec<CapturedNotification>> {
        let mut sql = format!(
            "SELECT {} FROM notifications WHERE post_time_millis >= ?",
            NOTIFICATION_COLUMNS
        );
        let mut params_vec: Vec<&dyn ToSql> = vec![&since_millis];

        if scope.tab == Tab::Dismissed {
            sql.push_str(" AND is_dismissed = 1");
        }
        if let Some(app_id) = &scope.app_id {
            sql.push_str(" AND app_id = ?");
            params_vec.push(app_id);
        }
        sql.push_str(" ORDER BY post_time_millis DESC, id DESC");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_vec.as_slice(), row_to_notification)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn app_names(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT DISTINCT app_name FROM notifications ORDER BY app_name COLLATE NOCASE ASC")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    fn app_id_for_name(&self, app_name: &str) -> Result<Option<String>> {
        let app_id = self
            .conn
            .lock()
            .query_row(
                "SELECT app_id FROM notifications WHERE app_name = ?1 ORDER BY id ASC LIMIT 1",
                params![app_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(app_id)
    }

    fn add_ignored_app(&self, app_id: &str) -> Result<()> {
        let inserted = self.conn.lock().execute(
            "INSERT OR IGNORE INTO ignored_apps (app_id) VALUES (?1)",
            params![app_id],
        )?;
        self.bump_if_changed(Table::IgnoredApps, inserted);
        Ok(())
    }

    fn remove_ignored_app(&self, app_id: &str) -> Result<()> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM ignored_apps WHERE app_id = ?1", params![app_id])?;
        self.bump_if_changed(Table::IgnoredApps, removed);
        Ok(())
    }

    fn ignored_apps(&self) -> Result<Vec<IgnoredApp>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT app_id FROM ignored_apps ORDER BY app_id")?;
        let apps = stmt
            .query_map([], |row| Ok(IgnoredApp { app_id: row.get(0)? }))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(apps)
    }

    fn save_filter_rule(&self, rule: &FilterRule) -> Result<i64> {
        let id = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT OR REPLACE INTO filter_rules
                 (id, app_name, app_id, title_keyword, content_keyword)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    rule.id,
                    rule.app_name,
                    rule.app_id,
                    rule.title_keyword,
                    rule.content_keyword,
                ],
            )?;
            rule.id.unwrap_or_else(|| conn.last_insert_rowid())
        };
        self.bump(Table::FilterRules);
        Ok(id)
    }

    fn delete_filter_rule(&self, id: i64) -> Result<()> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM filter_rules WHERE id = ?1", params![id])?;
        self.bump_if_changed(Table::FilterRules, removed);
        Ok(())
    }

    fn filter_rules(&self) -> Result<Vec<FilterRule>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, app_name, app_id, title_keyword, content_keyword
             FROM filter_rules ORDER BY id DESC",
        )?;
        let rules = stmt
            .query_map([], row_to_rule)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rules)
    }

    fn subscribe(&self) -> watch::Receiver<StoreRevision> {
        self.revisions.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn new_notification(app_id: &str, title: &str, post_time_millis: i64, key: &str) -> NewNotification {
        NewNotification {
            app_name: format!("{} app", app_id),
            app_id: app_id.to_string(),
            title: Some(title.to_string()),
            body: None,
            post_time_millis,
            post_time_display: String::new(),
            key: key.to_string(),
        }
    }

    #[test]
    fn test_database_creation() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn.lock();
        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM notifications", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("vault.db");
        {
            let db = Database::new(&path).unwrap();
            db.insert(&new_notification("com.a", "hello", 1_000, "k1")).unwrap();
        }
        let db = Database::new(&path).unwrap();
        let rows = db.notifications(&Scope::default(), 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title.as_deref(), Some("hello"));
    }

    #[test]
    fn test_ids_ascend_and_query_is_newest_first() {
        let db = Database::in_memory().unwrap();
        let first = db.insert(&new_notification("com.a", "old", 1_000, "k1")).unwrap();
        let second = db.insert(&new_notification("com.a", "new", 2_000, "k2")).unwrap();
        assert!(second > first);

        let rows = db.notifications(&Scope::default(), 0).unwrap();
        let titles: Vec<_> = rows.iter().map(|n| n.title_or_empty()).collect();
        assert_eq!(titles, vec!["new", "old"]);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let db = Database::in_memory().unwrap();
        let first = db.insert(&new_notification("com.a", "one", 1_000, "k1")).unwrap();
        db.delete_all().unwrap();
        let second = db.insert(&new_notification("com.a", "two", 1_000, "k2")).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_query_is_time_bounded() {
        let db = Database::in_memory().unwrap();
        db.insert(&new_notification("com.a", "stale", 1_000, "k1")).unwrap();
        db.insert(&new_notification("com.a", "fresh", 5_000, "k2")).unwrap();

        let rows = db.notifications(&Scope::default(), 2_000).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title_or_empty(), "fresh");
    }

    #[test]
    fn test_scope_by_tab_and_app() {
        let db = Database::in_memory().unwrap();
        db.insert(&new_notification("com.a", "a1", 1_000, "ka1")).unwrap();
        db.insert(&new_notification("com.a", "a2", 2_000, "ka2")).unwrap();
        db.insert(&new_notification("com.b", "b1", 3_000, "kb1")).unwrap();
        db.mark_dismissed("ka1", 4_000).unwrap();
        db.mark_dismissed("kb1", 4_000).unwrap();

        let dismissed = db.notifications(&Scope::new(Tab::Dismissed, None), 0).unwrap();
        assert_eq!(dismissed.len(), 2);

        let a_only = db
            .notifications(&Scope::new(Tab::All, Some("com.a".to_string())), 0)
            .unwrap();
        assert_eq!(a_only.len(), 2);

        let a_dismissed = db
            .notifications(&Scope::new(Tab::Dismissed, Some("com.a".to_string())), 0)
            .unwrap();
        assert_eq!(a_dismissed.len(), 1);
        assert_eq!(a_dismissed[0].title_or_empty(), "a1");
    }

    #[test]
    fn test_mark_dismissed() {
        let db = Database::in_memory().unwrap();
        db.insert(&new_notification("com.a", "hi", 10_000, "key")).unwrap();

        assert_eq!(db.mark_dismissed("key", 12_000).unwrap(), 1);
        let row = &db.notifications(&Scope::default(), 0).unwrap()[0];
        assert!(row.is_dismissed);
        assert_eq!(row.dismissal_time_millis, Some(12_000));
    }

    #[test]
    fn test_mark_dismissed_clamps_to_post_time() {
        let db = Database::in_memory().unwrap();
        db.insert(&new_notification("com.a", "hi", 10_000, "key")).unwrap();

        db.mark_dismissed("key", 5_000).unwrap();
        let row = &db.notifications(&Scope::default(), 0).unwrap()[0];
        assert_eq!(row.dismissal_time_millis, Some(10_000));
    }

    #[test]
    fn test_mark_dismissed_unknown_key_is_noop() {
        let db = Database::in_memory().unwrap();
        let rx = db.subscribe();
        assert_eq!(db.mark_dismissed("missing", 1).unwrap(), 0);
        assert!(db.notifications(&Scope::default(), 0).unwrap().is_empty());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_delete_by_ids() {
        let db = Database::in_memory().unwrap();
        let a = db.insert(&new_notification("com.a", "a", 1_000, "k1")).unwrap();
        let b = db.insert(&new_notification("com.a", "b", 2_000, "k2")).unwrap();
        db.insert(&new_notification("com.a", "c", 3_000, "k3")).unwrap();

        assert_eq!(db.delete_by_ids(&[]).unwrap(), 0);
        assert_eq!(db.delete_by_ids(&[a, b, 9_999]).unwrap(), 2);
        let rows = db.notifications(&Scope::default(), 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title_or_empty(), "c");
    }

    #[test]
    fn test_delete_by_ids_chunked() {
        let db = Database::in_memory().unwrap();
        let ids: Vec<i64> = (0..1_200)
            .map(|i| {
                db.insert(&new_notification("com.a", "bulk", i, &format!("k{}", i)))
                    .unwrap()
            })
            .collect();
        assert_eq!(db.delete_by_ids(&ids).unwrap(), 1_200);
    }

    #[test]
    fn test_delete_older_than() {
        let db = Database::in_memory().unwrap();
        db.insert(&new_notification("com.a", "old", 1_000, "k1")).unwrap();
        db.insert(&new_notification("com.a", "new", 9_000, "k2")).unwrap();

        assert_eq!(db.delete_older_than(5_000).unwrap(), 1);
        let rows = db.notifications(&Scope::default(), 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title_or_empty(), "new");
    }

    #[test]
    fn test_app_names_and_lookup() {
        let db = Database::in_memory().unwrap();
        let mut n = new_notification("com.zeta", "z", 1_000, "k1");
        n.app_name = "zeta".to_string();
        db.insert(&n).unwrap();
        let mut n = new_notification("com.alpha", "a", 2_000, "k2");
        n.app_name = "Alpha".to_string();
        db.insert(&n).unwrap();
        let mut n = new_notification("com.alpha.beta", "a", 3_000, "k3");
        n.app_name = "Alpha".to_string();
        db.insert(&n).unwrap();

        assert_eq!(db.app_names().unwrap(), vec!["Alpha", "zeta"]);
        // First captured package wins for an ambiguous name
        assert_eq!(
            db.app_id_for_name("Alpha").unwrap().as_deref(),
            Some("com.alpha")
        );
        assert_eq!(db.app_id_for_name("Nope").unwrap(), None);
    }

    #[test]
    fn test_ignored_apps() {
        let db = Database::in_memory().unwrap();
        db.add_ignored_app("com.b").unwrap();
        db.add_ignored_app("com.a").unwrap();
        db.add_ignored_app("com.a").unwrap();

        let ids: Vec<_> = db
            .ignored_apps()
            .unwrap()
            .into_iter()
            .map(|a| a.app_id)
            .collect();
        assert_eq!(ids, vec!["com.a", "com.b"]);

        db.remove_ignored_app("com.a").unwrap();
        assert_eq!(db.ignored_apps().unwrap(), vec![IgnoredApp::new("com.b")]);
    }

    #[test]
    fn test_filter_rules_insert_edit_delete() {
        let db = Database::in_memory().unwrap();
        let first = db
            .save_filter_rule(&FilterRule {
                title_keyword: Some("sale".to_string()),
                ..Default::default()
            })
            .unwrap();
        let second = db
            .save_filter_rule(&FilterRule {
                content_keyword: Some("promo".to_string()),
                ..Default::default()
            })
            .unwrap();

        let rules = db.filter_rules().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].id, Some(second));

        let edited = FilterRule {
            id: Some(first),
            title_keyword: Some("discount".to_string()),
            ..Default::default()
        };
        assert_eq!(db.save_filter_rule(&edited).unwrap(), first);
        let rules = db.filter_rules().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1], edited);

        db.delete_filter_rule(second).unwrap();
        assert_eq!(db.filter_rules().unwrap(), vec![edited]);
    }

    #[test]
    fn test_revisions_track_tables() {
        let db = Database::in_memory().unwrap();
        let rx = db.subscribe();

        db.insert(&new_notification("com.a", "a", 1_000, "k1")).unwrap();
        db.add_ignored_app("com.a").unwrap();
        db.add_ignored_app("com.a").unwrap();
        db.save_filter_rule(&FilterRule::default()).unwrap();

        let rev = *rx.borrow();
        assert_eq!(rev.notifications, 1);
        assert_eq!(rev.ignored_apps, 1);
        assert_eq!(rev.filter_rules, 1);
    }
}
