use std::{
    path::Path,
    sync::{Mutex, MutexGuard},
};

use anyhow::{Result, anyhow, bail};
use log::{debug, warn};
use rusqlite::{Connection, Params, Statement, types::Null};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::broadcast::{Receiver, Sender, channel};

use crate::{
    geometry::Point,
    models::{Route, Settings},
};

const ROUTES: &str = "routes";
const SETTINGS: &str = "settings";

#[derive(Debug, Clone)]
pub enum DatabaseEvent {
    RouteUpdated(Route),
    RouteDeleted(i64),
    SettingsUpdated(Settings),
}

pub trait Identifiable {
    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);
}

#[macro_export]
macro_rules! impl_identifiable {
    ($type:ty) => {
        impl $crate::database::Identifiable for $type {
            fn id(&self) -> Option<i64> {
                self.id
            }

            fn set_id(&mut self, id: i64) {
                self.id = Some(id);
            }
        }
    };
}

/// Stores routes and settings as JSON rows.
#[derive(Debug)]
pub struct Database {
    connection: Mutex<Connection>,
    events: Sender<DatabaseEvent>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Database> {
        let path = path.as_ref();
        debug!(target: "database", "opening {}", path.display());
        Database::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Database> {
        Database::new(Connection::open_in_memory()?)
    }

    fn new(connection: Connection) -> Result<Database> {
        connection.execute_batch(
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {ROUTES} (
                    id INTEGER PRIMARY KEY,
                    data TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS {SETTINGS} (
                    id INTEGER PRIMARY KEY,
                    data TEXT NOT NULL
                );
                "#
            )
            .as_str(),
        )?;

        Ok(Database {
            connection: Mutex::new(connection),
            events: channel(5).0,
        })
    }

    pub fn subscribe(&self) -> Receiver<DatabaseEvent> {
        self.events.subscribe()
    }

    /// Returns the stored settings, storing the defaults first if there are none.
    pub fn query_or_upsert_settings(&self) -> Result<Settings> {
        let mut settings = self
            .query_from_table::<Settings>(SETTINGS)?
            .into_iter()
            .next()
            .unwrap_or_default();
        if settings.id.is_none() {
            self.upsert_settings(&mut settings)?;
        }
        Ok(settings)
    }

    pub fn upsert_settings(&self, settings: &mut Settings) -> Result<()> {
        self.upsert_to_table(SETTINGS, settings).inspect(|_| {
            let _ = self
                .events
                .send(DatabaseEvent::SettingsUpdated(settings.clone()));
        })
    }

    pub fn query_routes(&self) -> Result<Vec<Route>> {
        self.query_from_table(ROUTES)
    }

    pub fn route_by_name(&self, name: &str) -> Result<Option<Route>> {
        Ok(self
            .query_routes()?
            .into_iter()
            .find(|route| route.name == name))
    }

    /// Inserts `route` or replaces the stored route with the same id or name.
    pub fn upsert_route(&self, route: &mut Route) -> Result<()> {
        if route.id.is_none()
            && let Some(existing) = self.route_by_name(&route.name)?
        {
            route.id = existing.id;
        }

        self.upsert_to_table(ROUTES, route).inspect(|_| {
            let _ = self.events.send(DatabaseEvent::RouteUpdated(route.clone()));
        })
    }

    pub fn delete_route(&self, route: &Route) -> Result<()> {
        self.delete_from_table(ROUTES, route)?;
        if let Some(id) = route.id {
            let _ = self.events.send(DatabaseEvent::RouteDeleted(id));
        }
        Ok(())
    }

    /// Position the character should be at right before running waypoint `index` of `route`.
    pub fn position_before_waypoint(&self, route: &Route, index: usize) -> Option<Point> {
        route.position_before(index)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    fn query_from_table<T>(&self, table: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Identifiable + Default,
    {
        let conn = self.connection()?;
        let stmt = format!("SELECT id, data FROM {table};");
        let stmt = conn.prepare(&stmt)?;
        map_data(stmt, [])
    }

    fn upsert_to_table<T>(&self, table: &str, data: &mut T) -> Result<()>
    where
        T: Serialize + Identifiable,
    {
        let json = serde_json::to_string(&data)?;
        let conn = self.connection()?;
        let stmt = format!(
            "INSERT INTO {table} (id, data) VALUES (?1, ?2) ON CONFLICT (id) DO UPDATE SET data = ?2;",
        );
        match data.id() {
            Some(id) => {
                if conn.execute(&stmt, (id, &json))? > 0 {
                    Ok(())
                } else {
                    bail!("no row was updated")
                }
            }
            None => {
                if conn.execute(&stmt, (Null, &json))? > 0 {
                    data.set_id(conn.last_insert_rowid());
                    Ok(())
                } else {
                    bail!("no row was inserted")
                }
            }
        }
    }

    fn delete_from_table<T: Identifiable>(&self, table: &str, data: &T) -> Result<()> {
        if let Some(id) = data.id() {
            let conn = self.connection()?;
            let stmt = format!("DELETE FROM {table} WHERE id = ?1;");
            if conn.execute(&stmt, [id])? > 0 {
                return Ok(());
            }
        }
        bail!("no row was deleted")
    }
}

fn map_data<T>(mut stmt: Statement<'_>, params: impl Params) -> Result<Vec<T>>
where
    T: DeserializeOwned + Identifiable + Default,
{
    Ok(stmt
        .query_map::<T, _, _>(params, |row| {
            let id = row.get::<_, i64>(0)?;
            let data = row.get::<_, String>(1)?;
            let mut value = serde_json::from_str::<'_, T>(data.as_str()).unwrap_or_else(|err| {
                warn!(target: "database", "row {id} is malformed, using default: {err}");
                T::default()
            });
            value.set_id(id);
            Ok(value)
        })?
        .filter_map(|c| c.ok())
        .collect::<Vec<_>>())
}
