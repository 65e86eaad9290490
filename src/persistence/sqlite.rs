use super::{
    HolidayFilter, HolidayStore, ImportSummary, PersistenceError, PersistenceResult,
    PlannerSnapshot, PlannerStore, WorkloadStore,
};
use crate::model::{Assignee, Holiday, Project, ProjectStatus, Rag, Task, TaskStatus, project_progress};
use crate::validation;
use crate::window::DateWindow;
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

const ASSIGNEE_COLUMNS: &str = "id, name, working_days_per_week, start_date";
const HOLIDAY_COLUMNS: &str = "id, date, date_end, description, assignee_id";
const PROJECT_COLUMNS: &str = "id, name, description, status, rag, progress";
const TASK_COLUMNS: &str =
    "id, project_id, name, assignee, days_assigned, days_taken, start_date, due_date, status, rag";

pub struct SqlitePlannerStore {
    connection: Mutex<Connection>,
}

impl SqlitePlannerStore {
    pub fn new<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::from_connection(connection)
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> PersistenceResult<Self> {
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS assignees (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                working_days_per_week REAL NOT NULL DEFAULT 5,
                start_date TEXT
            );
            CREATE TABLE IF NOT EXISTS holidays (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                date_end TEXT,
                description TEXT,
                assignee_id INTEGER REFERENCES assignees(id) ON DELETE CASCADE,
                CHECK (date_end IS NULL OR date_end >= date)
            );
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'Not Started',
                rag INTEGER NOT NULL DEFAULT 1,
                progress INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                assignee TEXT NOT NULL DEFAULT '',
                days_assigned REAL NOT NULL DEFAULT 0,
                days_taken REAL NOT NULL DEFAULT 0,
                start_date TEXT,
                due_date TEXT,
                status TEXT NOT NULL DEFAULT 'Not Started',
                rag INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX IF NOT EXISTS idx_holidays_assignee ON holidays (assignee_id, date);
            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks (project_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON tasks (assignee);
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn query_assignee(conn: &Connection, id: i64) -> PersistenceResult<Option<Assignee>> {
        let sql = format!("SELECT {ASSIGNEE_COLUMNS} FROM assignees WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], assignee_from_row).optional()?)
    }

    fn query_project(conn: &Connection, id: i64) -> PersistenceResult<Option<Project>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], project_from_row).optional()?)
    }

    fn query_task(conn: &Connection, id: i64) -> PersistenceResult<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], task_from_row).optional()?)
    }

    fn query_holiday(conn: &Connection, id: i64) -> PersistenceResult<Option<Holiday>> {
        let sql = format!("SELECT {HOLIDAY_COLUMNS} FROM holidays WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], holiday_from_row).optional()?)
    }

    fn query_holidays(
        conn: &Connection,
        clause: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> PersistenceResult<Vec<Holiday>> {
        let sql = format!("SELECT {HOLIDAY_COLUMNS} FROM holidays {clause} ORDER BY date, id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(args, holiday_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn query_tasks(
        conn: &Connection,
        clause: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> PersistenceResult<Vec<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks {clause}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(args, task_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn ensure_name_available(
        conn: &Connection,
        name: &str,
        except_id: Option<i64>,
    ) -> PersistenceResult<()> {
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM assignees WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        match existing {
            Some(id) if Some(id) != except_id => Err(PersistenceError::Conflict(format!(
                "assignee '{name}' already exists"
            ))),
            _ => Ok(()),
        }
    }

    fn ensure_project_exists(conn: &Connection, project_id: i64) -> PersistenceResult<()> {
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM projects WHERE id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(PersistenceError::NotFound(format!("project {project_id}")));
        }
        Ok(())
    }

    fn insert_task(tx: &Transaction, task: &Task) -> PersistenceResult<i64> {
        tx.execute(
            "INSERT INTO tasks (project_id, name, assignee, days_assigned, days_taken, start_date, due_date, status, rag)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                task.project_id,
                task.name,
                task.assignee.trim(),
                task.days_assigned,
                task.days_taken,
                task.start_date,
                task.due_date,
                task.status.as_str(),
                task.rag.code(),
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    fn recompute_project_progress(tx: &Transaction, project_id: i64) -> PersistenceResult<i64> {
        let tasks = Self::query_tasks(tx, "WHERE project_id = ?1", &[&project_id])?;
        let progress = project_progress(&tasks);
        tx.execute(
            "UPDATE projects SET progress = ?1 WHERE id = ?2",
            params![progress, project_id],
        )?;
        Ok(progress)
    }
}

fn parse_column<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into()))
}

fn rag_column(row: &Row, idx: usize) -> rusqlite::Result<Rag> {
    let code: i64 = row.get(idx)?;
    Rag::from_code(code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("unknown rag code {code}").into(),
        )
    })
}

fn assignee_from_row(row: &Row) -> rusqlite::Result<Assignee> {
    Ok(Assignee {
        id: row.get(0)?,
        name: row.get(1)?,
        working_days_per_week: row.get(2)?,
        start_date: row.get(3)?,
    })
}

fn holiday_from_row(row: &Row) -> rusqlite::Result<Holiday> {
    Ok(Holiday {
        id: row.get(0)?,
        date: row.get(1)?,
        date_end: row.get(2)?,
        description: row.get(3)?,
        assignee_id: row.get(4)?,
    })
}

fn project_from_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        status: parse_column::<ProjectStatus>(row, 3)?,
        rag: rag_column(row, 4)?,
        progress: row.get(5)?,
    })
}

fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        assignee: row.get(3)?,
        days_assigned: row.get(4)?,
        days_taken: row.get(5)?,
        start_date: row.get(6)?,
        due_date: row.get(7)?,
        status: parse_column::<TaskStatus>(row, 8)?,
        rag: rag_column(row, 9)?,
    })
}

impl HolidayStore for SqlitePlannerStore {
    fn list_public_holidays(&self, window: &DateWindow) -> PersistenceResult<Vec<Holiday>> {
        let conn = self.connection.lock();
        Self::query_holidays(
            &conn,
            "WHERE assignee_id IS NULL AND date <= ?2 AND COALESCE(date_end, date) >= ?1",
            &[&window.start, &window.end],
        )
    }

    fn list_assignee_holidays(
        &self,
        assignee_id: i64,
        window: &DateWindow,
    ) -> PersistenceResult<Vec<Holiday>> {
        let conn = self.connection.lock();
        Self::query_holidays(
            &conn,
            "WHERE assignee_id = ?1 AND date <= ?3 AND COALESCE(date_end, date) >= ?2",
            &[&assignee_id, &window.start, &window.end],
        )
    }

    fn find_assignee_id_by_name(&self, name: &str) -> PersistenceResult<Option<i64>> {
        let conn = self.connection.lock();
        Ok(conn
            .query_row(
                "SELECT id FROM assignees WHERE name = ?1",
                params![name.trim()],
                |row| row.get(0),
            )
            .optional()?)
    }
}

impl WorkloadStore for SqlitePlannerStore {
    fn list_active_tasks_in_window(&self, window: &DateWindow) -> PersistenceResult<Vec<Task>> {
        let conn = self.connection.lock();
        Self::query_tasks(
            &conn,
            "WHERE status != ?1 AND due_date IS NOT NULL AND due_date >= ?2
               AND (start_date IS NULL OR start_date <= ?3)
             ORDER BY due_date, id",
            &[&TaskStatus::Completed.as_str(), &window.start, &window.end],
        )
    }

    fn list_assignees(&self) -> PersistenceResult<Vec<Assignee>> {
        let conn = self.connection.lock();
        let sql = format!("SELECT {ASSIGNEE_COLUMNS} FROM assignees ORDER BY name");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], assignee_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl PlannerStore for SqlitePlannerStore {
    fn create_assignee(&self, assignee: &Assignee) -> PersistenceResult<Assignee> {
        validation::validate_assignee(assignee)?;
        let conn = self.connection.lock();
        let name = assignee.name.trim();
        Self::ensure_name_available(&conn, name, None)?;
        conn.execute(
            "INSERT INTO assignees (name, working_days_per_week, start_date) VALUES (?1, ?2, ?3)",
            params![name, assignee.working_days_per_week, assignee.start_date],
        )?;
        let id = conn.last_insert_rowid();
        Self::query_assignee(&conn, id)?
            .ok_or_else(|| PersistenceError::NotFound(format!("assignee {id}")))
    }

    fn get_assignee(&self, id: i64) -> PersistenceResult<Option<Assignee>> {
        let conn = self.connection.lock();
        Self::query_assignee(&conn, id)
    }

    fn update_assignee(&self, assignee: &Assignee) -> PersistenceResult<Assignee> {
        validation::validate_assignee(assignee)?;
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        let previous = Self::query_assignee(&tx, assignee.id)?
            .ok_or_else(|| PersistenceError::NotFound(format!("assignee {}", assignee.id)))?;
        let name = assignee.name.trim();
        Self::ensure_name_available(&tx, name, Some(assignee.id))?;
        tx.execute(
            "UPDATE assignees SET name = ?1, working_days_per_week = ?2, start_date = ?3 WHERE id = ?4",
            params![name, assignee.working_days_per_week, assignee.start_date, assignee.id],
        )?;
        // Tasks reference assignees by name, so a rename carries them along.
        let renamed_tasks = if previous.name != name {
            tx.execute(
                "UPDATE tasks SET assignee = ?1 WHERE assignee = ?2",
                params![name, previous.name],
            )?
        } else {
            0
        };
        let updated = Self::query_assignee(&tx, assignee.id)?
            .ok_or_else(|| PersistenceError::NotFound(format!("assignee {}", assignee.id)))?;
        tx.commit()?;
        if renamed_tasks > 0 {
            info!(
                assignee_id = assignee.id,
                from = %previous.name,
                to = %name,
                renamed_tasks,
                "renamed assignee on tasks"
            );
        }
        Ok(updated)
    }

    fn delete_assignee(&self, id: i64) -> PersistenceResult<bool> {
        let conn = self.connection.lock();
        let Some(assignee) = Self::query_assignee(&conn, id)? else {
            return Ok(false);
        };
        let referencing: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE assignee = ?1",
            params![assignee.name],
            |row| row.get(0),
        )?;
        if referencing > 0 {
            return Err(PersistenceError::Conflict(format!(
                "assignee '{}' is referenced by {referencing} task(s)",
                assignee.name
            )));
        }
        let removed = conn.execute("DELETE FROM assignees WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn create_holiday(&self, holiday: &Holiday) -> PersistenceResult<Holiday> {
        validation::validate_holiday(holiday)?;
        let conn = self.connection.lock();
        if let Some(assignee_id) = holiday.assignee_id {
            if Self::query_assignee(&conn, assignee_id)?.is_none() {
                return Err(PersistenceError::NotFound(format!("assignee {assignee_id}")));
            }
        }
        conn.execute(
            "INSERT INTO holidays (date, date_end, description, assignee_id) VALUES (?1, ?2, ?3, ?4)",
            params![
                holiday.date,
                holiday.date_end,
                holiday.description,
                holiday.assignee_id
            ],
        )?;
        let id = conn.last_insert_rowid();
        Self::query_holiday(&conn, id)?
            .ok_or_else(|| PersistenceError::NotFound(format!("holiday {id}")))
    }

    fn list_holidays(&self, filter: &HolidayFilter) -> PersistenceResult<Vec<Holiday>> {
        let conn = self.connection.lock();
        match (filter.assignee_id, filter.public_only) {
            (_, true) => Self::query_holidays(&conn, "WHERE assignee_id IS NULL", &[]),
            (Some(id), false) => {
                Self::query_holidays(&conn, "WHERE assignee_id = ?1", &[&id])
            }
            (None, false) => Self::query_holidays(&conn, "", &[]),
        }
    }

    fn delete_holiday(&self, id: i64) -> PersistenceResult<bool> {
        let conn = self.connection.lock();
        let removed = conn.execute("DELETE FROM holidays WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn create_project(&self, project: &Project) -> PersistenceResult<Project> {
        validation::validate_project(project)?;
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO projects (name, description, status, rag, progress) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                project.name,
                project.description,
                project.status.as_str(),
                project.rag.code(),
                project.progress
            ],
        )?;
        let id = conn.last_insert_rowid();
        Self::query_project(&conn, id)?
            .ok_or_else(|| PersistenceError::NotFound(format!("project {id}")))
    }

    fn list_projects(&self) -> PersistenceResult<Vec<Project>> {
        let conn = self.connection.lock();
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], project_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get_project(&self, id: i64) -> PersistenceResult<Option<Project>> {
        let conn = self.connection.lock();
        Self::query_project(&conn, id)
    }

    fn update_project(&self, project: &Project) -> PersistenceResult<Project> {
        validation::validate_project(project)?;
        let conn = self.connection.lock();
        let changed = conn.execute(
            "UPDATE projects SET name = ?1, description = ?2, status = ?3, rag = ?4, progress = ?5 WHERE id = ?6",
            params![
                project.name,
                project.description,
                project.status.as_str(),
                project.rag.code(),
                project.progress,
                project.id
            ],
        )?;
        if changed == 0 {
            return Err(PersistenceError::NotFound(format!("project {}", project.id)));
        }
        Self::query_project(&conn, project.id)?
            .ok_or_else(|| PersistenceError::NotFound(format!("project {}", project.id)))
    }

    fn delete_project(&self, id: i64) -> PersistenceResult<bool> {
        let conn = self.connection.lock();
        let removed = conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn create_task(&self, task: &Task) -> PersistenceResult<Task> {
        validation::validate_task(task)?;
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        Self::ensure_project_exists(&tx, task.project_id)?;
        let id = Self::insert_task(&tx, task)?;
        tx.commit()?;
        Self::query_task(&conn, id)?.ok_or_else(|| PersistenceError::NotFound(format!("task {id}")))
    }

    fn list_tasks(&self, project_id: Option<i64>) -> PersistenceResult<Vec<Task>> {
        let conn = self.connection.lock();
        match project_id {
            Some(id) => Self::query_tasks(&conn, "WHERE project_id = ?1 ORDER BY id", &[&id]),
            None => Self::query_tasks(&conn, "ORDER BY id", &[]),
        }
    }

    fn get_task(&self, id: i64) -> PersistenceResult<Option<Task>> {
        let conn = self.connection.lock();
        Self::query_task(&conn, id)
    }

    fn update_task(&self, task: &Task) -> PersistenceResult<Task> {
        validation::validate_task(task)?;
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        Self::ensure_project_exists(&tx, task.project_id)?;
        let changed = tx.execute(
            "UPDATE tasks SET project_id = ?1, name = ?2, assignee = ?3, days_assigned = ?4, days_taken = ?5,
                 start_date = ?6, due_date = ?7, status = ?8, rag = ?9
             WHERE id = ?10",
            params![
                task.project_id,
                task.name,
                task.assignee.trim(),
                task.days_assigned,
                task.days_taken,
                task.start_date,
                task.due_date,
                task.status.as_str(),
                task.rag.code(),
                task.id,
            ],
        )?;
        if changed == 0 {
            return Err(PersistenceError::NotFound(format!("task {}", task.id)));
        }
        tx.commit()?;
        Self::query_task(&conn, task.id)?
            .ok_or_else(|| PersistenceError::NotFound(format!("task {}", task.id)))
    }

    fn delete_task(&self, id: i64) -> PersistenceResult<bool> {
        let conn = self.connection.lock();
        let removed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn update_task_rags(&self, updates: &[(i64, Rag)]) -> PersistenceResult<()> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("UPDATE tasks SET rag = ?1 WHERE id = ?2")?;
            for (id, rag) in updates {
                stmt.execute(params![rag.code(), id])?;
            }
        }
        tx.commit()?;
        debug!(updated = updates.len(), "stored task rag values refreshed");
        Ok(())
    }

    fn import_tasks(&self, project_id: i64, tasks: &[Task]) -> PersistenceResult<ImportSummary> {
        for task in tasks {
            validation::validate_task(task)?;
        }
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        Self::ensure_project_exists(&tx, project_id)?;
        for task in tasks {
            let task = Task {
                project_id,
                ..task.clone()
            };
            Self::insert_task(&tx, &task)?;
        }
        let progress = Self::recompute_project_progress(&tx, project_id)?;
        tx.commit()?;
        info!(project_id, imported = tasks.len(), progress, "imported tasks");
        Ok(ImportSummary {
            project_id,
            imported: tasks.len(),
            progress,
        })
    }

    fn snapshot(&self) -> PersistenceResult<PlannerSnapshot> {
        Ok(PlannerSnapshot {
            assignees: self.list_assignees()?,
            holidays: self.list_holidays(&HolidayFilter::default())?,
            projects: self.list_projects()?,
            tasks: self.list_tasks(None)?,
        })
    }

    fn restore(&self, snapshot: &PlannerSnapshot) -> PersistenceResult<()> {
        validation::validate_assignee_collection(&snapshot.assignees)?;
        for holiday in &snapshot.holidays {
            validation::validate_holiday(holiday)?;
        }
        for project in &snapshot.projects {
            validation::validate_project(project)?;
        }
        for task in &snapshot.tasks {
            validation::validate_task(task)?;
        }

        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM tasks; DELETE FROM holidays; DELETE FROM projects; DELETE FROM assignees;",
        )?;
        for assignee in &snapshot.assignees {
            tx.execute(
                "INSERT INTO assignees (id, name, working_days_per_week, start_date) VALUES (?1, ?2, ?3, ?4)",
                params![
                    assignee.id,
                    assignee.name.trim(),
                    assignee.working_days_per_week,
                    assignee.start_date
                ],
            )?;
        }
        for holiday in &snapshot.holidays {
            tx.execute(
                "INSERT INTO holidays (id, date, date_end, description, assignee_id) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    holiday.id,
                    holiday.date,
                    holiday.date_end,
                    holiday.description,
                    holiday.assignee_id
                ],
            )?;
        }
        for project in &snapshot.projects {
            tx.execute(
                "INSERT INTO projects (id, name, description, status, rag, progress) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    project.id,
                    project.name,
                    project.description,
                    project.status.as_str(),
                    project.rag.code(),
                    project.progress
                ],
            )?;
        }
        for task in &snapshot.tasks {
            tx.execute(
                "INSERT INTO tasks (id, project_id, name, assignee, days_assigned, days_taken, start_date, due_date, status, rag)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    task.id,
                    task.project_id,
                    task.name,
                    task.assignee.trim(),
                    task.days_assigned,
                    task.days_taken,
                    task.start_date,
                    task.due_date,
                    task.status.as_str(),
                    task.rag.code(),
                ],
            )?;
        }
        tx.commit()?;
        info!(
            assignees = snapshot.assignees.len(),
            holidays = snapshot.holidays.len(),
            projects = snapshot.projects.len(),
            tasks = snapshot.tasks.len(),
            "restored planner snapshot"
        );
        Ok(())
    }
}
