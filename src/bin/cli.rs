use capacity_planner::calendar::{self, parse_iso_date};
use capacity_planner::persistence::{
    HolidayFilter, HolidayStore, PersistenceError, PlannerStore, WorkloadStore,
    load_snapshot_from_json, read_tasks_from_csv, save_snapshot_to_json,
};
use capacity_planner::{
    AllocationReport, Assignee, Holiday, Planner, PlannerConfig, Project, RagCalendar,
    ReportFilters, SqlitePlannerStore, Task, TaskStatus,
};
use chrono::NaiveDate;
use std::fs::File;
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

fn render_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (ci, cell) in cells.iter().enumerate() {
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(widths[ci].saturating_sub(cell.len())));
        line.push_str(" |");
    }
    line
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let mut widths: Vec<usize> = headers.iter().map(String::len).collect();
    for row in rows {
        for (ci, cell) in row.iter().enumerate() {
            if cell.len() > widths[ci] {
                widths[ci] = cell.len();
            }
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&render_row(&headers, &widths));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in rows {
        out.push_str(&render_row(row, &widths));
        out.push('\n');
    }
    out.push_str(&sep);
    out
}

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_default()
}

fn print_help() {
    println!(
        "Commands:\n  help                                         Show this help\n  today <YYYY-MM-DD>                           Pin today's date (default: local clock)\n  assignee add <name> [days_per_week] [start]  Add an assignee\n  assignee list                                List assignees\n  assignee delete <id>                         Delete an assignee\n  holiday add <start> [end]                    Add a public holiday or range\n  holiday add-for <assignee> <start> [end]     Add a personal holiday or range\n  holiday list                                 List holidays\n  holiday delete <id>                          Delete a holiday\n  project add <name...>                        Add a project\n  project list                                 List projects\n  task add <project_id> <name> <assignee> <days_assigned> <due> [start]\n                                               Add a task\n  task list [project_id]                       List tasks\n  task taken <id> <days>                       Set days taken\n  task status <id> <status...>                 Set status\n  import csv <project_id> <path>               Import tasks from a CSV file\n  rag <task_id> [generic|assignee]             Classify a task's risk\n  refresh [generic|assignee]                   Recompute stored RAG values\n  bdays <start> <end> [assignee]               Count business days\n  report [start] [end] [assignee]              Resource allocation report\n  save json <path>                             Export all data\n  load json <path>                             Replace all data from an export\n  quit|exit                                    Exit"
    );
}

struct Session {
    store: SqlitePlannerStore,
    planner: Planner,
    today: Option<NaiveDate>,
}

impl Session {
    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(calendar::today)
    }

    fn print_assignees(&self) {
        match self.store.list_assignees() {
            Ok(assignees) => {
                let rows: Vec<Vec<String>> = assignees
                    .iter()
                    .map(|a| {
                        vec![
                            a.id.to_string(),
                            a.name.clone(),
                            a.working_days_per_week.to_string(),
                            fmt_date(a.start_date),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    render_table(&["id", "name", "days_per_week", "start_date"], &rows)
                );
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    fn print_holidays(&self) {
        match self.store.list_holidays(&HolidayFilter::default()) {
            Ok(holidays) => {
                let rows: Vec<Vec<String>> = holidays
                    .iter()
                    .map(|h| {
                        vec![
                            h.id.to_string(),
                            h.date.to_string(),
                            fmt_date(h.date_end),
                            h.assignee_id
                                .map(|id| id.to_string())
                                .unwrap_or_else(|| "public".to_string()),
                            h.description.clone().unwrap_or_default(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    render_table(&["id", "date", "date_end", "assignee", "description"], &rows)
                );
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    fn print_projects(&self) {
        match self.store.list_projects() {
            Ok(projects) => {
                let rows: Vec<Vec<String>> = projects
                    .iter()
                    .map(|p| {
                        vec![
                            p.id.to_string(),
                            p.name.clone(),
                            p.status.as_str().to_string(),
                            p.rag.to_string(),
                            format!("{}%", p.progress),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    render_table(&["id", "name", "status", "rag", "progress"], &rows)
                );
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    fn print_tasks(&self, project_id: Option<i64>) {
        match self.store.list_tasks(project_id) {
            Ok(tasks) => {
                let rows: Vec<Vec<String>> = tasks
                    .iter()
                    .map(|t| {
                        vec![
                            t.id.to_string(),
                            t.project_id.to_string(),
                            t.name.clone(),
                            t.assignee.clone(),
                            t.days_assigned.to_string(),
                            t.days_taken.to_string(),
                            fmt_date(t.start_date),
                            fmt_date(t.due_date),
                            t.status.to_string(),
                            t.rag.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    render_table(
                        &[
                            "id", "project", "name", "assignee", "assigned", "taken", "start",
                            "due", "status", "rag"
                        ],
                        &rows
                    )
                );
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    fn print_report(&self, report: &AllocationReport) {
        println!("Window: {}", report.window);
        let rows: Vec<Vec<String>> = report
            .assignees
            .iter()
            .map(|a| {
                vec![
                    a.assignee.clone(),
                    a.business_days.to_string(),
                    format!("{:.1}", a.capacity),
                    format!("{:.2}", a.allocated),
                    format!("{}%", a.allocation_percentage),
                    a.allocation_status.to_string(),
                    a.active_tasks.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            render_table(
                &[
                    "assignee", "bdays", "capacity", "allocated", "percent", "status", "tasks"
                ],
                &rows
            )
        );
        println!(
            "Team: capacity={:.1} allocated={:.2} percent={}% status={}",
            report.team.capacity,
            report.team.allocated,
            report.team.allocation_percentage,
            report.team.allocation_status
        );
        if !report.unmatched_task_ids.is_empty() {
            let ids = report
                .unmatched_task_ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            println!("Tasks with unknown assignee: {}", ids);
        }
        for warning in &report.warnings {
            println!("Warning: {}", warning);
        }
    }

    fn assignee_command(&self, args: &[&str]) {
        match args {
            ["add", name, rest @ ..] => {
                let mut assignee = Assignee::new(0, *name);
                if let Some(raw) = rest.first() {
                    match raw.parse::<f64>() {
                        Ok(v) => assignee.working_days_per_week = v,
                        Err(_) => {
                            println!("Invalid days_per_week");
                            return;
                        }
                    }
                }
                if let Some(raw) = rest.get(1) {
                    match parse_iso_date(raw) {
                        Some(d) => assignee.start_date = Some(d),
                        None => {
                            println!("Invalid date (YYYY-MM-DD)");
                            return;
                        }
                    }
                }
                match self.store.create_assignee(&assignee) {
                    Ok(created) => println!("Added assignee {} ({}).", created.id, created.name),
                    Err(e) => println!("Error: {}", e),
                }
            }
            ["list"] => self.print_assignees(),
            ["delete", id] => match id.parse::<i64>() {
                Ok(id) => match self.store.delete_assignee(id) {
                    Ok(true) => println!("Deleted assignee {id}."),
                    Ok(false) => println!("Assignee {id} not found."),
                    Err(e) => println!("Error: {}", e),
                },
                Err(_) => println!("Invalid id"),
            },
            _ => println!("Usage: assignee add <name> [days_per_week] [start] | list | delete <id>"),
        }
    }

    fn holiday_command(&self, args: &[&str]) {
        let (assignee, dates) = match args {
            ["add", dates @ ..] if !dates.is_empty() => (None, dates),
            ["add-for", name, dates @ ..] if !dates.is_empty() => (Some(*name), dates),
            ["list"] => {
                self.print_holidays();
                return;
            }
            ["delete", id] => {
                match id.parse::<i64>() {
                    Ok(id) => match self.store.delete_holiday(id) {
                        Ok(true) => println!("Deleted holiday {id}."),
                        Ok(false) => println!("Holiday {id} not found."),
                        Err(e) => println!("Error: {}", e),
                    },
                    Err(_) => println!("Invalid id"),
                }
                return;
            }
            _ => {
                println!(
                    "Usage: holiday add <start> [end] | add-for <assignee> <start> [end] | list | delete <id>"
                );
                return;
            }
        };

        let Some(start) = parse_iso_date(dates[0]) else {
            println!("Invalid date (YYYY-MM-DD)");
            return;
        };
        let mut holiday = Holiday::public(start);
        if let Some(raw) = dates.get(1) {
            match parse_iso_date(raw) {
                Some(end) => holiday.date_end = Some(end),
                None => {
                    println!("Invalid date (YYYY-MM-DD)");
                    return;
                }
            }
        }
        if let Some(name) = assignee {
            match self.store.find_assignee_id_by_name(name) {
                Ok(Some(id)) => holiday.assignee_id = Some(id),
                Ok(None) => {
                    println!("Assignee '{}' not found.", name);
                    return;
                }
                Err(e) => {
                    println!("Error: {}", e);
                    return;
                }
            }
        }
        match self.store.create_holiday(&holiday) {
            Ok(created) => println!("Added holiday {}.", created.id),
            Err(e) => println!("Error: {}", e),
        }
    }

    fn project_command(&self, args: &[&str]) {
        match args {
            ["add", name @ ..] if !name.is_empty() => {
                let project = Project::new(0, name.join(" "));
                match self.store.create_project(&project) {
                    Ok(created) => println!("Added project {} ({}).", created.id, created.name),
                    Err(e) => println!("Error: {}", e),
                }
            }
            ["list"] => self.print_projects(),
            _ => println!("Usage: project add <name...> | list"),
        }
    }

    fn task_command(&self, args: &[&str]) {
        match args {
            ["add", project_id, name, assignee, days, due, rest @ ..] => {
                let (Ok(project_id), Ok(days)) = (project_id.parse::<i64>(), days.parse::<f64>())
                else {
                    println!("Invalid project_id or days_assigned");
                    return;
                };
                let Some(due) = parse_iso_date(due) else {
                    println!("Invalid date (YYYY-MM-DD)");
                    return;
                };
                let mut task = Task::new(0, project_id, *name);
                task.assignee = assignee.to_string();
                task.days_assigned = days;
                task.due_date = Some(due);
                if let Some(raw) = rest.first() {
                    match parse_iso_date(raw) {
                        Some(start) => task.start_date = Some(start),
                        None => {
                            println!("Invalid date (YYYY-MM-DD)");
                            return;
                        }
                    }
                }
                match self.store.create_task(&task) {
                    Ok(created) => println!("Added task {}.", created.id),
                    Err(e) => println!("Error: {}", e),
                }
            }
            ["list"] => self.print_tasks(None),
            ["list", project_id] => match project_id.parse::<i64>() {
                Ok(id) => self.print_tasks(Some(id)),
                Err(_) => println!("Invalid project_id"),
            },
            ["taken", id, days] => {
                let (Ok(id), Ok(days)) = (id.parse::<i64>(), days.parse::<f64>()) else {
                    println!("Invalid id or days");
                    return;
                };
                self.modify_task(id, |task| task.days_taken = days);
            }
            ["status", id, status @ ..] if !status.is_empty() => {
                let Ok(id) = id.parse::<i64>() else {
                    println!("Invalid id");
                    return;
                };
                match status.join(" ").parse::<TaskStatus>() {
                    Ok(status) => self.modify_task(id, |task| task.status = status),
                    Err(e) => println!("Error: {}", e),
                }
            }
            _ => println!(
                "Usage: task add <project_id> <name> <assignee> <days_assigned> <due> [start] | list [project_id] | taken <id> <days> | status <id> <status>"
            ),
        }
    }

    fn modify_task(&self, id: i64, change: impl FnOnce(&mut Task)) {
        let mut task = match self.store.get_task(id) {
            Ok(Some(task)) => task,
            Ok(None) => {
                println!("Task {id} not found.");
                return;
            }
            Err(e) => {
                println!("Error: {}", e);
                return;
            }
        };
        change(&mut task);
        match self.store.update_task(&task) {
            Ok(_) => println!("Updated task {id}."),
            Err(e) => println!("Error: {}", e),
        }
    }

    fn import_command(&self, args: &[&str]) {
        let ["csv", project_id, path] = args else {
            println!("Usage: import csv <project_id> <path>");
            return;
        };
        let Ok(project_id) = project_id.parse::<i64>() else {
            println!("Invalid project_id");
            return;
        };
        let result = File::open(path)
            .map_err(PersistenceError::from)
            .and_then(|file| read_tasks_from_csv(file, project_id, None))
            .and_then(|tasks| self.store.import_tasks(project_id, &tasks));
        match result {
            Ok(summary) => println!(
                "Imported {} task(s) into project {} (progress {}%).",
                summary.imported, summary.project_id, summary.progress
            ),
            Err(e) => println!("Import error: {}", e),
        }
    }

    fn rag_command(&self, args: &[&str]) {
        let Some(Ok(id)) = args.first().map(|raw| raw.parse::<i64>()) else {
            println!("Usage: rag <task_id> [generic|assignee]");
            return;
        };
        let calendar = match args.get(1).copied().unwrap_or_default().parse::<RagCalendar>() {
            Ok(calendar) => calendar,
            Err(e) => {
                println!("Error: {}", e);
                return;
            }
        };
        let task = match self.store.get_task(id) {
            Ok(Some(task)) => task,
            Ok(None) => {
                println!("Task {id} not found.");
                return;
            }
            Err(e) => {
                println!("Error: {}", e);
                return;
            }
        };
        match self.planner.task_rag(&self.store, &task, calendar, self.today()) {
            Some(rag) => {
                println!(
                    "Task {}: {} (remaining={}, business_days_until_due={}, buffer={}, calendar={})",
                    rag.task_id,
                    rag.assessment.status,
                    rag.assessment.days_remaining,
                    rag.assessment.business_days_until_due,
                    rag.assessment.buffer,
                    rag.calendar
                );
                if rag.is_stale() {
                    println!("Stored RAG {} is out of date.", rag.stored);
                }
            }
            None => println!("Task {id} has no due date."),
        }
    }

    fn refresh_command(&self, args: &[&str]) {
        let calendar = match args.first().copied().unwrap_or_default().parse::<RagCalendar>() {
            Ok(calendar) => calendar,
            Err(e) => {
                println!("Error: {}", e);
                return;
            }
        };
        match self
            .planner
            .refresh_task_rags(&self.store, calendar, self.today())
        {
            Ok(summary) => {
                println!(
                    "Evaluated {} task(s), {} changed.",
                    summary.evaluated,
                    summary.changed.len()
                );
                for change in summary.changed {
                    println!("  task {}: {} -> {}", change.task_id, change.from, change.to);
                }
            }
            Err(e) => println!("Refresh error: {}", e),
        }
    }

    fn bdays_command(&self, args: &[&str]) {
        let [start, end, rest @ ..] = args else {
            println!("Usage: bdays <start> <end> [assignee]");
            return;
        };
        let (Some(start), Some(end)) = (parse_iso_date(start), parse_iso_date(end)) else {
            println!("Invalid date (YYYY-MM-DD)");
            return;
        };
        let window = capacity_planner::DateWindow::new(start, end);
        let count = self
            .planner
            .business_days(&self.store, rest.first().copied(), &window);
        println!("Business days {}: {}", count.window, count.business_days);
        if count.degraded {
            println!("Warning: holidays could not be loaded; counted weekends only.");
        }
    }

    fn report_command(&self, args: &[&str]) {
        let window = self
            .planner
            .window(args.first().copied(), args.get(1).copied(), self.today());
        let filters = ReportFilters {
            assignee: args.get(2).map(|name| name.to_string()),
            project_id: None,
        };
        match self.planner.allocation_report(&self.store, &window, &filters) {
            Ok(report) => self.print_report(&report),
            Err(e) => println!("Report error: {}", e),
        }
    }

    fn file_command(&self, cmd: &str, args: &[&str]) {
        let ["json", path] = args else {
            println!("Usage: {} json <path>", cmd);
            return;
        };
        if cmd == "save" {
            match save_snapshot_to_json(&self.store, *path) {
                Ok(_) => println!("Data saved to {}.", path),
                Err(e) => println!("Save error: {}", e),
            }
        } else {
            match load_snapshot_from_json(*path).and_then(|snapshot| self.store.restore(&snapshot)) {
                Ok(_) => println!("Data loaded from {}.", path),
                Err(e) => println!("Load error: {}", e),
            }
        }
    }

    /// Runs one command line; false once the session should end.
    fn execute(&mut self, input: &str) -> bool {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some((cmd, args)) = parts.split_first() else {
            return true;
        };
        match *cmd {
            "help" => print_help(),
            "quit" | "exit" => return false,
            "today" => match args.first().and_then(|raw| parse_iso_date(raw)) {
                Some(date) => {
                    self.today = Some(date);
                    println!("Today set to {}.", date);
                }
                None => println!("Usage: today <YYYY-MM-DD>"),
            },
            "assignee" => self.assignee_command(args),
            "holiday" => self.holiday_command(args),
            "project" => self.project_command(args),
            "task" => self.task_command(args),
            "import" => self.import_command(args),
            "rag" => self.rag_command(args),
            "refresh" => self.refresh_command(args),
            "bdays" => self.bdays_command(args),
            "report" => self.report_command(args),
            "save" | "load" => self.file_command(cmd, args),
            other => println!("Unknown command '{}'. Type 'help'.", other),
        }
        true
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let config = match PlannerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };
    let store = match std::env::var(capacity_planner::config::DATABASE_VAR) {
        Ok(_) => SqlitePlannerStore::new(&config.database_path),
        Err(_) => SqlitePlannerStore::in_memory(),
    };
    let store = match store {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Cannot open database: {}", e);
            std::process::exit(1);
        }
    };

    let mut session = Session {
        store,
        planner: Planner::from_config(&config),
        today: None,
    };

    println!("Capacity Planner (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if !session.execute(line.trim()) {
            break;
        }
    }
}
