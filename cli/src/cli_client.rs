//! The REPL driver (SPEC_FULL.md §1 external contract: "a tiny REPL
//! exercising `client`").
//!
//! A struct that owns the long-lived session object and exposes
//! `new`/`start`, restructured around a blocking `client::Connection`
//! and a read-eval-print loop instead of a binlog subscription event
//! loop.

use std::io::{self, BufRead, Write};
use std::time::Instant;

use client::{Connection, ConnectionOptions, Error, Value};

use crate::cli_options::{CliOptions, OutputFormat};
use crate::pretty_util::to_duration_pretty;

pub struct CliClient {
    options: CliOptions,
    conn: Connection,
}

impl CliClient {
    pub fn connect(options: CliOptions, connect_options: ConnectionOptions) -> Result<Self, Error> {
        let conn = Connection::connect(connect_options)?;
        Ok(CliClient { options, conn })
    }

    /// Runs the read-eval-print loop until stdin closes or the user
    /// types `quit`/`exit`.
    pub fn start(&mut self) -> Result<(), Error> {
        println!("Connected (thread id {})", self.conn.thread_id());
        println!("Server version: {}", self.conn.server_version());
        println!("Type SQL followed by `;`, or `quit` to exit.");

        let stdin = io::stdin();
        let mut buffer = String::new();
        loop {
            print!("mysql> ");
            io::stdout().flush().ok();

            buffer.clear();
            let mut line = String::new();
            loop {
                line.clear();
                if stdin.lock().read_line(&mut line)? == 0 {
                    println!();
                    return Ok(());
                }
                let trimmed = line.trim();
                if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
                    return Ok(());
                }
                buffer.push_str(&line);
                if trimmed.ends_with(';') {
                    break;
                }
            }

            let sql = buffer.trim().trim_end_matches(';').to_string();
            if sql.is_empty() {
                continue;
            }
            if let Err(e) = self.run_one_and_print(&sql) {
                eprintln!("ERROR: {e}");
            }
        }
    }

    /// Runs one statement and prints its result, the non-interactive
    /// `-e`/`--execute` path.
    pub fn run_one_and_print(&mut self, sql: &str) -> Result<(), Error> {
        let start = Instant::now();
        let mut result = self.conn.start(sql)?;
        let fields: Vec<String> = result.fields().iter().map(|f| f.column_alias.clone()).collect();

        if fields.is_empty() {
            result.drain(&mut self.conn)?;
            println!(
                "Query OK, {} row(s) affected ({})",
                result.affected_rows(),
                to_duration_pretty(&start.elapsed())
            );
            return Ok(());
        }

        let mut rows = Vec::new();
        while let Some(row) = result.get_row(&mut self.conn)? {
            rows.push(row);
        }

        print_rows(self.options.format, &fields, &rows);
        println!("{} row(s) in set ({})", rows.len(), to_duration_pretty(&start.elapsed()));
        Ok(())
    }
}

fn print_rows(format: OutputFormat, fields: &[String], rows: &[Vec<Value>]) {
    match format {
        OutputFormat::Table => print_table(fields, rows),
        OutputFormat::Tsv => print_tsv(fields, rows),
    }
}

fn print_table(fields: &[String], rows: &[Vec<Value>]) {
    let mut widths: Vec<usize> = fields.iter().map(|f| f.len()).collect();
    let rendered: Vec<Vec<String>> = rows.iter().map(|r| r.iter().map(render_value).collect()).collect();
    for row in &rendered {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let print_rule = |widths: &[usize]| {
        let mut rule = String::from("+");
        for w in widths {
            rule.push_str(&"-".repeat(w + 2));
            rule.push('+');
        }
        println!("{rule}");
    };

    print_rule(&widths);
    print_row(fields, &widths);
    print_rule(&widths);
    for row in &rendered {
        print_row(row, &widths);
    }
    print_rule(&widths);
}

fn print_row(cells: &[String], widths: &[usize]) {
    let mut line = String::from("|");
    for (cell, width) in cells.iter().zip(widths) {
        line.push_str(&format!(" {:<width$} |", cell, width = width));
    }
    println!("{line}");
}

fn print_tsv(fields: &[String], rows: &[Vec<Value>]) {
    println!("{}", fields.join("\t"));
    for row in rows {
        let cells: Vec<String> = row.iter().map(render_value).collect();
        println!("{}", cells.join("\t"));
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        Value::String(s) => s.clone(),
        Value::Date(d) => format!("{:04}-{:02}-{:02}", d.year, d.month, d.day),
        Value::Time(t) => format!(
            "{}{:02}:{:02}:{:02}",
            if t.negative { "-" } else { "" },
            t.hours,
            t.minutes,
            t.seconds
        ),
        Value::DateTime(dt) | Value::Timestamp(dt) => format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            dt.year, dt.month, dt.day, dt.hours, dt.minutes, dt.seconds
        ),
    }
}
