//! TickTick CSV backup adapter.
//!
//! # Responsibility
//! - Parse the TickTick backup CSV into the canonical import model.
//! - Own every TickTick-specific detail: header rows, column order, date and
//!   reminder encodings.
//!
//! # Invariants
//! - The first `HEADER_RECORDS` records are metadata and never parsed.
//! - Any malformed cell aborts the whole parse; no partial model escapes.
//! - Lists are emitted sorted by title; tasks keep export order per list.
//! - The parent reference comes from `parentId`, never from `taskId`.

use crate::migration::{Migrator, ParseError};
use crate::model::canonical::{
    ExternalId, LabelImport, ListImport, NamespaceImport, RelationKind, TaskImport,
};
use chrono::DateTime;
use csv::{ReaderBuilder, StringRecord};
use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::time::Instant;

/// Service key used for migration status.
pub const SERVICE_NAME: &str = "ticktick";

const NAMESPACE_TITLE: &str = "Migrated from TickTick";
/// `Date:`, `Version:`, `Status:` legend and the column header row.
const HEADER_RECORDS: usize = 4;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";
const TAG_SEPARATOR: &str = ", ";
const TRIGGER_PREFIX: &str = "TRIGGER:";

const COL_LIST_NAME: usize = 1;
const COL_TITLE: usize = 2;
const COL_TAGS: usize = 3;
const COL_CONTENT: usize = 4;
const COL_START_DATE: usize = 6;
const COL_DUE_DATE: usize = 7;
const COL_REMINDER: usize = 8;
const COL_REPEAT: usize = 9;
const COL_PRIORITY: usize = 10;
const COL_STATUS: usize = 11;
const COL_CREATED_TIME: usize = 12;
const COL_COMPLETED_TIME: usize = 13;
const COL_ORDER: usize = 14;
const COL_TASK_ID: usize = 21;
const COL_PARENT_ID: usize = 22;
const COLUMN_COUNT: usize = 23;

static ISO_DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<sign>[+-])?P(?:(?P<weeks>\d+)W)?(?:(?P<days>\d+)D)?(?:T(?:(?P<hours>\d+)H)?(?:(?P<minutes>\d+)M)?(?:(?P<seconds>\d+)S)?)?$",
    )
    .expect("valid iso duration regex")
});
/// Go-style unit shorthand: `1h30m`, `90s`, `1.5h`, `250us`, or a bare `0`.
static SHORT_DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<sign>[+-])?(?:0|(?P<parts>(?:(?:\d+(?:\.\d*)?|\.\d+)(?:ns|us|µs|μs|ms|h|m|s))+))$",
    )
    .expect("valid short duration regex")
});
static SHORT_DURATION_PART_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<value>\d+(?:\.\d*)?|\.\d+)(?P<unit>ns|us|µs|μs|ms|h|m|s)")
        .expect("valid duration part regex")
});

/// Parser for TickTick backup exports.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickTickMigrator;

impl TickTickMigrator {
    pub fn new() -> Self {
        Self
    }
}

impl Migrator for TickTickMigrator {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    fn parse(&self, export: &[u8]) -> Result<NamespaceImport, ParseError> {
        let started_at = Instant::now();
        info!(
            "event=migration_parse module=migration status=start service={SERVICE_NAME} bytes={}",
            export.len()
        );

        match parse_export(export) {
            Ok(namespace) => {
                info!(
                    "event=migration_parse module=migration status=ok service={SERVICE_NAME} duration_ms={} lists={} tasks={}",
                    started_at.elapsed().as_millis(),
                    namespace.lists.len(),
                    namespace.task_count()
                );
                Ok(namespace)
            }
            Err(err) => {
                error!(
                    "event=migration_parse module=migration status=error service={SERVICE_NAME} duration_ms={} error_code=malformed_input record={} field={}",
                    started_at.elapsed().as_millis(),
                    err.record,
                    err.field
                );
                Err(err)
            }
        }
    }
}

fn parse_export(export: &[u8]) -> Result<NamespaceImport, ParseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(export);

    let mut lists: BTreeMap<String, ListImport> = BTreeMap::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|err| {
            let line = err.position().map_or(0, |position| position.line());
            ParseError::new(line, "record", "", format!("unreadable csv record: {err}"))
        })?;
        if index < HEADER_RECORDS {
            continue;
        }

        let line = record
            .position()
            .map_or(index as u64 + 1, |position| position.line());
        let (list_name, task) = parse_task_record(&record, line)?;
        lists
            .entry(list_name.clone())
            .or_insert_with(|| ListImport::new(list_name))
            .tasks
            .push(task);
    }

    let mut namespace = NamespaceImport::new(NAMESPACE_TITLE);
    namespace.lists = lists.into_values().collect();
    Ok(namespace)
}

fn parse_task_record(record: &StringRecord, line: u64) -> Result<(String, TaskImport), ParseError> {
    if record.len() < COLUMN_COUNT {
        return Err(ParseError::new(
            line,
            "record",
            "",
            format!("expected {COLUMN_COUNT} columns, got {}", record.len()),
        ));
    }
    let cell = |column: usize| record.get(column).unwrap_or("").trim();

    let start_date = parse_timestamp(cell(COL_START_DATE), line, "Start Date")?;
    let due_date = parse_timestamp(cell(COL_DUE_DATE), line, "Due Date")?;
    let offsets = parse_reminder_offsets(cell(COL_REMINDER), line)?;
    let priority = parse_integer(cell(COL_PRIORITY), line, "Priority")?;
    let status = parse_integer(cell(COL_STATUS), line, "Status")?;
    let created = parse_timestamp(cell(COL_CREATED_TIME), line, "Created Time")?;
    let completed = parse_timestamp(cell(COL_COMPLETED_TIME), line, "Completed Time")?;
    let order = parse_order(cell(COL_ORDER), line)?;
    let task_id = parse_integer(cell(COL_TASK_ID), line, "taskId")?;
    let parent_id = match cell(COL_PARENT_ID) {
        "" => 0,
        value => parse_integer(value, line, "parentId")?,
    };

    let mut task = TaskImport::new(cell(COL_TITLE))
        .with_external_id(task_id.to_string())
        .with_position(order);
    task.description = cell(COL_CONTENT).to_string();
    task.start_date = start_date;
    task.end_date = due_date;
    task.due_date = due_date;
    task.reminders = match due_date {
        Some(due) => offsets.iter().map(|offset| due + offset).collect(),
        None => Vec::new(),
    };
    task.done = matches!(status, 1 | 2);
    task.done_at = completed;
    task.priority = priority;
    task.repeat = Some(cell(COL_REPEAT))
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    task.created = created;
    task.labels = cell(COL_TAGS)
        .split(TAG_SEPARATOR)
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(LabelImport::new)
        .collect();
    if parent_id != 0 {
        task.add_relation(RelationKind::ParentTask, ExternalId::from(parent_id.to_string()));
    }

    Ok((cell(COL_LIST_NAME).to_string(), task))
}

fn parse_timestamp(value: &str, line: u64, field: &'static str) -> Result<Option<i64>, ParseError> {
    if value.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|parsed| Some(parsed.timestamp_millis()))
        .map_err(|err| ParseError::new(line, field, value, format!("invalid timestamp: {err}")))
}

fn parse_integer(value: &str, line: u64, field: &'static str) -> Result<i64, ParseError> {
    value
        .parse::<i64>()
        .map_err(|err| ParseError::new(line, field, value, format!("invalid integer: {err}")))
}

fn parse_order(value: &str, line: u64) -> Result<f64, ParseError> {
    let parsed = value
        .parse::<f64>()
        .map_err(|err| ParseError::new(line, "Order", value, format!("invalid number: {err}")))?;
    if !parsed.is_finite() {
        return Err(ParseError::new(line, "Order", value, "order must be finite"));
    }
    Ok(parsed)
}

/// Parses the reminder cell into signed millisecond offsets from the due date.
///
/// ISO-8601 triggers are signed offsets (`-PT15M` is 15 minutes before due);
/// unit shorthand is a duration before due (`15m`).
fn parse_reminder_offsets(value: &str, line: u64) -> Result<Vec<i64>, ParseError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            parse_reminder_offset(part)
                .ok_or_else(|| ParseError::new(line, "Reminder", part, "invalid reminder duration"))
        })
        .collect()
}

fn parse_reminder_offset(value: &str) -> Option<i64> {
    let value = value.strip_prefix(TRIGGER_PREFIX).unwrap_or(value).trim();

    if let Some(captures) = ISO_DURATION_RE.captures(value) {
        let mut seen = false;
        let mut total_ms: i64 = 0;
        for (name, unit_ms) in [
            ("weeks", 7 * 24 * 3_600_000),
            ("days", 24 * 3_600_000),
            ("hours", 3_600_000),
            ("minutes", 60_000),
            ("seconds", 1_000),
        ] {
            if let Some(digits) = captures.name(name) {
                seen = true;
                let amount = digits.as_str().parse::<i64>().ok()?;
                total_ms = total_ms.checked_add(amount.checked_mul(unit_ms)?)?;
            }
        }
        if !seen {
            return None;
        }
        let negative = captures.name("sign").map(|sign| sign.as_str()) == Some("-");
        return Some(if negative { -total_ms } else { total_ms });
    }

    let captures = SHORT_DURATION_RE.captures(value)?;
    let parts = captures.name("parts").map_or("", |parts| parts.as_str());
    let mut total_ms = 0.0_f64;
    for part in SHORT_DURATION_PART_RE.captures_iter(parts) {
        let amount = part["value"].parse::<f64>().ok()?;
        let unit_ms = match &part["unit"] {
            "h" => 3_600_000.0,
            "m" => 60_000.0,
            "s" => 1_000.0,
            "ms" => 1.0,
            "ns" => 1e-6,
            _ => 1e-3,
        };
        total_ms += amount * unit_ms;
    }
    if !total_ms.is_finite() || total_ms > i64::MAX as f64 {
        return None;
    }
    let negative = captures.name("sign").map(|sign| sign.as_str()) == Some("-");
    let before_due = total_ms.round() as i64;
    Some(if negative { before_due } else { -before_due })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "\"Date: 2021-05-04+0000\"\n\"Version: 7.1\"\n\"Status: \n0 Normal\n1 Completed\n2 Archived\"\n\"Folder Name\",\"List Name\",\"Title\",\"Tags\",\"Content\",\"Is Check list\",\"Start Date\",\"Due Date\",\"Reminder\",\"Repeat\",\"Priority\",\"Status\",\"Created Time\",\"Completed Time\",\"Order\",\"Timezone\",\"Is All Day\",\"Is Floating\",\"Column Name\",\"Column Order\",\"View Mode\",\"taskId\",\"parentId\"\n";

    fn row(list: &str, title: &str, order: &str, task_id: &str, parent_id: &str) -> String {
        format!(
            "\"\",\"{list}\",\"{title}\",\"a, b\",\"body\",\"N\",\"2021-05-01T08:00:00+0000\",\"2021-05-02T10:00:00+0000\",\"-PT30M\",\"\",\"3\",\"0\",\"2021-04-30T08:00:00+0000\",\"\",\"{order}\",\"UTC\",\"false\",\"false\",\"\",\"\",\"list\",\"{task_id}\",\"{parent_id}\"\n"
        )
    }

    fn parse(body: &str) -> Result<NamespaceImport, ParseError> {
        TickTickMigrator::new().parse(format!("{HEADER}{body}").as_bytes())
    }

    #[test]
    fn parses_rows_into_sorted_lists() {
        let body = format!(
            "{}{}{}",
            row("Work", "report", "10", "1", ""),
            row("Home", "dishes", "5", "2", "0"),
            row("Work", "slides", "20", "3", "1"),
        );
        let namespace = parse(&body).unwrap();

        assert_eq!(namespace.title, "Migrated from TickTick");
        let titles: Vec<&str> = namespace.lists.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Home", "Work"]);

        let work = &namespace.lists[1];
        assert_eq!(work.tasks.len(), 2);
        assert_eq!(work.tasks[0].title, "report");
        assert_eq!(work.tasks[0].external_id.as_deref(), Some("1"));
        assert_eq!(work.tasks[0].position, Some(10.0));
        assert_eq!(work.tasks[0].priority, 3);
        assert_eq!(
            work.tasks[0].labels,
            vec![LabelImport::new("a"), LabelImport::new("b")]
        );
        assert!(work.tasks[0].relations.is_empty());
        assert_eq!(
            work.tasks[1].relations.get(&RelationKind::ParentTask),
            Some(&vec!["1".to_string()])
        );
        assert!(namespace.lists[0].tasks[0].relations.is_empty());
    }

    #[test]
    fn reminder_is_offset_from_due_date() {
        let namespace = parse(&row("Inbox", "t", "1", "1", "")).unwrap();
        let task = &namespace.lists[0].tasks[0];
        let due = task.due_date.unwrap();
        assert_eq!(due, 1_619_949_600_000);
        assert_eq!(task.end_date, Some(due));
        assert_eq!(task.reminders, vec![due - 30 * 60_000]);
        assert_eq!(task.created, Some(1_619_769_600_000));
        assert!(!task.done);
    }

    #[test]
    fn rejects_bad_timestamp_with_record_and_field() {
        let body = format!(
            "{}{}",
            row("Inbox", "ok", "1", "1", ""),
            row("Inbox", "bad", "2", "2", "").replace("2021-05-02T10:00:00+0000", "tomorrow"),
        );
        let err = parse(&body).unwrap_err();
        assert_eq!(err.field, "Due Date");
        assert_eq!(err.value, "tomorrow");
        assert_eq!(err.record, 9);
    }

    #[test]
    fn rejects_short_records_and_bad_numbers() {
        let err = parse("\"Inbox\",\"too short\"\n").unwrap_err();
        assert_eq!(err.field, "record");

        let err = parse(&row("Inbox", "t", "first", "1", "")).unwrap_err();
        assert_eq!(err.field, "Order");

        let err = parse(&row("Inbox", "t", "1", "x1", "")).unwrap_err();
        assert_eq!(err.field, "taskId");

        let err = parse(&row("Inbox", "t", "NaN", "1", "")).unwrap_err();
        assert_eq!(err.field, "Order");
    }

    #[test]
    fn header_only_export_is_empty() {
        let namespace = parse("").unwrap();
        assert!(namespace.lists.is_empty());
    }

    #[test]
    fn reminder_offsets_cover_both_encodings() {
        assert_eq!(parse_reminder_offset("TRIGGER:-PT15M"), Some(-15 * 60_000));
        assert_eq!(parse_reminder_offset("PT0S"), Some(0));
        assert_eq!(parse_reminder_offset("P0DT9H0M0S"), Some(9 * 3_600_000));
        assert_eq!(parse_reminder_offset("-P1DT2H"), Some(-26 * 3_600_000));
        assert_eq!(parse_reminder_offset("1h30m"), Some(-90 * 60_000));
        assert_eq!(parse_reminder_offset("45s"), Some(-45_000));
        assert_eq!(parse_reminder_offset("1.5h"), Some(-90 * 60_000));
        assert_eq!(parse_reminder_offset("2500us"), Some(-3));
        assert_eq!(parse_reminder_offset("1500µs1ms"), Some(-3));
        assert_eq!(parse_reminder_offset("4000000ns"), Some(-4));
        assert_eq!(parse_reminder_offset("0"), Some(0));
        assert_eq!(parse_reminder_offset("-0"), Some(0));
        assert_eq!(parse_reminder_offset("5"), None);
        assert_eq!(parse_reminder_offset("."), None);
        assert_eq!(parse_reminder_offset("P"), None);
        assert_eq!(parse_reminder_offset("soon"), None);
    }
}
