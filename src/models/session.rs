use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three Pomodoro intervals. Persisted as `focus`, `short_break` and
/// `long_break`; older history files used a bare `break` tag, which reads back
/// as a short break.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Focus,
    #[serde(alias = "break")]
    ShortBreak,
    LongBreak,
}

impl Default for SessionMode {
    fn default() -> Self {
        SessionMode::Focus
    }
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Focus => "focus",
            SessionMode::ShortBreak => "short_break",
            SessionMode::LongBreak => "long_break",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionMode::Focus => "Focus",
            SessionMode::ShortBreak => "Short break",
            SessionMode::LongBreak => "Long break",
        }
    }

    pub fn is_break(&self) -> bool {
        !matches!(self, SessionMode::Focus)
    }
}

/// One completed interval. Records are appended to history and never edited.
///
/// Records read from disk remember how their id, timestamp and task id were
/// written, so rewriting the history leaves old entries as they were.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "StoredRecord", into = "StoredRecord")]
pub struct SessionRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub mode: SessionMode,
    pub duration_minutes: u32,
    pub linked_task_id: Option<String>,
    pub linked_task_title: Option<String>,
    pub(crate) stored: StoredForm,
}

impl SessionRecord {
    pub fn new(
        mode: SessionMode,
        duration_minutes: u32,
        linked_task_id: Option<String>,
        linked_task_title: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            mode,
            duration_minutes,
            linked_task_id,
            linked_task_title,
            stored: StoredForm::default(),
        }
    }
}

impl PartialEq for SessionRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.timestamp == other.timestamp
            && self.mode == other.mode
            && self.duration_minutes == other.duration_minutes
            && self.linked_task_id == other.linked_task_id
            && self.linked_task_title == other.linked_task_title
    }
}

/// Field values exactly as they were read from disk.
#[derive(Debug, Clone, Default)]
pub(crate) struct StoredForm {
    id: Option<RawId>,
    timestamp: Option<RawTimestamp>,
    task_id: Option<RawId>,
}

// Hand-edited and older history files carry numeric ids and epoch-millisecond
// timestamps next to the current text forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn as_text(&self) -> String {
        match self {
            RawId::Text(text) => text.clone(),
            RawId::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Millis(i64),
}

impl RawTimestamp {
    fn to_datetime(&self) -> Result<DateTime<Utc>, String> {
        match self {
            RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|err| format!("invalid timestamp '{text}': {err}")),
            RawTimestamp::Millis(millis) => Utc
                .timestamp_millis_opt(*millis)
                .single()
                .ok_or_else(|| format!("timestamp {millis} out of range")),
        }
    }
}

/// On-disk shape of a record.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    id: RawId,
    timestamp: RawTimestamp,
    #[serde(rename = "type")]
    mode: SessionMode,
    #[serde(rename = "duration")]
    duration_minutes: u32,
    #[serde(rename = "taskId", default, skip_serializing_if = "Option::is_none")]
    task_id: Option<RawId>,
    #[serde(rename = "taskTitle", default, skip_serializing_if = "Option::is_none")]
    task_title: Option<String>,
}

impl TryFrom<StoredRecord> for SessionRecord {
    type Error = String;

    fn try_from(stored: StoredRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: stored.id.as_text(),
            timestamp: stored.timestamp.to_datetime()?,
            mode: stored.mode,
            duration_minutes: stored.duration_minutes,
            linked_task_id: stored.task_id.as_ref().map(RawId::as_text),
            linked_task_title: stored.task_title,
            stored: StoredForm {
                id: Some(stored.id),
                timestamp: Some(stored.timestamp),
                task_id: stored.task_id,
            },
        })
    }
}

impl From<SessionRecord> for StoredRecord {
    fn from(record: SessionRecord) -> Self {
        let StoredForm {
            id,
            timestamp,
            task_id,
        } = record.stored;

        // A remembered form is only reused while it still denotes the field's value.
        let id = match id {
            Some(raw) if raw.as_text() == record.id => raw,
            _ => RawId::Text(record.id),
        };
        let timestamp = match timestamp {
            Some(raw) if raw.to_datetime().ok() == Some(record.timestamp) => raw,
            _ => RawTimestamp::Text(record.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        };
        let task_id = match (task_id, record.linked_task_id) {
            (Some(raw), Some(current)) if raw.as_text() == current => Some(raw),
            (_, current) => current.map(RawId::Text),
        };

        Self {
            id,
            timestamp,
            mode: record.mode,
            duration_minutes: record.duration_minutes,
            task_id,
            task_title: record.linked_task_title,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_break_tag_reads_as_short_break() {
        let raw = r#"{"id":"a1","timestamp":"2024-03-01T09:30:00Z","type":"break","duration":5}"#;
        let record: SessionRecord = serde_json::from_str(raw).expect("parse legacy record");
        assert_eq!(record.mode, SessionMode::ShortBreak);

        let written = serde_json::to_string(&record).expect("serialize");
        assert!(written.contains(r#""type":"short_break""#));
        assert!(!written.contains(r#""type":"break""#));
    }

    #[test]
    fn numeric_ids_and_millisecond_timestamps_are_accepted() {
        let raw = r#"{"id":1709285400000,"timestamp":1709285400000,"type":"focus","duration":25,"taskId":42,"taskTitle":"Write report"}"#;
        let record: SessionRecord = serde_json::from_str(raw).expect("parse record");

        assert_eq!(record.id, "1709285400000");
        assert_eq!(record.timestamp.to_rfc3339(), "2024-03-01T09:30:00+00:00");
        assert_eq!(record.linked_task_id.as_deref(), Some("42"));
        assert_eq!(record.linked_task_title.as_deref(), Some("Write report"));
    }

    #[test]
    fn rewriting_keeps_stored_ids_and_timestamps_verbatim() {
        let raw = r#"[{"id":1709285400000,"timestamp":1709285400000,"type":"focus","duration":25,"taskId":42,"taskTitle":"Write report"},{"id":"b7","timestamp":"2024-03-01T10:00:00.000Z","type":"short_break","duration":5}]"#;
        let records: Vec<SessionRecord> = serde_json::from_str(raw).expect("parse records");

        let rewritten = serde_json::to_value(&records).expect("serialize");
        let original: serde_json::Value = serde_json::from_str(raw).expect("parse json");
        assert_eq!(rewritten, original);
    }

    #[test]
    fn new_records_use_text_ids_and_rfc3339_timestamps() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let record = SessionRecord::new(SessionMode::Focus, 25, Some("t1".into()), None, at);

        let written = serde_json::to_value(&record).expect("serialize");
        assert_eq!(written["id"], serde_json::Value::String(record.id.clone()));
        assert_eq!(written["timestamp"], "2024-03-01T09:30:00Z");
        assert_eq!(written["taskId"], "t1");
        assert!(written.get("taskTitle").is_none());
    }

    #[test]
    fn missing_task_fields_default_to_none() {
        let raw = r#"{"id":"b2","timestamp":"2024-03-01T10:00:00Z","type":"long_break","duration":15}"#;
        let record: SessionRecord = serde_json::from_str(raw).expect("parse record");
        assert_eq!(record.linked_task_id, None);
        assert_eq!(record.linked_task_title, None);

        let written = serde_json::to_string(&record).expect("serialize");
        assert!(!written.contains("taskId"));
    }

    #[test]
    fn unknown_mode_tag_is_rejected() {
        let raw = r#"{"id":"c3","timestamp":"2024-03-01T10:00:00Z","type":"nap","duration":15}"#;
        assert!(serde_json::from_str::<SessionRecord>(raw).is_err());
    }
}
